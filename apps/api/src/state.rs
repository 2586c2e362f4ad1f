use std::sync::Arc;

use crate::config::Config;
use crate::generation::orchestrator::Orchestrator;
use crate::store::DocumentStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub orchestrator: Arc<Orchestrator>,
    pub config: Config,
}
