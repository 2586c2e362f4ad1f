mod config;
mod db;
mod errors;
mod feedback;
mod generation;
mod llm_client;
mod models;
mod response;
mod resume;
mod routes;
mod state;
mod store;
#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use axum::http::HeaderValue;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, S3Config};
use crate::db::create_pool;
use crate::generation::orchestrator::Orchestrator;
use crate::generation::snapshot::{NoopSnapshotSink, S3SnapshotSink, SnapshotSink};
use crate::generation::token::ClockTokens;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::{DocumentStore, PgDocumentStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Resume API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL (runs migrations)
    let pool = create_pool(&config.database_url).await?;
    let store: Arc<dyn DocumentStore> = Arc::new(PgDocumentStore::new(pool));

    // Initialize LLM client
    let llm = LlmClient::new(config.anthropic_api_key.clone())
        .context("Failed to build LLM HTTP client")?;
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    // Initialize S3 / MinIO snapshot sink, if configured
    let snapshots: Arc<dyn SnapshotSink> = match &config.s3 {
        Some(s3) => {
            info!("S3 snapshots enabled (bucket: {})", s3.bucket);
            Arc::new(S3SnapshotSink::new(
                build_s3_client(s3).await,
                s3.bucket.clone(),
            ))
        }
        None => {
            info!("S3 not configured; generated HTML will not be archived");
            Arc::new(NoopSnapshotSink)
        }
    };

    let orchestrator = Orchestrator::new(
        store.clone(),
        Arc::new(llm),
        snapshots,
        Arc::new(ClockTokens::new()),
    );

    // Build app state
    let state = AppState {
        store,
        orchestrator: Arc::new(orchestrator),
        config: config.clone(),
    };

    let cors = match &config.cors_origin {
        Some(origin) => CorsLayer::new()
            .allow_origin(
                origin
                    .parse::<HeaderValue>()
                    .context("CORS_ORIGIN must be a valid origin")?,
            )
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any),
        None => CorsLayer::permissive(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(s3: &S3Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &s3.access_key_id,
        &s3.secret_access_key,
        None,
        None,
        "resume-api-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&s3.endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
