// Generation pipeline: prompt compilation, orchestration and the HTTP surface.
// All provider calls go through llm_client::gateway; nothing here talks to a
// vendor SDK directly.

pub mod compiler;
pub mod handlers;
pub mod orchestrator;
pub mod prompts;
pub mod snapshot;
pub mod token;
