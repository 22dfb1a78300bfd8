use std::sync::Arc;

use crate::config::Config;
use crate::llm_client::CompletionBackend;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Pluggable completion backend. Production wires `OpenAiClient`; tests
    /// substitute a scripted fake.
    pub llm: Arc<dyn CompletionBackend>,
    pub config: Config,
}
