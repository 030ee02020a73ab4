use std::sync::Arc;

use crate::config::Config;
use crate::workflow::engine::WorkflowEngine;
use crate::workflow::store::StateStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Conversation persistence. Default: PgStateStore.
    pub store: Arc<dyn StateStore>,
    /// Stateless turn runner; holds the LLM gateway.
    pub engine: WorkflowEngine,
    pub config: Config,
}
