//! Process-wide shared state handed to the CLI and (eventually) any
//! transport surface built on top of the same core.

use std::sync::Arc;

use turnloom_domain::Config;
use turnloom_plugins::PluginRegistry;

use crate::tasks::SharedBackgroundTasks;

/// Everything a request-handling path needs: the resolved configuration
/// and the fully wired plugin registry (store, history, context, models,
/// tools, the orchestrator itself as `message_processor`).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<PluginRegistry>,
    pub tasks: SharedBackgroundTasks,
}
