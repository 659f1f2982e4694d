//! `AppState` construction: the shared boot path the CLI entry point calls
//! before handing off to the chat loop.

use std::sync::Arc;

use anyhow::Context;
use turnloom_context::ContextCache;
use turnloom_domain::Config;
use turnloom_history::HistoryLog;
use turnloom_plugins::{PluginRegistry, StaticSystemPrompts};
use turnloom_store::Store;
use turnloom_tools::{
    builtin::{current_time_tool, AddTool},
    ToolRegistry,
};

use crate::orchestrator::{TurnOrchestrator, DEFAULT_SYSTEM_PROMPT_KEY};
use crate::state::AppState;
use crate::tasks::BackgroundTasks;

/// Build the storage/context/plugin stack and wire the orchestrator in as
/// `message_processor`, returning a ready-to-use [`AppState`].
pub fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    let store = Arc::new(Store::open(config.store.clone()).context("opening store")?);
    tracing::info!(db_path = %config.store.db_path, "store ready");

    let history = Arc::new(HistoryLog::open(store.clone()).context("opening history log")?);
    let context = Arc::new(ContextCache::new(history.clone()));
    tracing::info!("history + context ready");

    let tasks = Arc::new(BackgroundTasks::new());
    let max_tool_rounds = config.orchestrator.max_tool_rounds;

    let registry = Arc::new_cyclic(|weak_self| {
        let mut registry = PluginRegistry::new(store, history, context);

        let init_errors = turnloom_providers::register_providers(&mut registry, &config.providers);
        for err in &init_errors {
            tracing::warn!(provider_id = %err.provider_id, error = %err.error, "provider failed to initialize");
        }

        registry.set_system_prompt(Arc::new(
            StaticSystemPrompts::new().with_prompt(DEFAULT_SYSTEM_PROMPT_KEY, "You are a helpful assistant."),
        ));

        let tool_registry = ToolRegistry::new();
        if let Err(e) = tool_registry.register(Arc::new(AddTool)) {
            tracing::warn!(error = %e, "failed to register built-in tool");
        }
        if let Err(e) = tool_registry.register(Arc::new(current_time_tool())) {
            tracing::warn!(error = %e, "failed to register built-in tool");
        }
        registry.set_tools(Arc::new(tool_registry));

        let orchestrator = TurnOrchestrator::new(weak_self.clone(), max_tool_rounds, tasks.clone());
        registry.set_message_processor(Arc::new(orchestrator));

        registry
    });
    tracing::info!("plugin registry ready");

    Ok(AppState {
        config,
        registry,
        tasks,
    })
}
