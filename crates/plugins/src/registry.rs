use std::collections::HashMap;
use std::sync::Arc;

use turnloom_context::ContextCache;
use turnloom_domain::{Error, Result};
use turnloom_history::HistoryLog;
use turnloom_store::Store;

use crate::auth::AuthPlugin;
use crate::function::{sort_for_post_hooks, sort_for_pre_call, FunctionPlugin};
use crate::message_processor::MessageProcessor;
use crate::model::ModelPlugin;
use crate::role::Priority;
use crate::system_prompt::SystemPromptPlugin;
use crate::tool::ToolRegistryHandle;

/// The plugin registry is the one piece of shared, mutable-by-replacement
/// state the core carries. `store`, `history`, and `context` are
/// concrete — this implementation ships exactly one backend for each, so
/// a trait layer there would be pure duplication. Everything else is a
/// genuinely pluggable slot.
pub struct PluginRegistry {
    pub store: Arc<Store>,
    pub history: Arc<HistoryLog>,
    pub context: Arc<ContextCache>,

    auth: Option<Arc<dyn AuthPlugin>>,
    models: HashMap<String, Arc<dyn ModelPlugin>>,
    system_prompt: Option<Arc<dyn SystemPromptPlugin>>,
    message_processor: Option<Arc<dyn MessageProcessor>>,
    tools: Option<Arc<dyn ToolRegistryHandle>>,
    functions: Vec<(Priority, Arc<dyn FunctionPlugin>)>,
}

impl PluginRegistry {
    pub fn new(store: Arc<Store>, history: Arc<HistoryLog>, context: Arc<ContextCache>) -> Self {
        Self {
            store,
            history,
            context,
            auth: None,
            models: HashMap::new(),
            system_prompt: None,
            message_processor: None,
            tools: None,
            functions: Vec::new(),
        }
    }

    pub fn set_auth(&mut self, plugin: Arc<dyn AuthPlugin>) {
        self.auth = Some(plugin);
    }

    pub fn auth(&self) -> Result<&Arc<dyn AuthPlugin>> {
        self.auth
            .as_ref()
            .ok_or_else(|| Error::Config("no auth plugin registered".to_string()))
    }

    pub fn register_model(&mut self, name: impl Into<String>, plugin: Arc<dyn ModelPlugin>) {
        self.models.insert(name.into(), plugin);
    }

    pub fn model(&self, name: &str) -> Result<&Arc<dyn ModelPlugin>> {
        self.models
            .get(name)
            .ok_or_else(|| Error::NotFound(format!("model plugin: {name}")))
    }

    pub fn set_system_prompt(&mut self, plugin: Arc<dyn SystemPromptPlugin>) {
        self.system_prompt = Some(plugin);
    }

    pub fn system_prompt(&self) -> Result<&Arc<dyn SystemPromptPlugin>> {
        self.system_prompt
            .as_ref()
            .ok_or_else(|| Error::Config("no system_prompt plugin registered".to_string()))
    }

    pub fn set_message_processor(&mut self, plugin: Arc<dyn MessageProcessor>) {
        self.message_processor = Some(plugin);
    }

    pub fn message_processor(&self) -> Result<&Arc<dyn MessageProcessor>> {
        self.message_processor
            .as_ref()
            .ok_or_else(|| Error::Config("no message_processor plugin registered".to_string()))
    }

    pub fn set_tools(&mut self, tools: Arc<dyn ToolRegistryHandle>) {
        self.tools = Some(tools);
    }

    pub fn tools(&self) -> Option<&Arc<dyn ToolRegistryHandle>> {
        self.tools.as_ref()
    }

    /// Register a `function` (middleware) plugin. Maintains both sort
    /// orders lazily — callers ask for the ordering they need via
    /// [`Self::functions_for_pre_call`] / [`Self::functions_for_post_hooks`].
    pub fn register_function(&mut self, plugin: Arc<dyn FunctionPlugin>) {
        let priority = plugin.priority();
        self.functions.push((priority, plugin));
    }

    pub fn functions_for_pre_call(&self) -> Vec<Arc<dyn FunctionPlugin>> {
        let mut items = self.functions.clone();
        sort_for_pre_call(&mut items);
        items.into_iter().map(|(_, p)| p).collect()
    }

    pub fn functions_for_post_hooks(&self) -> Vec<Arc<dyn FunctionPlugin>> {
        let mut items = self.functions.clone();
        sort_for_post_hooks(&mut items);
        items.into_iter().map(|(_, p)| p).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticTokenAuth;
    use async_trait::async_trait;

    fn fixture() -> PluginRegistry {
        let store = Arc::new(Store::open_in_memory("registry_test").unwrap());
        let history = Arc::new(HistoryLog::open(store.clone()).unwrap());
        let context = Arc::new(ContextCache::new(history.clone()));
        PluginRegistry::new(store, history, context)
    }

    #[test]
    fn auth_missing_is_config_error() {
        let registry = fixture();
        assert_eq!(registry.auth().unwrap_err().kind(), "Config");
    }

    #[test]
    fn auth_registers_and_resolves() {
        let mut registry = fixture();
        registry.set_auth(Arc::new(StaticTokenAuth::new().with_token("t", "u")));
        assert!(registry.auth().is_ok());
    }

    struct NamedFn {
        priority: Priority,
    }

    #[async_trait]
    impl FunctionPlugin for NamedFn {
        fn priority(&self) -> Priority {
            self.priority
        }
    }

    #[test]
    fn function_ordering_directions_differ() {
        let mut registry = fixture();
        registry.register_function(Arc::new(NamedFn { priority: 1 }));
        registry.register_function(Arc::new(NamedFn { priority: 5 }));

        let pre: Vec<_> = registry
            .functions_for_pre_call()
            .iter()
            .map(|p| p.priority())
            .collect();
        assert_eq!(pre, vec![5, 1]);

        let post: Vec<_> = registry
            .functions_for_post_hooks()
            .iter()
            .map(|p| p.priority())
            .collect();
        assert_eq!(post, vec![1, 5]);
    }
}
