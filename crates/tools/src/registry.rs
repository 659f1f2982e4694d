use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::warn;
use turnloom_domain::{BoxStream, Error, Progress, Result, ToolContext};
use turnloom_plugins::{ToolProgress, ToolRegistryHandle};

use crate::error_envelope::error_envelope;
use crate::tool::Tool;

/// Owns the name -> tool map for the `tool` role. Cardinality-many is
/// handled here rather than in the plugin registry's generic multi-slot
/// machinery, which is reserved for `function` middleware.
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
        }
    }

    /// Register a tool. Name collisions are rejected rather than
    /// silently overwriting a previous registration.
    pub fn register(&self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.name().to_string();
        let mut tools = self.tools.write();
        if tools.contains_key(&name) {
            warn!(tool = %name, "rejecting duplicate tool registration");
            return Err(Error::SchemaConflict(format!(
                "tool already registered: {name}"
            )));
        }
        tools.insert(name, tool);
        Ok(())
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolRegistryHandle for ToolRegistry {
    fn tool_schemas(&self) -> Vec<serde_json::Value> {
        self.tools
            .read()
            .values()
            .map(|tool| {
                serde_json::json!({
                    "name": tool.name(),
                    "description": tool.description(),
                    "parameters": tool.parameters_schema(),
                })
            })
            .collect()
    }

    fn has_tool(&self, name: &str) -> bool {
        self.tools.read().contains_key(name)
    }

    async fn invoke(
        &self,
        ctx: &ToolContext,
        tool_name: &str,
        arguments: serde_json::Value,
    ) -> Result<BoxStream<'static, ToolProgress>> {
        let tool = self.tools.read().get(tool_name).cloned();
        match tool {
            Some(tool) => Ok(tool.invoke(ctx, arguments).await),
            None => {
                let err = Error::NotFound(format!("tool: {tool_name}"));
                let envelope = error_envelope(tool_name, &arguments, &err);
                Ok(Box::pin(futures_util::stream::once(async move {
                    Progress::Final(envelope)
                })))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::AddTool;
    use futures_util::StreamExt;

    fn ctx() -> ToolContext {
        ToolContext::new("alice", "t1", "turn-1")
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(AddTool)).unwrap();
        let err = registry.register(Arc::new(AddTool)).unwrap_err();
        assert_eq!(err.kind(), "SchemaConflict");
    }

    #[test]
    fn schema_shape_matches_contract() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(AddTool)).unwrap();
        let schemas = registry.tool_schemas();
        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas[0]["name"], "add");
        assert!(schemas[0]["parameters"]["required"].is_array());
    }

    #[tokio::test]
    async fn unknown_tool_yields_error_envelope_not_err() {
        let registry = ToolRegistry::new();
        let mut stream = registry
            .invoke(&ctx(), "missing", serde_json::json!({}))
            .await
            .unwrap();
        let item = stream.next().await.unwrap();
        let final_value = item.into_final().unwrap();
        assert_eq!(final_value["tool"], "missing");
        assert_eq!(final_value["error"], "NotFound");
    }

    #[tokio::test]
    async fn known_tool_invokes() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(AddTool)).unwrap();
        let mut stream = registry
            .invoke(&ctx(), "add", serde_json::json!({"a": 2, "b": 3}))
            .await
            .unwrap();
        let item = stream.next().await.unwrap();
        assert_eq!(item.into_final(), Some(serde_json::json!(5.0)));
    }
}
