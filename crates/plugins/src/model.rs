use async_trait::async_trait;
use turnloom_domain::{BoxStream, ContextEntry, ModelCapabilities, Result};

/// Exactly one plugin fills this role per configured model, reached
/// through the registry by name.
#[async_trait]
pub trait ModelPlugin: Send + Sync {
    fn list_models(&self) -> Vec<String>;

    async fn stream(
        &self,
        messages: Vec<ContextEntry>,
        model_name: &str,
        system_prompt_text: &str,
        tool_schemas: Vec<serde_json::Value>,
    ) -> Result<BoxStream<'static, turnloom_domain::ModelChunk>>;

    fn capabilities(&self, model_name: &str) -> ModelCapabilities;

    fn provider_id(&self) -> &str;
}
