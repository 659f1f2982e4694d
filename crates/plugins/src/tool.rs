use async_trait::async_trait;
use turnloom_domain::{BoxStream, Progress, Result, ToolContext};

/// A single progress update from a running tool, surfaced to the
/// orchestrator as one `tool_update` message per item plus one terminal
/// value.
pub type ToolProgress = Progress<String, serde_json::Value>;

/// The aggregation point for the `tool` role. Individual tools are
/// cardinality-many, but the core only ever talks to one registry, which
/// owns the name -> tool map internally; this crate only needs the shape
/// the orchestrator calls through.
#[async_trait]
pub trait ToolRegistryHandle: Send + Sync {
    fn tool_schemas(&self) -> Vec<serde_json::Value>;

    fn has_tool(&self, name: &str) -> bool;

    async fn invoke(
        &self,
        ctx: &ToolContext,
        tool_name: &str,
        arguments: serde_json::Value,
    ) -> Result<BoxStream<'static, ToolProgress>>;
}
