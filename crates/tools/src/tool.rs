use async_trait::async_trait;
use turnloom_domain::{BoxStream, ToolContext};
use turnloom_plugins::ToolProgress;

/// A single invocable tool. Two shapes satisfy this trait (spec §4.5):
/// schema-explicit tools author `parameters_schema` by hand (e.g.
/// [`crate::builtin::AddTool`]); schema-derived tools
/// ([`crate::derived::DerivedTool`]) generate it from a typed parameter
/// list and a docstring at registration time. The registry only ever
/// talks to this one trait.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON-schema `properties`/`required` for this tool's arguments,
    /// following `{type: "object", properties, required}`. Correlation
    /// parameters (`user_id`, `thread_id`, `turn_correlation_id`) are
    /// never part of this — tools that need them read `ctx` instead.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Run the tool. Never returns an `Err`: execution failures are
    /// captured and reported as the stream's final value in a
    /// structured error envelope, per the raise-to-return contract.
    async fn invoke(
        &self,
        ctx: &ToolContext,
        arguments: serde_json::Value,
    ) -> BoxStream<'static, ToolProgress>;
}
