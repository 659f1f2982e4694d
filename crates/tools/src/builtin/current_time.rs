use std::sync::Arc;

use serde_json::Value;

use crate::derived::{DerivedTool, ParamKind, ParamSpec};

/// Reference schema-derived tool: reports the current UTC time, tagged
/// with the calling thread's id. Exists to exercise the schema-derived
/// tool shape end to end (spec §4.5's second tool kind), the way
/// [`crate::builtin::AddTool`] exercises the schema-explicit one.
///
/// `style` is optional and defaults to `"rfc3339"`.
pub fn current_time_tool() -> DerivedTool {
    DerivedTool::new(
        "current_time",
        "Reports the current UTC time, tagged with the calling thread's id.\n\n`style` is optional and defaults to `\"rfc3339\"`.",
        vec![ParamSpec::optional(
            "style",
            ParamKind::String,
            Value::String("rfc3339".to_string()),
        )],
        Arc::new(|ctx, args| {
            Box::pin(async move {
                let now = chrono::Utc::now();
                let rendered = match args["style"].as_str() {
                    Some("unix") => now.timestamp().to_string(),
                    _ => now.to_rfc3339(),
                };
                Ok(serde_json::json!({
                    "thread_id": ctx.thread_id,
                    "time": rendered,
                }))
            })
        }),
    )
    .expect("current_time_tool: no reserved param names declared")
}
