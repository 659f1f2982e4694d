use async_trait::async_trait;
use futures_util::stream;
use turnloom_domain::{BoxStream, Error, Progress, ToolContext};
use turnloom_plugins::ToolProgress;

use crate::error_envelope::error_envelope;
use crate::tool::Tool;

/// Reference tool: adds two numbers. Exists mainly to exercise the tool
/// loop end to end, not as a production capability.
pub struct AddTool;

#[async_trait]
impl Tool for AddTool {
    fn name(&self) -> &str {
        "add"
    }

    fn description(&self) -> &str {
        "Add two numbers and return their sum."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "a": {"type": "number"},
                "b": {"type": "number"},
            },
            "required": ["a", "b"],
        })
    }

    async fn invoke(
        &self,
        _ctx: &ToolContext,
        arguments: serde_json::Value,
    ) -> BoxStream<'static, ToolProgress> {
        let outcome = run(&arguments);
        let item = match outcome {
            Ok(sum) => Progress::Final(serde_json::json!(sum)),
            Err(err) => Progress::Final(error_envelope("add", &arguments, &err)),
        };
        Box::pin(stream::once(async move { item }))
    }
}

fn run(arguments: &serde_json::Value) -> turnloom_domain::Result<f64> {
    let a = arguments
        .get("a")
        .and_then(serde_json::Value::as_f64)
        .ok_or_else(|| Error::Validation("add: missing or non-numeric field 'a'".to_string()))?;
    let b = arguments
        .get("b")
        .and_then(serde_json::Value::as_f64)
        .ok_or_else(|| Error::Validation("add: missing or non-numeric field 'b'".to_string()))?;
    Ok(a + b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    fn ctx() -> ToolContext {
        ToolContext::new("alice", "t1", "turn-1")
    }

    #[tokio::test]
    async fn adds_two_numbers() {
        let tool = AddTool;
        let mut stream = tool.invoke(&ctx(), serde_json::json!({"a": 2, "b": 3})).await;
        let item = stream.next().await.unwrap();
        assert_eq!(item.into_final(), Some(serde_json::json!(5.0)));
    }

    #[tokio::test]
    async fn missing_argument_becomes_error_envelope() {
        let tool = AddTool;
        let mut stream = tool.invoke(&ctx(), serde_json::json!({"a": 2})).await;
        let item = stream.next().await.unwrap();
        let final_value = item.into_final().unwrap();
        assert_eq!(final_value["tool"], "add");
        assert_eq!(final_value["error"], "Validation");
    }
}
