use futures_util::StreamExt;
use turnloom_domain::{BoxStream, Progress};
use turnloom_plugins::ToolProgress;

/// Thin raise-to-return adapter: gives callers that want both halves of
/// a tool invocation a single uniform shape rather than matching on
/// [`Progress`] themselves. Callers that want to forward progress lines
/// as they arrive (the orchestrator's streaming path) should consume the
/// raw `BoxStream<ToolProgress>` directly instead — this is for the
/// simpler "collect, then use the final value" call sites.
pub struct R2RAdapter;

impl R2RAdapter {
    /// Drain `stream`, returning every progress line observed in order
    /// plus the terminal final value. Stops at the first `Final` item;
    /// a well-behaved tool never emits anything after it.
    pub async fn collect(
        mut stream: BoxStream<'static, ToolProgress>,
    ) -> (Vec<String>, serde_json::Value) {
        let mut progress = Vec::new();
        let mut final_value = serde_json::Value::Null;
        while let Some(item) = stream.next().await {
            match item {
                Progress::Progress(line) => progress.push(line),
                Progress::Final(value) => {
                    final_value = value;
                    break;
                }
            }
        }
        (progress, final_value)
    }
}
