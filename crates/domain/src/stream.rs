use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// A boxed, owned stream of `T`, matching the teacher's `BoxStream` alias.
pub type BoxStream<'a, T> = Pin<Box<dyn futures_core::Stream<Item = T> + Send + 'a>>;

/// One chunk of a model adapter's streaming response.
///
/// Tool-call deltas arrive addressed by `index` (position within the
/// model's tool-call array for this turn) so the orchestrator can
/// accumulate fragmented `name_delta`/`arguments_delta` pieces into
/// complete [`crate::ToolCall`]s before dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelChunk {
    AssistantText { content: String },
    ThinkingText { content: String },
    ToolCallDelta {
        id: Option<String>,
        index: usize,
        name_delta: Option<String>,
        arguments_delta: Option<String>,
    },
    End {
        usage: Option<Usage>,
        finish_reason: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_chunk_tags_on_kind() {
        let c = ModelChunk::AssistantText {
            content: "hi".into(),
        };
        let v = serde_json::to_value(&c).unwrap();
        assert_eq!(v["kind"], "assistant_text");
        assert_eq!(v["content"], "hi");
    }

    #[test]
    fn tool_call_delta_round_trips() {
        let c = ModelChunk::ToolCallDelta {
            id: Some("call-1".into()),
            index: 0,
            name_delta: Some("add".into()),
            arguments_delta: None,
        };
        let s = serde_json::to_string(&c).unwrap();
        let back: ModelChunk = serde_json::from_str(&s).unwrap();
        match back {
            ModelChunk::ToolCallDelta { index, .. } => assert_eq!(index, 0),
            _ => panic!("wrong variant"),
        }
    }
}
