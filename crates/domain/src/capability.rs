use serde::{Deserialize, Serialize};

/// What a model adapter supports for a given model name, so the
/// orchestrator can decide whether to request tool use or streaming
/// before it ever calls `stream`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ModelCapabilities {
    pub supports_tools: bool,
    pub supports_streaming: bool,
    pub context_window_tokens: u32,
    pub max_output_tokens: u32,
}

impl Default for ModelCapabilities {
    fn default() -> Self {
        Self {
            supports_tools: false,
            supports_streaming: true,
            context_window_tokens: 8_192,
            max_output_tokens: 2_048,
        }
    }
}
