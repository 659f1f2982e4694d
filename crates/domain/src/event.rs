use serde::{Deserialize, Serialize};

/// The typed event envelope emitted by a turn, per the events contract:
/// `{event: Kind, data: {timestamp, turn_correlation_id?, ...kind-specific}}`.
///
/// The core only produces this envelope sequence; rendering it onto an
/// actual wire transport (SSE, websocket) is left to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event: Kind,
    pub data: EventData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    ThreadId,
    MessageTokens,
    ThinkingTokens,
    ToolUpdate,
    Error,
    StreamEnd,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventData {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn_correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Event {
    fn base(turn_correlation_id: &str) -> EventData {
        EventData {
            timestamp: chrono::Utc::now(),
            turn_correlation_id: Some(turn_correlation_id.to_string()),
            thread_id: None,
            content: None,
            call_id: None,
            message: None,
        }
    }

    pub fn thread_id(turn_correlation_id: &str, thread_id: impl Into<String>) -> Self {
        Self {
            event: Kind::ThreadId,
            data: EventData {
                thread_id: Some(thread_id.into()),
                ..Self::base(turn_correlation_id)
            },
        }
    }

    pub fn message_tokens(turn_correlation_id: &str, content: impl Into<String>) -> Self {
        Self {
            event: Kind::MessageTokens,
            data: EventData {
                content: Some(content.into()),
                ..Self::base(turn_correlation_id)
            },
        }
    }

    pub fn thinking_tokens(turn_correlation_id: &str, content: impl Into<String>) -> Self {
        Self {
            event: Kind::ThinkingTokens,
            data: EventData {
                content: Some(content.into()),
                ..Self::base(turn_correlation_id)
            },
        }
    }

    pub fn tool_update(
        turn_correlation_id: &str,
        call_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            event: Kind::ToolUpdate,
            data: EventData {
                call_id: Some(call_id.into()),
                content: Some(content.into()),
                ..Self::base(turn_correlation_id)
            },
        }
    }

    pub fn error(turn_correlation_id: &str, message: impl Into<String>) -> Self {
        Self {
            event: Kind::Error,
            data: EventData {
                message: Some(message.into()),
                ..Self::base(turn_correlation_id)
            },
        }
    }

    pub fn stream_end(turn_correlation_id: &str) -> Self {
        Self {
            event: Kind::StreamEnd,
            data: Self::base(turn_correlation_id),
        }
    }
}
