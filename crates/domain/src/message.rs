use serde::{Deserialize, Serialize};

/// Role of a history message or context entry.
///
/// `Thinking` only ever appears on history messages, never inside a model
/// request context entry (reasoning content is carried on the `assistant`
/// entry's `reasoning_content` field instead, see [`ContextEntry`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Thinking,
    Tool,
}

/// The kind of a history message, distinguishing plain text turns from
/// tool-update records appended as a tool call resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    MessageText,
    ToolUpdate,
}

/// A single append-only item under a thread's message log.
///
/// Immutable once appended: the public history API never rewrites an
/// existing message, it can only append new ones or delete the whole
/// thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub thread_id: String,
    pub role: Role,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub content: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Tool call id this message reports on; only set for `role: tool`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
}

impl Message {
    pub fn user_text(thread_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            thread_id: thread_id.into(),
            role: Role::User,
            kind: MessageKind::MessageText,
            content: content.into(),
            timestamp: chrono::Utc::now(),
            model: None,
            call_id: None,
        }
    }

    pub fn assistant_text(
        thread_id: impl Into<String>,
        content: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            thread_id: thread_id.into(),
            role: Role::Assistant,
            kind: MessageKind::MessageText,
            content: content.into(),
            timestamp: chrono::Utc::now(),
            model: Some(model.into()),
            call_id: None,
        }
    }

    pub fn tool_update(
        thread_id: impl Into<String>,
        call_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            thread_id: thread_id.into(),
            role: Role::Tool,
            kind: MessageKind::ToolUpdate,
            content: content.into(),
            timestamp: chrono::Utc::now(),
            model: None,
            call_id: Some(call_id.into()),
        }
    }
}

/// A single entry in a model-API-shaped context, i.e. one item of the
/// list that gets sent to the model on the next turn.
///
/// Mirrors a model-API message: `role`/`content` plus the two optional
/// fields a tool-using, reasoning-capable model needs. `id` is
/// server-assigned and used by [`crate::Error`]-returning `remove_messages`
/// calls to address individual entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextEntry {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,
    /// Pending calls an `assistant` entry made, for a round that is still
    /// mid-flight (its tool results haven't resolved yet). A real
    /// OpenAI-compatible endpoint rejects a `tool`-role message whose
    /// preceding `assistant` message doesn't carry the matching
    /// `tool_calls` — see `entry_to_openai`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl ContextEntry {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            tool_call_id: None,
            reasoning_content: None,
            tool_calls: None,
        }
    }

    pub fn with_tool_call_id(mut self, call_id: impl Into<String>) -> Self {
        self.tool_call_id = Some(call_id.into());
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning_content = Some(reasoning.into());
        self
    }

    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = Some(tool_calls);
        self
    }
}

/// A single tool invocation requested by the model mid-stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub call_id: String,
    pub tool_name: String,
    pub arguments: serde_json::Value,
}

/// The correlation triple a tool invocation may need out of band, never
/// as a model-visible argument: `(user_id, thread_id, turn_correlation_id)`
/// (spec §4.5 `execute(user_id, thread_id, turn_correlation_id, arguments)`).
/// Every tool receives this alongside its arguments; schema-explicit tools
/// may ignore it, schema-derived tools opt into individual fields by
/// parameter name (see `turnloom_tools::derived`).
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub user_id: String,
    pub thread_id: String,
    pub turn_correlation_id: String,
}

impl ToolContext {
    pub fn new(
        user_id: impl Into<String>,
        thread_id: impl Into<String>,
        turn_correlation_id: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            thread_id: thread_id.into(),
            turn_correlation_id: turn_correlation_id.into(),
        }
    }
}
