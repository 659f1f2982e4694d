use serde::{Deserialize, Serialize};

/// A thread's header record — everything about a thread except its
/// message log, which is accessed separately via
/// [`crate::HistoryLog::get_messages`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadHeader {
    pub id: String,
    pub title: String,
    pub model: String,
    pub system_prompt: String,
    pub archived: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}
