use serde::{Deserialize, Serialize};

/// The closed set of plugin roles the core understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Auth,
    Store,
    History,
    Context,
    Model,
    SystemPrompt,
    MessageProcessor,
    Tool,
    Function,
}

impl Role {
    pub fn is_multi_slot(self) -> bool {
        matches!(self, Role::Tool | Role::Function)
    }
}

/// A non-negative plugin priority. Ordering direction depends on which
/// hook is being evaluated — see [`crate::function::sort_pre_call`] and
/// [`crate::function::sort_post_hooks`].
pub type Priority = u32;
