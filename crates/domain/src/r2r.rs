use serde::{Deserialize, Serialize};

/// Raise-to-return adapter: unifies "a function that returns a value" and
/// "a generator that yields progress and eventually returns a value" under
/// one tagged sum. A tool implementation emits zero or more `Progress`
/// items (human-readable status lines, suitable for `tool_update`
/// events) followed by exactly one `Final`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Progress<T, R> {
    Progress(T),
    Final(R),
}

impl<T, R> Progress<T, R> {
    pub fn is_final(&self) -> bool {
        matches!(self, Progress::Final(_))
    }

    pub fn into_final(self) -> Option<R> {
        match self {
            Progress::Final(r) => Some(r),
            Progress::Progress(_) => None,
        }
    }

    pub fn into_progress(self) -> Option<T> {
        match self {
            Progress::Progress(t) => Some(t),
            Progress::Final(_) => None,
        }
    }
}
