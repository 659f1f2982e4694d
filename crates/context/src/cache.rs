use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use turnloom_domain::{ContextEntry, Error, Message, MessageKind, Result, Role, TraceEvent};
use turnloom_history::HistoryLog;

/// Per-(thread, user) cached view, keyed so concurrent threads/users never
/// contend on the same entry.
struct CachedView {
    entries: Vec<ContextEntry>,
    mutation_count: u64,
}

/// The model-visible view over a thread's history, for one `(thread, user)`
/// pair at a time. Regenerated lazily from [`HistoryLog`] and mutated in
/// place as a turn progresses; every mutating call bumps `mutation_count`
/// so background tasks can detect interference (see
/// [`ContextCache::set_context`]).
pub struct ContextCache {
    history: Arc<HistoryLog>,
    views: RwLock<HashMap<(String, String), CachedView>>,
}

impl ContextCache {
    pub fn new(history: Arc<HistoryLog>) -> Self {
        Self {
            history,
            views: RwLock::new(HashMap::new()),
        }
    }

    fn key(user_id: &str, thread_id: &str) -> (String, String) {
        (user_id.to_string(), thread_id.to_string())
    }

    /// Snapshot of the model-visible entries. `strip_reasoning` (the
    /// default for turn dispatch) omits `reasoning_content` from assistant
    /// entries, though the entries themselves are still included.
    pub fn get_context(
        &self,
        user_id: &str,
        thread_id: &str,
        strip_reasoning: bool,
    ) -> Result<Option<Vec<ContextEntry>>> {
        if self.views.read().get(&Self::key(user_id, thread_id)).is_none() {
            if self.regenerate_context(user_id, thread_id)?.is_none() {
                return Ok(None);
            }
        }

        let views = self.views.read();
        let Some(view) = views.get(&Self::key(user_id, thread_id)) else {
            return Ok(None);
        };

        let entries = view
            .entries
            .iter()
            .cloned()
            .map(|mut e| {
                if strip_reasoning {
                    e.reasoning_content = None;
                }
                e
            })
            .collect();
        Ok(Some(entries))
    }

    /// Rebuild the cached view from history, applying the projection rules,
    /// and bump `mutation_count`. Returns `None` if the thread doesn't
    /// exist (or isn't the caller's).
    pub fn regenerate_context(&self, user_id: &str, thread_id: &str) -> Result<Option<()>> {
        let Some(messages) = self.history.get_messages(user_id, thread_id)? else {
            return Ok(None);
        };

        let entries = project(&messages);
        let key = Self::key(user_id, thread_id);
        let mut views = self.views.write();
        let mutation_count = views.get(&key).map(|v| v.mutation_count).unwrap_or(0) + 1;
        views.insert(key, CachedView { entries, mutation_count });
        TraceEvent::ContextInvalidated {
            thread_id: thread_id.to_string(),
            user_id: user_id.to_string(),
        }
        .emit();
        Ok(Some(()))
    }

    /// Append a model-visible entry, bumping `mutation_count`. Returns the
    /// entry's id.
    pub fn add_message(
        &self,
        user_id: &str,
        thread_id: &str,
        mut entry: ContextEntry,
        id: Option<String>,
    ) -> Result<String> {
        if let Some(id) = id {
            entry.id = id;
        }
        let id = entry.id.clone();
        let key = Self::key(user_id, thread_id);
        let mut views = self.views.write();
        let view = views
            .entry(key)
            .or_insert_with(|| CachedView { entries: Vec::new(), mutation_count: 0 });
        view.entries.push(entry);
        view.mutation_count += 1;
        Ok(id)
    }

    pub fn update_message(
        &self,
        user_id: &str,
        thread_id: &str,
        id: &str,
        content: Option<&str>,
    ) -> Result<bool> {
        let key = Self::key(user_id, thread_id);
        let mut views = self.views.write();
        let Some(view) = views.get_mut(&key) else {
            return Ok(false);
        };
        let Some(entry) = view.entries.iter_mut().find(|e| e.id == id) else {
            return Ok(false);
        };
        if let Some(content) = content {
            entry.content = content.to_string();
        }
        view.mutation_count += 1;
        Ok(true)
    }

    /// Remove entries by id. Used to scrub transient `thinking` entries
    /// once their tool round resolves.
    pub fn remove_messages(&self, user_id: &str, thread_id: &str, ids: &[String]) -> Result<usize> {
        let key = Self::key(user_id, thread_id);
        let mut views = self.views.write();
        let Some(view) = views.get_mut(&key) else {
            return Ok(0);
        };
        let before = view.entries.len();
        view.entries.retain(|e| !ids.contains(&e.id));
        let removed = before - view.entries.len();
        if removed > 0 {
            view.mutation_count += 1;
        }
        Ok(removed)
    }

    /// Drop the cached view; the next read regenerates it from history.
    pub fn invalidate(&self, user_id: &str, thread_id: &str) {
        self.views.write().remove(&Self::key(user_id, thread_id));
    }

    pub fn mutation_count(&self, user_id: &str, thread_id: &str) -> Option<u64> {
        self.views
            .read()
            .get(&Self::key(user_id, thread_id))
            .map(|v| v.mutation_count)
    }

    /// Atomic read-check-write primitive for mutation-safe background
    /// work: `f` receives the current entries and returns the replacement
    /// list, but only if `expected_mutation_count` still matches — so a
    /// background task that read the count, did slow work, and comes back
    /// to write loses the race cleanly instead of clobbering a concurrent
    /// mutation.
    pub fn set_context(
        &self,
        user_id: &str,
        thread_id: &str,
        expected_mutation_count: u64,
        entries: Vec<ContextEntry>,
    ) -> Result<bool> {
        let key = Self::key(user_id, thread_id);
        let mut views = self.views.write();
        let Some(view) = views.get_mut(&key) else {
            return Err(Error::NotFound(format!("no cached context for thread {thread_id}")));
        };
        if view.mutation_count != expected_mutation_count {
            return Ok(false);
        }
        view.entries = entries;
        view.mutation_count += 1;
        Ok(true)
    }
}

/// history -> model view projection (spec §4.3):
/// 1. user message_text -> {role: user, content}
/// 2. thinking chunks are never reconstructed here: they're transient,
///    live only in the cached view for as long as their turn's tool calls
///    are unresolved, added directly via `add_message` and scrubbed via
///    `remove_messages` once the round resolves. `HistoryLog` is
///    append-only, so if this projection pulled them back in from
///    persisted history on every regenerate, a resolved turn's thinking
///    would reappear forever; the orchestrator is the only writer of
///    thinking entries in the live view.
/// 3. assistant message_text -> {role: assistant, content}, carrying
///    pending tool_calls is the orchestrator's concern (entries here are
///    plain content; the orchestrator attaches `tool_calls` before
///    sending to the model, since that's turn-local state, not history).
/// 4. tool call_id -> one {role: tool, tool_call_id, content} entry per
///    call_id, from its *last* tool_update (interim progress is dropped).
fn project(messages: &[Message]) -> Vec<ContextEntry> {
    let mut entries = Vec::with_capacity(messages.len());
    let mut last_tool_index: HashMap<String, usize> = HashMap::new();

    for m in messages {
        match (m.role, m.kind) {
            (Role::User, MessageKind::MessageText) => {
                entries.push(ContextEntry::new(Role::User, m.content.clone()));
            }
            (Role::Assistant, MessageKind::MessageText) => {
                entries.push(ContextEntry::new(Role::Assistant, m.content.clone()));
            }
            (Role::Tool, MessageKind::ToolUpdate) => {
                let Some(call_id) = &m.call_id else { continue };
                if let Some(&idx) = last_tool_index.get(call_id) {
                    entries[idx] = ContextEntry::new(Role::Tool, m.content.clone())
                        .with_tool_call_id(call_id.clone());
                } else {
                    last_tool_index.insert(call_id.clone(), entries.len());
                    entries.push(
                        ContextEntry::new(Role::Tool, m.content.clone())
                            .with_tool_call_id(call_id.clone()),
                    );
                }
            }
            _ => {}
        }
    }

    entries
}
