use crate::thread::ThreadHeader;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use turnloom_domain::{Message, MessageKind, Role};
use turnloom_store::{FieldDef, FieldKind, Filter, Schema, Store};
use turnloom_domain::{Error, Result};

const THREADS_STORE: &str = "threads";
const MESSAGES_FIELD: &str = "messages";
/// Characters of context kept on each side of a search match, matching the
/// teacher's fixed preview-window convention.
const SNIPPET_RADIUS: usize = 80;

/// A thin façade over the Store implementing the thread/message API. All
/// tenancy enforcement is inherited from the Store: every call here takes
/// `user_id` and passes it straight through.
pub struct HistoryLog {
    store: Arc<Store>,
}

impl HistoryLog {
    /// Registers the `threads` store schema. Idempotent — safe to call on
    /// every startup.
    pub fn open(store: Arc<Store>) -> Result<Self> {
        let schema = Schema::new(vec![
            FieldDef::new("title", FieldKind::Text),
            FieldDef::new("model", FieldKind::Text),
            FieldDef::new("system_prompt", FieldKind::Text),
            FieldDef::new("archived", FieldKind::Bool),
            FieldDef::new(MESSAGES_FIELD, FieldKind::JsonCollection),
        ]);
        store.create_store_if_not_exists(THREADS_STORE, &schema)?;
        Ok(Self { store })
    }

    pub fn create_thread(
        &self,
        user_id: &str,
        title: &str,
        model: &str,
        system_prompt: &str,
    ) -> Result<String> {
        let mut data = Map::new();
        data.insert("title".to_string(), json!(title));
        data.insert("model".to_string(), json!(model));
        data.insert("system_prompt".to_string(), json!(system_prompt));
        data.insert("archived".to_string(), json!(false));
        self.store.add(user_id, THREADS_STORE, &data, None)
    }

    pub fn list_threads(&self, user_id: &str, archived: bool) -> Result<Vec<ThreadHeader>> {
        let filter = Filter::new().eq("archived", archived);
        let records = self
            .store
            .find(user_id, THREADS_STORE, &filter, None, None, Some("created_at"), true)?;
        records.into_iter().map(record_to_header).collect()
    }

    pub fn get_thread(&self, user_id: &str, thread_id: &str) -> Result<Option<ThreadHeader>> {
        match self.store.get(user_id, THREADS_STORE, thread_id, false)? {
            Some(r) => Ok(Some(record_to_header(r)?)),
            None => Ok(None),
        }
    }

    pub fn get_messages(&self, user_id: &str, thread_id: &str) -> Result<Option<Vec<Message>>> {
        if self.store.get(user_id, THREADS_STORE, thread_id, false)?.is_none() {
            return Ok(None);
        }
        let items = self
            .store
            .collection_get(user_id, THREADS_STORE, thread_id, MESSAGES_FIELD, None, None)?;
        let messages = items
            .into_iter()
            .map(|v| serde_json::from_value(v).map_err(Error::from))
            .collect::<Result<Vec<Message>>>()?;
        Ok(Some(messages))
    }

    pub fn append_message(
        &self,
        user_id: &str,
        thread_id: &str,
        role: Role,
        kind: MessageKind,
        content: &str,
        model: Option<&str>,
        call_id: Option<&str>,
    ) -> Result<()> {
        let message = Message {
            id: uuid::Uuid::new_v4().to_string(),
            thread_id: thread_id.to_string(),
            role,
            kind,
            content: content.to_string(),
            timestamp: chrono::Utc::now(),
            model: model.map(|s| s.to_string()),
            call_id: call_id.map(|s| s.to_string()),
        };
        let item = serde_json::to_value(&message)?;
        self.store
            .collection_append(user_id, THREADS_STORE, thread_id, MESSAGES_FIELD, &item)?;
        Ok(())
    }

    pub fn update_thread(&self, user_id: &str, thread_id: &str, title: Option<&str>) -> Result<bool> {
        let mut updates = Map::new();
        if let Some(title) = title {
            updates.insert("title".to_string(), json!(title));
        }
        self.store.update(user_id, THREADS_STORE, thread_id, &updates, true)
    }

    pub fn archive_thread(&self, user_id: &str, thread_id: &str) -> Result<bool> {
        let mut updates = Map::new();
        updates.insert("archived".to_string(), json!(true));
        self.store.update(user_id, THREADS_STORE, thread_id, &updates, true)
    }

    pub fn delete_thread(&self, user_id: &str, thread_id: &str) -> Result<bool> {
        self.store.delete(user_id, THREADS_STORE, thread_id)
    }

    /// Union of thread-title and message-content full-text matches,
    /// deduplicated by thread, with a `±SNIPPET_RADIUS` character preview
    /// around the first matching occurrence.
    pub fn search(&self, user_id: &str, query: &str) -> Result<Vec<SearchHit>> {
        let records = self
            .store
            .full_text_search(user_id, THREADS_STORE, query, Some(50), None)?;

        let mut hits = Vec::with_capacity(records.len());
        for record in records {
            let thread_id = record["id"].as_str().unwrap_or_default().to_string();
            let title = record["title"].as_str().unwrap_or_default().to_string();

            let snippet = extract_snippet(user_id, &self.store, &thread_id, &title, query)?
                .unwrap_or_else(|| truncate(&title, SNIPPET_RADIUS * 2));

            hits.push(SearchHit {
                thread_id,
                title,
                snippet,
            });
        }
        Ok(hits)
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SearchHit {
    pub thread_id: String,
    pub title: String,
    pub snippet: String,
}

fn record_to_header(record: Map<String, Value>) -> Result<ThreadHeader> {
    Ok(ThreadHeader {
        id: record["id"].as_str().unwrap_or_default().to_string(),
        title: record["title"].as_str().unwrap_or_default().to_string(),
        model: record["model"].as_str().unwrap_or_default().to_string(),
        system_prompt: record["system_prompt"].as_str().unwrap_or_default().to_string(),
        archived: record["archived"].as_i64().unwrap_or(0) != 0,
        created_at: record["created_at"]
            .as_str()
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .unwrap_or_else(chrono::Utc::now),
    })
}

fn extract_snippet(
    user_id: &str,
    store: &Store,
    thread_id: &str,
    title: &str,
    query: &str,
) -> Result<Option<String>> {
    let needle = query.split_whitespace().next().unwrap_or(query).to_lowercase();
    if needle.is_empty() {
        return Ok(None);
    }

    if let Some(pos) = title.to_lowercase().find(&needle) {
        return Ok(Some(window(title, pos, needle.len())));
    }

    let items = store.collection_get(user_id, THREADS_STORE, thread_id, MESSAGES_FIELD, None, None)?;
    for item in items {
        let content = item
            .get("content")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        if let Some(pos) = content.to_lowercase().find(&needle) {
            return Ok(Some(window(content, pos, needle.len())));
        }
    }
    Ok(None)
}

/// Build a `±SNIPPET_RADIUS` character window around a byte offset,
/// clamped to char boundaries.
fn window(text: &str, match_start: usize, match_len: usize) -> String {
    let start = match_start.saturating_sub(SNIPPET_RADIUS);
    let end = (match_start + match_len + SNIPPET_RADIUS).min(text.len());
    let start = floor_char_boundary(text, start);
    let end = ceil_char_boundary(text, end);
    text[start..end].to_string()
}

fn truncate(text: &str, max_len: usize) -> String {
    let end = ceil_char_boundary(text, max_len.min(text.len()));
    text[..end].to_string()
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx < s.len() && !s.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_list_get_round_trip() {
        let store = Arc::new(Store::open_in_memory("hist1").unwrap());
        let log = HistoryLog::open(store).unwrap();
        let id = log.create_thread("alice", "my thread", "gpt", "be nice").unwrap();

        let header = log.get_thread("alice", &id).unwrap().unwrap();
        assert_eq!(header.title, "my thread");
        assert!(!header.archived);

        assert!(log.get_thread("bob", &id).unwrap().is_none());

        let threads = log.list_threads("alice", false).unwrap();
        assert_eq!(threads.len(), 1);
    }

    #[test]
    fn append_and_get_messages_preserve_order() {
        let store = Arc::new(Store::open_in_memory("hist2").unwrap());
        let log = HistoryLog::open(store).unwrap();
        let id = log.create_thread("alice", "t", "gpt", "").unwrap();

        log.append_message("alice", &id, Role::User, MessageKind::MessageText, "hi", None, None)
            .unwrap();
        log.append_message(
            "alice",
            &id,
            Role::Assistant,
            MessageKind::MessageText,
            "hello",
            Some("gpt"),
            None,
        )
        .unwrap();

        let messages = log.get_messages("alice", &id).unwrap().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "hi");
        assert_eq!(messages[1].content, "hello");
    }

    #[test]
    fn archive_hides_from_default_listing() {
        let store = Arc::new(Store::open_in_memory("hist3").unwrap());
        let log = HistoryLog::open(store).unwrap();
        let id = log.create_thread("alice", "t", "gpt", "").unwrap();
        log.archive_thread("alice", &id).unwrap();

        assert!(log.list_threads("alice", false).unwrap().is_empty());
        assert_eq!(log.list_threads("alice", true).unwrap().len(), 1);
    }

    #[test]
    fn search_finds_message_content_with_snippet() {
        let store = Arc::new(Store::open_in_memory("hist4").unwrap());
        let log = HistoryLog::open(store).unwrap();
        let id = log.create_thread("alice", "random title", "gpt", "").unwrap();
        log.append_message(
            "alice",
            &id,
            Role::User,
            MessageKind::MessageText,
            "what's the weather in solarized valley today",
            None,
            None,
        )
        .unwrap();

        let hits = log.search("alice", "solarized").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].thread_id, id);
        assert!(hits[0].snippet.to_lowercase().contains("solarized"));
    }

    #[test]
    fn delete_thread_removes_it_and_its_messages() {
        let store = Arc::new(Store::open_in_memory("hist5").unwrap());
        let log = HistoryLog::open(store).unwrap();
        let id = log.create_thread("alice", "t", "gpt", "").unwrap();
        log.append_message("alice", &id, Role::User, MessageKind::MessageText, "hi", None, None)
            .unwrap();

        assert!(log.delete_thread("alice", &id).unwrap());
        assert!(log.get_thread("alice", &id).unwrap().is_none());
    }
}
