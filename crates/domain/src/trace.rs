use serde::Serialize;

/// Structured, one-shot domain events emitted alongside `tracing` spans.
///
/// Each variant serializes to JSON and is logged via [`TraceEvent::emit`]
/// under a single consistent message (`"tl_event"`), so a log pipeline can
/// filter on the message and parse `trace_event` as structured JSON instead
/// of grepping free-text log lines.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEvent {
    ThreadCreated {
        thread_id: String,
        user_id: String,
    },
    MutationApplied {
        thread_id: String,
        user_id: String,
        mutation_count: u64,
    },
    ToolInvoked {
        turn_correlation_id: String,
        tool_name: String,
        call_id: String,
    },
    ToolFinished {
        turn_correlation_id: String,
        tool_name: String,
        call_id: String,
        ok: bool,
    },
    BusyRetried {
        store: String,
        attempt: u32,
        delay_ms: u64,
    },
    SchemaConflictDetected {
        store: String,
        field: String,
    },
    ToolLoopExhausted {
        turn_correlation_id: String,
        max_rounds: usize,
    },
    ContextInvalidated {
        thread_id: String,
        user_id: String,
    },
    BackgroundTaskStarted {
        name: String,
    },
    BackgroundTaskAborted {
        name: String,
        reason: String,
    },
}

impl TraceEvent {
    /// Emit this event through `tracing`, at `info` level except for the
    /// two failure-adjacent variants which log at `warn`.
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_else(|_| "<unserializable>".to_string());
        match self {
            TraceEvent::SchemaConflictDetected { .. } | TraceEvent::ToolLoopExhausted { .. } => {
                tracing::warn!(trace_event = %json, "tl_event");
            }
            _ => {
                tracing::info!(trace_event = %json, "tl_event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_on_event_field() {
        let e = TraceEvent::ThreadCreated {
            thread_id: "t1".into(),
            user_id: "u1".into(),
        };
        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(v["event"], "thread_created");
        assert_eq!(v["thread_id"], "t1");
    }
}
