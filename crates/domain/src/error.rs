/// Shared error type used across all turnloom crates.
///
/// Variants split into two groups: terminal structural errors
/// (`Validation`, `SchemaConflict`, `PermissionDenied`, ...) that a caller
/// must not retry, and transient ones (`Busy`) that the Store's retry loop
/// absorbs before they ever reach a caller. `ToolExecution` and `Upstream`
/// are turn-level failures the orchestrator turns into `error` events
/// rather than aborting the process.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("sqlite: {0}")]
    Sqlite(String),

    #[error("validation: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("schema conflict: {0}")]
    SchemaConflict(String),

    #[error("busy: {0}")]
    Busy(String),

    #[error("tool loop exhausted after {0} rounds")]
    ToolLoopExhausted(usize),

    #[error("tool execution failed: {tool}: {message}")]
    ToolExecution { tool: String, message: String },

    #[error("upstream model error: {0}")]
    Upstream(String),

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Taxonomy label used in trace events and `error` envelopes. Never
    /// includes the message payload, only the kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Io(_) => "Io",
            Error::Json(_) => "Json",
            Error::Sqlite(_) => "Sqlite",
            Error::Validation(_) => "Validation",
            Error::NotFound(_) => "NotFound",
            Error::PermissionDenied(_) => "PermissionDenied",
            Error::SchemaConflict(_) => "SchemaConflict",
            Error::Busy(_) => "Busy",
            Error::ToolLoopExhausted(_) => "ToolLoopExhausted",
            Error::ToolExecution { .. } => "ToolExecution",
            Error::Upstream(_) => "Upstream",
            Error::Config(_) => "Config",
            Error::Other(_) => "Other",
        }
    }

    /// Whether the Store's busy-retry loop should retry this error rather
    /// than surface it.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Busy(_))
    }

    /// Whether this error must abort the in-flight turn, as opposed to
    /// being absorbed (middleware and tool failures are logged and folded
    /// into the transcript instead of aborting).
    pub fn is_turn_fatal(&self) -> bool {
        matches!(
            self,
            Error::Upstream(_) | Error::Sqlite(_) | Error::Busy(_) | Error::ToolLoopExhausted(_)
        )
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(ref se, _) = e {
            if se.code == rusqlite::ErrorCode::DatabaseBusy {
                return Error::Busy(e.to_string());
            }
        }
        Error::Sqlite(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_never_leaks_message_text() {
        let e = Error::Validation("contains a secret".into());
        assert_eq!(e.kind(), "Validation");
        assert!(!e.kind().contains("secret"));
    }

    #[test]
    fn turn_fatal_classification() {
        assert!(Error::Upstream("x".into()).is_turn_fatal());
        assert!(!Error::ToolExecution {
            tool: "t".into(),
            message: "x".into()
        }
        .is_turn_fatal());
        assert!(!Error::Validation("x".into()).is_turn_fatal());
    }

    #[test]
    fn busy_is_retryable_others_are_not() {
        assert!(Error::Busy("locked".into()).is_retryable());
        assert!(!Error::NotFound("thread".into()).is_retryable());
    }
}
