use turnloom_domain::Error;

/// The structured `{error, tool, arguments}` envelope a tool failure is
/// reported as, rather than being thrown past the R2R adapter.
pub fn error_envelope(tool: &str, arguments: &serde_json::Value, err: &Error) -> serde_json::Value {
    serde_json::json!({
        "error": err.kind(),
        "tool": tool,
        "arguments": arguments,
    })
}
