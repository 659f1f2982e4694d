use turnloom_domain::Event;

/// Render an [`Event`] as a single Server-Sent Events frame:
/// `event: <kind>\ndata: <json>\n\n`. The event envelope is transport-
/// agnostic by design; this is the one rendering this core ships.
pub fn to_sse_frame(event: &Event) -> String {
    let kind = serde_json::to_value(&event.event)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| "message".to_string());
    let data = serde_json::to_string(&event.data).unwrap_or_else(|_| "{}".to_string());
    format!("event: {kind}\ndata: {data}\n\n")
}
