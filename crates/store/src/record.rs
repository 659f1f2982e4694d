use serde_json::{Map, Value};

/// A fully materialized record: the scalar fields plus, when requested,
/// each `json_collection` field as an ordered list under its own key.
pub type Record = Map<String, Value>;

pub(crate) fn sql_value_to_json(v: rusqlite::types::ValueRef<'_>) -> Value {
    use rusqlite::types::ValueRef;
    match v {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(base64_like(b)),
    }
}

/// Fallback rendering for blob columns, which no field kind in this store
/// actually produces today but `ValueRef` still requires a match arm for.
fn base64_like(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
