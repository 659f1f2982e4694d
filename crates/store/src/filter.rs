use serde_json::Value;
use turnloom_domain::Error;

/// A single field predicate. `Contains` only applies to `json_collection`
/// fields and tests JSON-array membership.
#[derive(Debug, Clone)]
pub enum Predicate {
    Eq(Value),
    Like(String),
    Contains(Value),
}

/// Boolean AND of field predicates. Always combined with `user_id = ?` by
/// the caller — a `Filter` never expresses tenancy itself.
#[derive(Debug, Clone, Default)]
pub struct Filter(pub Vec<(String, Predicate)>);

impl Filter {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.push((field.into(), Predicate::Eq(value.into())));
        self
    }

    pub fn like(mut self, field: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.0
            .push((field.into(), Predicate::Like(pattern.into())));
        self
    }

    pub fn contains(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0
            .push((field.into(), Predicate::Contains(value.into())));
        self
    }

    /// Render this filter as a `WHERE`-clause fragment (without the leading
    /// `WHERE`) plus its positional parameters, validating that every
    /// referenced field exists in `schema`. Always returns a fragment that
    /// is safe to AND with `user_id = ?`.
    pub(crate) fn to_sql(
        &self,
        schema: &crate::schema::Schema,
    ) -> turnloom_domain::Result<(String, Vec<rusqlite::types::Value>)> {
        use rusqlite::types::Value as SqlValue;

        let mut clauses = Vec::new();
        let mut params = Vec::new();

        for (field, pred) in &self.0 {
            if schema.field(field).is_none() {
                return Err(Error::Validation(format!(
                    "unknown filter field: {field}"
                )));
            }
            match pred {
                Predicate::Eq(v) => {
                    clauses.push(format!("{field} = ?"));
                    params.push(json_to_sql(v));
                }
                Predicate::Like(pattern) => {
                    clauses.push(format!("{field} LIKE ?"));
                    params.push(SqlValue::Text(pattern.clone()));
                }
                Predicate::Contains(v) => {
                    // json_collection fields store no parent column; this
                    // operator is only meaningful against a field whose
                    // content is a JSON array/object, checked via a
                    // SQLite `json_each` membership test.
                    clauses.push(format!(
                        "EXISTS (SELECT 1 FROM json_each({field}) WHERE json_each.value = ?)"
                    ));
                    params.push(json_to_sql(v));
                }
            }
        }

        if clauses.is_empty() {
            Ok(("1=1".to_string(), params))
        } else {
            Ok((clauses.join(" AND "), params))
        }
    }
}

fn json_to_sql(v: &Value) -> rusqlite::types::Value {
    use rusqlite::types::Value as SqlValue;
    match v {
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlValue::Integer(i)
            } else {
                SqlValue::Real(n.as_f64().unwrap_or_default())
            }
        }
        Value::Bool(b) => SqlValue::Integer(if *b { 1 } else { 0 }),
        Value::Null => SqlValue::Null,
        other => SqlValue::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDef, FieldKind, Schema};

    fn schema() -> Schema {
        Schema::new(vec![
            FieldDef::new("title", FieldKind::Text),
            FieldDef::new("priority", FieldKind::Integer),
        ])
    }

    #[test]
    fn unknown_field_is_validation_error() {
        let f = Filter::new().eq("nope", "x");
        let err = f.to_sql(&schema()).unwrap_err();
        assert_eq!(err.kind(), "Validation");
    }

    #[test]
    fn empty_filter_is_always_true() {
        let f = Filter::new();
        let (sql, params) = f.to_sql(&schema()).unwrap();
        assert_eq!(sql, "1=1");
        assert!(params.is_empty());
    }

    #[test]
    fn multiple_predicates_and_together() {
        let f = Filter::new().eq("title", "x").like("title", "%y%");
        let (sql, params) = f.to_sql(&schema()).unwrap();
        assert_eq!(sql, "title = ? AND title LIKE ?");
        assert_eq!(params.len(), 2);
    }
}
