use serde::{Deserialize, Serialize};

/// A field's kind within a store schema. Stored schemas are process-global,
/// not per-user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Integer,
    Real,
    Bool,
    Json,
    JsonCollection,
}

impl FieldKind {
    /// The SQLite column affinity used for this kind's column in the
    /// parent table. `JsonCollection` fields get no parent column at all —
    /// they live entirely in a child table.
    pub fn sqlite_type(self) -> &'static str {
        match self {
            FieldKind::Text | FieldKind::Json => "TEXT",
            FieldKind::Integer | FieldKind::Bool => "INTEGER",
            FieldKind::Real => "REAL",
            FieldKind::JsonCollection => "TEXT",
        }
    }

    /// Whether this field contributes a column to the store's FTS table.
    pub fn is_indexable(self) -> bool {
        matches!(self, FieldKind::Text | FieldKind::Json | FieldKind::JsonCollection)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Integer => "integer",
            FieldKind::Real => "real",
            FieldKind::Bool => "bool",
            FieldKind::Json => "json",
            FieldKind::JsonCollection => "json_collection",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "text" => FieldKind::Text,
            "integer" => FieldKind::Integer,
            "real" => FieldKind::Real,
            "bool" => FieldKind::Bool,
            "json" => FieldKind::Json,
            "json_collection" => FieldKind::JsonCollection,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// A store's schema: an ordered map from field name to field kind.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Schema {
    pub fields: Vec<FieldDef>,
}

impl Schema {
    pub fn new(fields: Vec<FieldDef>) -> Self {
        Self { fields }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn indexable_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.kind.is_indexable())
    }

    pub fn collection_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields
            .iter()
            .filter(|f| f.kind == FieldKind::JsonCollection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_collection_has_no_parent_column_type_distinction_but_is_indexable() {
        assert!(FieldKind::JsonCollection.is_indexable());
        assert!(!FieldKind::Integer.is_indexable());
    }

    #[test]
    fn round_trips_through_str() {
        for kind in [
            FieldKind::Text,
            FieldKind::Integer,
            FieldKind::Real,
            FieldKind::Bool,
            FieldKind::Json,
            FieldKind::JsonCollection,
        ] {
            assert_eq!(FieldKind::from_str(kind.as_str()), Some(kind));
        }
    }
}
