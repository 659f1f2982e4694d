use crate::engine::Engine;
use crate::filter::Filter;
use crate::record::{sql_value_to_json, Record};
use crate::schema::{FieldKind, Schema};
use parking_lot::RwLock;
use rusqlite::types::Value as SqlValue;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use turnloom_domain::config::StoreConfig;
use turnloom_domain::{Error, Result, TraceEvent};

const METADATA_TABLE: &str = "__store_schemas";

/// The multi-tenant tabular store. One `Store` owns the whole database;
/// individual named tables (created via [`Store::create_store_if_not_exists`])
/// are the per-"collection" surfaces the rest of the system calls stores.
pub struct Store {
    engine: Arc<Engine>,
    schemas: RwLock<HashMap<String, Schema>>,
}

impl Store {
    pub fn open(config: StoreConfig) -> Result<Self> {
        let engine = Arc::new(Engine::open(config)?);
        let store = Self {
            engine,
            schemas: RwLock::new(HashMap::new()),
        };
        store.ensure_metadata_table()?;
        store.load_schema_cache()?;
        Ok(store)
    }

    /// Open a shared-cache in-memory store, for tests and local fixtures.
    pub fn open_in_memory(name: &str) -> Result<Self> {
        let engine = Arc::new(Engine::open_in_memory(name)?);
        let store = Self {
            engine,
            schemas: RwLock::new(HashMap::new()),
        };
        store.ensure_metadata_table()?;
        store.load_schema_cache()?;
        Ok(store)
    }

    fn ensure_metadata_table(&self) -> Result<()> {
        self.engine.with_writer(|txn| {
            txn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {METADATA_TABLE} (
                    store_name TEXT NOT NULL,
                    field_name TEXT NOT NULL,
                    field_kind TEXT NOT NULL,
                    PRIMARY KEY (store_name, field_name)
                );"
            ))?;
            Ok(())
        })
    }

    fn load_schema_cache(&self) -> Result<()> {
        let conn = self.engine.reader()?;
        let mut stmt =
            conn.prepare(&format!("SELECT store_name, field_name, field_kind FROM {METADATA_TABLE}"))?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut cache: HashMap<String, Schema> = HashMap::new();
        for row in rows {
            let (store_name, field_name, field_kind) = row?;
            let kind = FieldKind::from_str(&field_kind).ok_or_else(|| {
                Error::Sqlite(format!("corrupt schema metadata: unknown kind {field_kind}"))
            })?;
            cache
                .entry(store_name)
                .or_default()
                .fields
                .push(crate::schema::FieldDef::new(field_name, kind));
        }
        *self.schemas.write() = cache;
        Ok(())
    }

    /// Idempotent. Adds missing columns to an existing table; fails with
    /// `SchemaConflict` if a present field's kind differs from what is
    /// requested.
    pub fn create_store_if_not_exists(&self, name: &str, schema: &Schema) -> Result<()> {
        validate_identifier(name)?;
        for f in &schema.fields {
            validate_identifier(&f.name)?;
        }

        let existing = self.schemas.read().get(name).cloned();

        if let Some(existing) = &existing {
            for f in &schema.fields {
                if let Some(prev) = existing.field(&f.name) {
                    if prev.kind != f.kind {
                        TraceEvent::SchemaConflictDetected {
                            store: name.to_string(),
                            field: f.name.clone(),
                        }
                        .emit();
                        return Err(Error::SchemaConflict(format!(
                            "field '{}' on store '{}' is {:?}, requested {:?}",
                            f.name, name, prev.kind, f.kind
                        )));
                    }
                }
            }
        }

        let new_fields: Vec<_> = schema
            .fields
            .iter()
            .filter(|f| existing.as_ref().map(|e| e.field(&f.name).is_none()).unwrap_or(true))
            .collect();

        self.engine.with_writer(|txn| {
            if existing.is_none() {
                let mut cols = vec![
                    "id TEXT PRIMARY KEY".to_string(),
                    "user_id TEXT NOT NULL".to_string(),
                    "created_at TEXT NOT NULL".to_string(),
                ];
                for f in &schema.fields {
                    if f.kind != FieldKind::JsonCollection {
                        cols.push(format!("{} {}", f.name, f.kind.sqlite_type()));
                    }
                }
                txn.execute_batch(&format!(
                    "CREATE TABLE IF NOT EXISTS {name} ({});",
                    cols.join(", ")
                ))?;
                txn.execute_batch(&format!(
                    "CREATE INDEX IF NOT EXISTS idx_{name}_user ON {name}(user_id);"
                ))?;
            } else {
                for f in &new_fields {
                    if f.kind != FieldKind::JsonCollection {
                        txn.execute_batch(&format!(
                            "ALTER TABLE {name} ADD COLUMN {} {};",
                            f.name,
                            f.kind.sqlite_type()
                        ))?;
                    }
                }
            }

            for f in schema.collection_fields() {
                let child = collection_table_name(name, &f.name);
                txn.execute_batch(&format!(
                    "CREATE TABLE IF NOT EXISTS {child} (
                        id TEXT PRIMARY KEY,
                        parent_id TEXT NOT NULL,
                        user_id TEXT NOT NULL,
                        order_index INTEGER NOT NULL,
                        value_json TEXT NOT NULL,
                        FOREIGN KEY(parent_id) REFERENCES {name}(id) ON DELETE CASCADE
                    );
                    CREATE INDEX IF NOT EXISTS idx_{child}_parent ON {child}(parent_id, order_index);"
                ))?;
            }

            if existing.is_none() {
                let indexable: Vec<&str> = schema
                    .indexable_fields()
                    .map(|f| f.name.as_str())
                    .collect();
                let mut cols = vec![
                    "user_id UNINDEXED".to_string(),
                    "parent_id UNINDEXED".to_string(),
                    "child_id UNINDEXED".to_string(),
                ];
                cols.extend(indexable.iter().map(|s| s.to_string()));
                txn.execute_batch(&format!(
                    "CREATE VIRTUAL TABLE IF NOT EXISTS fts_{name} USING fts5({}, tokenize='porter');",
                    cols.join(", ")
                ))?;
            }
            // Widening an existing FTS5 table with a newly-added indexable
            // field isn't attempted here: FTS5 virtual tables don't support
            // `ALTER TABLE ADD COLUMN`. Fields added after first creation
            // stay out of full_text_search until the store is recreated.

            for f in &new_fields {
                txn.execute(
                    &format!("INSERT OR REPLACE INTO {METADATA_TABLE} (store_name, field_name, field_kind) VALUES (?1, ?2, ?3)"),
                    rusqlite::params![name, f.name, f.kind.as_str()],
                )?;
            }
            Ok(())
        })?;

        let mut cache = self.schemas.write();
        let entry = cache.entry(name.to_string()).or_default();
        for f in new_fields {
            entry.fields.push(f.clone());
        }
        Ok(())
    }

    fn schema_of(&self, name: &str) -> Result<Schema> {
        self.schemas
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::Validation(format!("unknown store: {name}")))
    }

    pub fn add(
        &self,
        user_id: &str,
        name: &str,
        data: &Map<String, Value>,
        record_id: Option<String>,
    ) -> Result<String> {
        let schema = self.schema_of(name)?;
        let id = record_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let created_at = chrono::Utc::now().to_rfc3339();

        let mut cols = vec!["id".to_string(), "user_id".to_string(), "created_at".to_string()];
        let mut values: Vec<SqlValue> = vec![
            SqlValue::Text(id.clone()),
            SqlValue::Text(user_id.to_string()),
            SqlValue::Text(created_at),
        ];

        for (key, value) in data {
            let field = schema
                .field(key)
                .ok_or_else(|| Error::Validation(format!("unknown field '{key}' on store '{name}'")))?;
            if field.kind == FieldKind::JsonCollection {
                continue; // collections are populated only via collection_append
            }
            cols.push(key.clone());
            values.push(coerce(field.kind, value)?);
        }

        let placeholders: Vec<String> = (1..=cols.len()).map(|i| format!("?{i}")).collect();
        let insert_sql = format!(
            "INSERT INTO {name} ({}) VALUES ({})",
            cols.join(", "),
            placeholders.join(", ")
        );

        let fts_row = build_fts_row(&schema, &data.clone());
        let fts_cols: Vec<&str> = schema.indexable_fields().map(|f| f.name.as_str()).collect();

        self.engine.with_writer(|txn| {
            let params: Vec<&dyn rusqlite::ToSql> =
                values.iter().map(|v| v as &dyn rusqlite::ToSql).collect();
            txn.execute(&insert_sql, params.as_slice())?;

            if !fts_cols.is_empty() {
                insert_fts_row(txn, name, user_id, &id, "", &fts_cols, &fts_row)?;
            }
            Ok(())
        })?;

        Ok(id)
    }

    pub fn get(
        &self,
        user_id: &str,
        name: &str,
        id: &str,
        load_collections: bool,
    ) -> Result<Option<Record>> {
        let schema = self.schema_of(name)?;
        let conn = self.engine.reader()?;
        let scalar_fields: Vec<&str> = schema
            .fields
            .iter()
            .filter(|f| f.kind != FieldKind::JsonCollection)
            .map(|f| f.name.as_str())
            .collect();

        let mut cols = vec!["id", "user_id", "created_at"];
        cols.extend(scalar_fields.iter());
        let sql = format!(
            "SELECT {} FROM {name} WHERE id = ?1 AND user_id = ?2",
            cols.join(", ")
        );

        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(rusqlite::params![id, user_id])?;
        let row = match rows.next()? {
            Some(r) => r,
            None => return Ok(None),
        };

        let mut record = Map::new();
        for (i, col) in cols.iter().enumerate() {
            record.insert(col.to_string(), sql_value_to_json(row.get_ref(i)?));
        }
        drop(rows);
        drop(stmt);

        if load_collections {
            for f in schema.collection_fields() {
                let items = self.collection_get(user_id, name, id, &f.name, None, None)?;
                record.insert(f.name.clone(), Value::Array(items));
            }
        }

        Ok(Some(record))
    }

    pub fn update(
        &self,
        user_id: &str,
        name: &str,
        id: &str,
        updates: &Map<String, Value>,
        partial: bool,
    ) -> Result<bool> {
        let _ = partial; // non-collection fields are always set atomically by key
        let schema = self.schema_of(name)?;
        if updates.is_empty() {
            return Ok(self.get(user_id, name, id, false)?.is_some());
        }

        let mut set_clauses = Vec::new();
        let mut values: Vec<SqlValue> = Vec::new();
        for (key, value) in updates {
            let field = schema
                .field(key)
                .ok_or_else(|| Error::Validation(format!("unknown field '{key}' on store '{name}'")))?;
            if field.kind == FieldKind::JsonCollection {
                return Err(Error::Validation(format!(
                    "field '{key}' is a collection and cannot be set via update"
                )));
            }
            set_clauses.push(format!("{key} = ?{}", values.len() + 1));
            values.push(coerce(field.kind, value)?);
        }
        let id_param_idx = values.len() + 1;
        let user_param_idx = values.len() + 2;
        let sql = format!(
            "UPDATE {name} SET {} WHERE id = ?{id_param_idx} AND user_id = ?{user_param_idx}",
            set_clauses.join(", ")
        );

        let fts_cols: Vec<&str> = schema.indexable_fields().map(|f| f.name.as_str()).collect();
        let changed = self.engine.with_writer(|txn| {
            let mut params: Vec<&dyn rusqlite::ToSql> =
                values.iter().map(|v| v as &dyn rusqlite::ToSql).collect();
            params.push(id);
            params.push(user_id);
            let n = txn.execute(&sql, params.as_slice())?;
            if n == 0 {
                return Ok(false);
            }

            if !fts_cols.is_empty() {
                txn.execute(
                    &format!("DELETE FROM fts_{name} WHERE parent_id = ?1 AND child_id = '' AND user_id = ?2"),
                    rusqlite::params![id, user_id],
                )?;

                let scalar_fields: Vec<&str> = schema
                    .fields
                    .iter()
                    .filter(|f| f.kind != FieldKind::JsonCollection)
                    .map(|f| f.name.as_str())
                    .collect();
                let select_sql = format!(
                    "SELECT {} FROM {name} WHERE id = ?1 AND user_id = ?2",
                    scalar_fields.join(", ")
                );
                let current: Map<String, Value> = {
                    let mut stmt = txn.prepare(&select_sql)?;
                    let mut rows = stmt.query(rusqlite::params![id, user_id])?;
                    let row = rows.next()?.ok_or_else(|| {
                        Error::Sqlite("record vanished mid-update".to_string())
                    })?;
                    let mut m = Map::new();
                    for (i, col) in scalar_fields.iter().enumerate() {
                        m.insert(col.to_string(), sql_value_to_json(row.get_ref(i)?));
                    }
                    m
                };
                let fts_row = build_fts_row(&schema, &current);
                insert_fts_row(txn, name, user_id, id, "", &fts_cols, &fts_row)?;
            }
            Ok(true)
        })?;

        Ok(changed)
    }

    pub fn delete(&self, user_id: &str, name: &str, id: &str) -> Result<bool> {
        let schema = self.schema_of(name)?;
        let n = self.engine.with_writer(|txn| {
            for f in schema.collection_fields() {
                let child = collection_table_name(name, &f.name);
                txn.execute(
                    &format!("DELETE FROM {child} WHERE parent_id = ?1 AND user_id = ?2"),
                    rusqlite::params![id, user_id],
                )?;
            }
            let n = txn.execute(
                &format!("DELETE FROM {name} WHERE id = ?1 AND user_id = ?2"),
                rusqlite::params![id, user_id],
            )?;
            txn.execute(
                &format!("DELETE FROM fts_{name} WHERE parent_id = ?1 AND user_id = ?2"),
                rusqlite::params![id, user_id],
            )?;
            Ok(n)
        })?;
        Ok(n > 0)
    }

    pub fn find(
        &self,
        user_id: &str,
        name: &str,
        filter: &Filter,
        limit: Option<i64>,
        offset: Option<i64>,
        order_by: Option<&str>,
        order_desc: bool,
    ) -> Result<Vec<Record>> {
        let schema = self.schema_of(name)?;
        if let Some(ob) = order_by {
            if schema.field(ob).is_none() && ob != "id" && ob != "created_at" {
                return Err(Error::Validation(format!("unknown order_by field: {ob}")));
            }
        }

        let (where_sql, params) = filter.to_sql(&schema)?;
        let scalar_fields: Vec<&str> = schema
            .fields
            .iter()
            .filter(|f| f.kind != FieldKind::JsonCollection)
            .map(|f| f.name.as_str())
            .collect();
        let mut cols = vec!["id", "user_id", "created_at"];
        cols.extend(scalar_fields.iter());

        let mut sql = format!(
            "SELECT {} FROM {name} WHERE user_id = ?1 AND {where_sql}",
            cols.join(", ")
        );
        if let Some(ob) = order_by {
            sql.push_str(&format!(" ORDER BY {ob} {}", if order_desc { "DESC" } else { "ASC" }));
        }
        if let Some(l) = limit {
            sql.push_str(&format!(" LIMIT {l}"));
        }
        if let Some(o) = offset {
            sql.push_str(&format!(" OFFSET {o}"));
        }

        let conn = self.engine.reader()?;
        let mut stmt = conn.prepare(&sql)?;
        let mut all_params: Vec<&dyn rusqlite::ToSql> = vec![user_id];
        all_params.extend(params.iter().map(|v| v as &dyn rusqlite::ToSql));

        let rows = stmt.query_map(all_params.as_slice(), |row| {
            let mut m = Map::new();
            for (i, col) in cols.iter().enumerate() {
                m.insert(col.to_string(), sql_value_to_json(row.get_ref(i)?));
            }
            Ok(m)
        })?;

        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    pub fn count(&self, user_id: &str, name: &str, filter: &Filter) -> Result<u64> {
        let schema = self.schema_of(name)?;
        let (where_sql, params) = filter.to_sql(&schema)?;
        let sql = format!("SELECT COUNT(*) FROM {name} WHERE user_id = ?1 AND {where_sql}");

        let conn = self.engine.reader()?;
        let mut stmt = conn.prepare(&sql)?;
        let mut all_params: Vec<&dyn rusqlite::ToSql> = vec![user_id];
        all_params.extend(params.iter().map(|v| v as &dyn rusqlite::ToSql));
        let n: i64 = stmt.query_row(all_params.as_slice(), |row| row.get(0))?;
        Ok(n as u64)
    }

    pub fn collection_append(
        &self,
        user_id: &str,
        name: &str,
        id: &str,
        field: &str,
        item: &Value,
    ) -> Result<i64> {
        let schema = self.schema_of(name)?;
        let field_def = schema
            .field(field)
            .filter(|f| f.kind == FieldKind::JsonCollection)
            .ok_or_else(|| Error::Validation(format!("'{field}' is not a json_collection field")))?;
        let _ = field_def;
        let child = collection_table_name(name, field);
        let item_json = serde_json::to_string(item)?;

        self.engine.with_writer(|txn| {
            let parent_exists: i64 = txn.query_row(
                &format!("SELECT COUNT(*) FROM {name} WHERE id = ?1 AND user_id = ?2"),
                rusqlite::params![id, user_id],
                |row| row.get(0),
            )?;
            if parent_exists == 0 {
                return Err(Error::NotFound(format!("record {id} not found in store {name}")));
            }

            let max_index: Option<i64> = txn.query_row(
                &format!("SELECT MAX(order_index) FROM {child} WHERE parent_id = ?1 AND user_id = ?2"),
                rusqlite::params![id, user_id],
                |row| row.get(0),
            )?;
            let order_index = max_index.unwrap_or(-1) + 1;

            let child_id = format!("{field}_{}", uuid::Uuid::new_v4());
            txn.execute(
                &format!(
                    "INSERT INTO {child} (id, parent_id, user_id, order_index, value_json) VALUES (?1, ?2, ?3, ?4, ?5)"
                ),
                rusqlite::params![child_id, id, user_id, order_index, item_json],
            )?;

            if schema.field(field).map(|f| f.kind.is_indexable()).unwrap_or(false) {
                let fts_cols = vec![field];
                let mut row = Map::new();
                row.insert(field.to_string(), item.clone());
                insert_fts_row(txn, name, user_id, id, &child_id, &fts_cols, &row)?;
            }

            Ok(order_index)
        })
    }

    pub fn collection_get(
        &self,
        user_id: &str,
        name: &str,
        id: &str,
        field: &str,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<Value>> {
        let schema = self.schema_of(name)?;
        if schema.field(field).map(|f| f.kind) != Some(FieldKind::JsonCollection) {
            return Err(Error::Validation(format!("'{field}' is not a json_collection field")));
        }
        let child = collection_table_name(name, field);
        let mut sql = format!(
            "SELECT value_json FROM {child} WHERE parent_id = ?1 AND user_id = ?2 ORDER BY order_index ASC"
        );
        if let Some(l) = limit {
            sql.push_str(&format!(" LIMIT {l}"));
        }
        if let Some(o) = offset {
            sql.push_str(&format!(" OFFSET {o}"));
        }

        let conn = self.engine.reader()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params![id, user_id], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for r in rows {
            out.push(serde_json::from_str(&r?)?);
        }
        Ok(out)
    }

    pub fn full_text_search(
        &self,
        user_id: &str,
        name: &str,
        query: &str,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<Record>> {
        let _schema = self.schema_of(name)?;
        let conn = self.engine.reader()?;

        let mut sql = format!(
            "SELECT DISTINCT parent_id FROM fts_{name} WHERE fts_{name} MATCH ?1 AND user_id = ?2 ORDER BY rank"
        );
        if let Some(l) = limit {
            sql.push_str(&format!(" LIMIT {l}"));
        }
        if let Some(o) = offset {
            sql.push_str(&format!(" OFFSET {o}"));
        }

        let parent_ids: Vec<String> = {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(rusqlite::params![query, user_id], |row| row.get(0))?;
            let mut ids = Vec::new();
            for r in rows {
                ids.push(r?);
            }
            ids
        };

        let mut out = Vec::with_capacity(parent_ids.len());
        for id in &parent_ids {
            if let Some(record) = self.get(user_id, name, id, false)? {
                out.push(record);
            }
        }
        Ok(out)
    }
}

fn validate_identifier(s: &str) -> Result<()> {
    if s.is_empty()
        || !s
            .chars()
            .next()
            .map(|c| c.is_ascii_alphabetic() || c == '_')
            .unwrap_or(false)
        || !s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(Error::Validation(format!("invalid identifier: {s}")));
    }
    Ok(())
}

fn collection_table_name(store: &str, field: &str) -> String {
    format!("{store}__{field}")
}

fn coerce(kind: FieldKind, value: &Value) -> Result<SqlValue> {
    Ok(match (kind, value) {
        (FieldKind::Text, Value::String(s)) => SqlValue::Text(s.clone()),
        (FieldKind::Text, Value::Null) => SqlValue::Null,
        (FieldKind::Integer, Value::Number(n)) => SqlValue::Integer(
            n.as_i64()
                .ok_or_else(|| Error::Validation("expected integer".to_string()))?,
        ),
        (FieldKind::Integer, Value::Null) => SqlValue::Null,
        (FieldKind::Real, Value::Number(n)) => SqlValue::Real(n.as_f64().unwrap_or_default()),
        (FieldKind::Real, Value::Null) => SqlValue::Null,
        (FieldKind::Bool, Value::Bool(b)) => SqlValue::Integer(if *b { 1 } else { 0 }),
        (FieldKind::Bool, Value::Null) => SqlValue::Null,
        (FieldKind::Json, _) => SqlValue::Text(serde_json::to_string(value)?),
        (FieldKind::JsonCollection, _) => {
            return Err(Error::Validation(
                "json_collection fields are set via collection_append, not add/update".to_string(),
            ))
        }
        _ => {
            return Err(Error::Validation(format!(
                "value does not match declared field kind {:?}",
                kind
            )))
        }
    })
}

fn build_fts_row(schema: &Schema, data: &Map<String, Value>) -> Map<String, Value> {
    let mut row = Map::new();
    for f in schema.indexable_fields() {
        let v = data.get(&f.name).cloned().unwrap_or(Value::Null);
        let text = match v {
            Value::String(s) => s,
            Value::Null => String::new(),
            other => other.to_string(),
        };
        row.insert(f.name.clone(), Value::String(text));
    }
    row
}

fn insert_fts_row(
    txn: &rusqlite::Transaction<'_>,
    store: &str,
    user_id: &str,
    parent_id: &str,
    child_id: &str,
    fts_cols: &[&str],
    row: &Map<String, Value>,
) -> Result<()> {
    let mut cols = vec!["user_id".to_string(), "parent_id".to_string(), "child_id".to_string()];
    cols.extend(fts_cols.iter().map(|s| s.to_string()));
    let placeholders: Vec<String> = (1..=cols.len()).map(|i| format!("?{i}")).collect();

    let mut values: Vec<String> = vec![user_id.to_string(), parent_id.to_string(), child_id.to_string()];
    for c in fts_cols {
        let text = match row.get(*c) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        };
        values.push(text);
    }

    let sql = format!(
        "INSERT INTO fts_{store} ({}) VALUES ({})",
        cols.join(", "),
        placeholders.join(", ")
    );
    let params: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v as &dyn rusqlite::ToSql).collect();
    txn.execute(&sql, params.as_slice())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldDef;
    use serde_json::json;

    fn notes_schema() -> Schema {
        Schema::new(vec![
            FieldDef::new("title", FieldKind::Text),
            FieldDef::new("priority", FieldKind::Integer),
            FieldDef::new("tags", FieldKind::JsonCollection),
        ])
    }

    #[test]
    fn add_get_round_trip_is_tenant_scoped() {
        let store = Store::open_in_memory("t1").unwrap();
        store.create_store_if_not_exists("notes", &notes_schema()).unwrap();

        let mut data = Map::new();
        data.insert("title".to_string(), json!("hello"));
        data.insert("priority".to_string(), json!(3));
        let id = store.add("alice", "notes", &data, None).unwrap();

        let got = store.get("alice", "notes", &id, false).unwrap().unwrap();
        assert_eq!(got["title"], json!("hello"));
        assert_eq!(got["priority"], json!(3));

        assert!(store.get("bob", "notes", &id, false).unwrap().is_none());
    }

    #[test]
    fn schema_conflict_on_retyped_field() {
        let store = Store::open_in_memory("t2").unwrap();
        store.create_store_if_not_exists("notes", &notes_schema()).unwrap();

        let conflicting = Schema::new(vec![FieldDef::new("priority", FieldKind::Text)]);
        let err = store
            .create_store_if_not_exists("notes", &conflicting)
            .unwrap_err();
        assert_eq!(err.kind(), "SchemaConflict");
    }

    #[test]
    fn collection_append_is_ordered_and_requires_parent() {
        let store = Store::open_in_memory("t3").unwrap();
        store.create_store_if_not_exists("notes", &notes_schema()).unwrap();

        let missing = store.collection_append("alice", "notes", "nope", "tags", &json!("x"));
        assert_eq!(missing.unwrap_err().kind(), "NotFound");

        let mut data = Map::new();
        data.insert("title".to_string(), json!("hello"));
        let id = store.add("alice", "notes", &data, None).unwrap();

        let i0 = store.collection_append("alice", "notes", &id, "tags", &json!("a")).unwrap();
        let i1 = store.collection_append("alice", "notes", &id, "tags", &json!("b")).unwrap();
        assert_eq!(i0, 0);
        assert_eq!(i1, 1);

        let items = store.collection_get("alice", "notes", &id, "tags", None, None).unwrap();
        assert_eq!(items, vec![json!("a"), json!("b")]);
    }

    #[test]
    fn delete_cascades_to_collections() {
        let store = Store::open_in_memory("t4").unwrap();
        store.create_store_if_not_exists("notes", &notes_schema()).unwrap();
        let mut data = Map::new();
        data.insert("title".to_string(), json!("hello"));
        let id = store.add("alice", "notes", &data, None).unwrap();
        store.collection_append("alice", "notes", &id, "tags", &json!("a")).unwrap();

        assert!(store.delete("alice", "notes", &id).unwrap());
        assert!(store.get("alice", "notes", &id, false).unwrap().is_none());
        assert!(store.collection_get("alice", "notes", &id, "tags", None, None).unwrap().is_empty());
    }

    #[test]
    fn full_text_search_finds_updated_content_read_your_writes() {
        let store = Store::open_in_memory("t5").unwrap();
        store.create_store_if_not_exists("notes", &notes_schema()).unwrap();
        let mut data = Map::new();
        data.insert("title".to_string(), json!("solarized theme notes"));
        let id = store.add("alice", "notes", &data, None).unwrap();

        let hits = store.full_text_search("alice", "notes", "solarized", None, None).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0]["id"], json!(id));

        let mut update = Map::new();
        update.insert("title".to_string(), json!("gruvbox theme notes"));
        store.update("alice", "notes", &id, &update, true).unwrap();

        let hits = store.full_text_search("alice", "notes", "solarized", None, None).unwrap();
        assert!(hits.is_empty());
        let hits = store.full_text_search("alice", "notes", "gruvbox", None, None).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn find_applies_filter_and_tenant_scope() {
        let store = Store::open_in_memory("t6").unwrap();
        store.create_store_if_not_exists("notes", &notes_schema()).unwrap();
        let mut a = Map::new();
        a.insert("title".to_string(), json!("a"));
        a.insert("priority".to_string(), json!(1));
        store.add("alice", "notes", &a, None).unwrap();
        let mut b = Map::new();
        b.insert("title".to_string(), json!("b"));
        b.insert("priority".to_string(), json!(2));
        store.add("alice", "notes", &b, None).unwrap();
        let mut c = Map::new();
        c.insert("title".to_string(), json!("c"));
        c.insert("priority".to_string(), json!(1));
        store.add("bob", "notes", &c, None).unwrap();

        let filter = Filter::new().eq("priority", 1);
        let results = store.find("alice", "notes", &filter, None, None, None, false).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["title"], json!("a"));
    }
}
