//! SQLite-backed record store.

pub mod schema;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use serde_json::Value;

use self::schema::{column, columns, Column, ColumnType, SCHEMA};
use crate::error::StoreError;
use crate::models::EntityKind;
use crate::store::{record_id, Filter, Record, RecordStore};

/// Handle to the on-disk database. Cheap to clone.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Backend(format!("create {}: {}", parent.display(), e)))?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        tracing::debug!("Opened database at {}", path.display());
        Ok(Self::from_connection(conn))
    }

    pub fn open_memory() -> Result<Self, StoreError> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    /// Open the database at the platform data directory.
    pub fn open_default() -> Result<Self, StoreError> {
        Self::open(Self::default_path()?)
    }

    pub fn default_path() -> Result<PathBuf, StoreError> {
        crate::config::data_dir()
            .map(|dir| dir.join("threadline.db"))
            .ok_or_else(|| StoreError::Backend("no home directory for default database".into()))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    pub fn migrate(&self) -> Result<(), StoreError> {
        self.lock()?.execute_batch(SCHEMA)?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Backend("database mutex poisoned".into()))
    }
}

/// Check the record against the table layout and bind its values in column order.
fn bind_record(kind: EntityKind, record: &Record) -> Result<Vec<(&'static Column, SqlValue)>, StoreError> {
    if let Some(unknown) = record.keys().find(|key| column(kind, key).is_none()) {
        return Err(StoreError::Schema {
            kind,
            message: format!("unknown column `{}`", unknown),
        });
    }

    columns(kind)
        .iter()
        .map(|col| {
            let value = record.get(col.name).unwrap_or(&Value::Null);
            if col.required && value.is_null() {
                return Err(StoreError::Schema {
                    kind,
                    message: format!("missing required column `{}`", col.name),
                });
            }
            Ok((col, to_sql(kind, col, value)?))
        })
        .collect()
}

fn to_sql(kind: EntityKind, col: &Column, value: &Value) -> Result<SqlValue, StoreError> {
    let mismatch = || StoreError::Schema {
        kind,
        message: format!("bad value for `{}`: {}", col.name, value),
    };
    Ok(match (col.ty, value) {
        (_, Value::Null) => SqlValue::Null,
        (ColumnType::Text, Value::String(s)) => SqlValue::Text(s.clone()),
        (ColumnType::Integer, Value::Number(n)) => SqlValue::Integer(n.as_i64().ok_or_else(mismatch)?),
        (ColumnType::Bool, Value::Bool(b)) => SqlValue::Integer(*b as i64),
        (ColumnType::Json, v) => SqlValue::Text(serde_json::to_string(v)?),
        _ => return Err(mismatch()),
    })
}

fn from_sql(col: &Column, value: SqlValue) -> Result<Value, StoreError> {
    Ok(match (col.ty, value) {
        (_, SqlValue::Null) => Value::Null,
        (ColumnType::Text, SqlValue::Text(s)) => Value::String(s),
        (ColumnType::Integer, SqlValue::Integer(i)) => Value::from(i),
        (ColumnType::Bool, SqlValue::Integer(i)) => Value::Bool(i != 0),
        (ColumnType::Json, SqlValue::Text(s)) => serde_json::from_str(&s)?,
        (_, other) => {
            return Err(StoreError::Backend(format!(
                "unexpected {:?} in column `{}`",
                other.data_type(),
                col.name
            )))
        }
    })
}

/// Compile a filter to a WHERE clause, appending its parameters.
fn compile_filter(kind: EntityKind, filter: &Filter, params: &mut Vec<SqlValue>) -> Result<String, StoreError> {
    let column_for = |name: &str| {
        column(kind, name).ok_or_else(|| StoreError::Schema {
            kind,
            message: format!("unknown filter column `{}`", name),
        })
    };

    Ok(match filter {
        Filter::All => "1".to_string(),
        Filter::Eq(field, value) => {
            let col = column_for(field)?;
            if value.is_null() {
                format!("\"{}\" IS NULL", col.name)
            } else {
                params.push(to_sql(kind, col, value)?);
                format!("\"{}\" = ?{}", col.name, params.len())
            }
        }
        Filter::IsNull(field) => format!("\"{}\" IS NULL", column_for(field)?.name),
        Filter::IdIn(ids) if ids.is_empty() => "0".to_string(),
        Filter::IdIn(ids) => {
            let mut slots = Vec::with_capacity(ids.len());
            for id in ids {
                params.push(SqlValue::Text(id.clone()));
                slots.push(format!("?{}", params.len()));
            }
            format!("id IN ({})", slots.join(", "))
        }
        Filter::And(filters) if filters.is_empty() => "1".to_string(),
        Filter::And(filters) => {
            let parts = filters
                .iter()
                .map(|f| compile_filter(kind, f, params))
                .collect::<Result<Vec<_>, _>>()?;
            format!("({})", parts.join(" AND "))
        }
    })
}

#[async_trait]
impl RecordStore for Database {
    async fn insert(&self, kind: EntityKind, record: Record) -> Result<(), StoreError> {
        let bound: Vec<_> = bind_record(kind, &record)?
            .into_iter()
            .filter(|(_, value)| *value != SqlValue::Null)
            .collect();
        let names: Vec<String> = bound.iter().map(|(c, _)| format!("\"{}\"", c.name)).collect();
        let slots: Vec<String> = (1..=bound.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            kind.table_name(),
            names.join(", "),
            slots.join(", ")
        );

        self.lock()?
            .execute(&sql, params_from_iter(bound.into_iter().map(|(_, v)| v)))?;
        Ok(())
    }

    async fn update(&self, kind: EntityKind, record: Record) -> Result<(), StoreError> {
        let id = record_id(kind, &record)?;
        let bound: Vec<_> = bind_record(kind, &record)?
            .into_iter()
            .filter(|(c, _)| c.name != "id")
            .collect();
        let assignments: Vec<String> = bound
            .iter()
            .enumerate()
            .map(|(i, (c, _))| format!("\"{}\" = ?{}", c.name, i + 1))
            .collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?{}",
            kind.table_name(),
            assignments.join(", "),
            bound.len() + 1
        );

        let mut params: Vec<SqlValue> = bound.into_iter().map(|(_, v)| v).collect();
        params.push(SqlValue::Text(id.clone()));
        let changed = self.lock()?.execute(&sql, params_from_iter(params))?;
        if changed == 0 {
            return Err(StoreError::NotFound { kind, id });
        }
        Ok(())
    }

    async fn delete(&self, kind: EntityKind, ids: &[String]) -> Result<usize, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut params = Vec::new();
        let clause = compile_filter(kind, &Filter::IdIn(ids.to_vec()), &mut params)?;
        let sql = format!("DELETE FROM {} WHERE {}", kind.table_name(), clause);
        Ok(self.lock()?.execute(&sql, params_from_iter(params))?)
    }

    async fn select(&self, kind: EntityKind, filter: &Filter) -> Result<Vec<Record>, StoreError> {
        let mut params = Vec::new();
        let clause = compile_filter(kind, filter, &mut params)?;
        let cols = columns(kind);
        let names: Vec<String> = cols.iter().map(|c| format!("\"{}\"", c.name)).collect();
        let sql = format!(
            "SELECT {} FROM {} WHERE {}",
            names.join(", "),
            kind.table_name(),
            clause
        );

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let raw_rows = stmt
            .query_map(params_from_iter(params), |row| {
                (0..cols.len())
                    .map(|i| row.get::<_, SqlValue>(i))
                    .collect::<rusqlite::Result<Vec<_>>>()
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        raw_rows
            .into_iter()
            .map(|values| {
                let mut record = Record::new();
                for (col, value) in cols.iter().zip(values) {
                    let value = from_sql(col, value)?;
                    if !value.is_null() {
                        record.insert(col.name.to_string(), value);
                    }
                }
                Ok(record)
            })
            .collect()
    }
}
