//! Conversion between stored [`Record`]s and typed entities.
//!
//! Plain entities map field-for-field through serde. Thread items carry a
//! variant discriminant and are handled by [`thread`].

pub mod thread;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::CodecError;
use crate::store::Record;

pub fn encode<T: Serialize>(entity: &T) -> Result<Record, CodecError> {
    match serde_json::to_value(entity)? {
        Value::Object(map) => Ok(map),
        _ => Err(CodecError::NotAnObject),
    }
}

pub fn decode<T: DeserializeOwned>(record: &Record) -> Result<T, CodecError> {
    // Nulls behave like absent fields so serde defaults apply.
    let cleaned: Record = record
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    Ok(serde_json::from_value(Value::Object(cleaned))?)
}

pub(crate) fn required_str(record: &Record, field: &'static str) -> Result<String, CodecError> {
    match record.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Null) | None => Err(CodecError::MissingField(field)),
        Some(other) => Err(invalid(field, format!("expected string, got {}", other))),
    }
}

pub(crate) fn optional_str(record: &Record, field: &'static str) -> Result<Option<String>, CodecError> {
    match record.get(field) {
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Null) | None => Ok(None),
        Some(other) => Err(invalid(field, format!("expected string, got {}", other))),
    }
}

pub(crate) fn str_list(record: &Record, field: &'static str) -> Result<Vec<String>, CodecError> {
    match record.get(field) {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                other => Err(invalid(field, format!("expected string id, got {}", other))),
            })
            .collect(),
        Some(Value::Null) | None => Ok(Vec::new()),
        Some(other) => Err(invalid(field, format!("expected list, got {}", other))),
    }
}

pub(crate) fn bool_or(record: &Record, field: &'static str, default: bool) -> Result<bool, CodecError> {
    match record.get(field) {
        Some(Value::Bool(b)) => Ok(*b),
        // SQLite hands booleans back as integers when read raw.
        Some(Value::Number(n)) => Ok(n.as_i64().unwrap_or(0) != 0),
        Some(Value::Null) | None => Ok(default),
        Some(other) => Err(invalid(field, format!("expected bool, got {}", other))),
    }
}

pub(crate) fn i64_or(record: &Record, field: &'static str, default: i64) -> Result<i64, CodecError> {
    match record.get(field) {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64))
            .ok_or_else(|| invalid(field, format!("expected integer, got {}", n))),
        Some(Value::Null) | None => Ok(default),
        Some(other) => Err(invalid(field, format!("expected integer, got {}", other))),
    }
}

pub(crate) fn timestamp(record: &Record, field: &'static str) -> Result<DateTime<Utc>, CodecError> {
    optional_timestamp(record, field)?.ok_or(CodecError::MissingField(field))
}

pub(crate) fn optional_timestamp(
    record: &Record,
    field: &'static str,
) -> Result<Option<DateTime<Utc>>, CodecError> {
    match optional_str(record, field)? {
        Some(raw) => DateTime::parse_from_rfc3339(&raw)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|e| invalid(field, e.to_string())),
        None => Ok(None),
    }
}

pub(crate) fn timestamp_value(dt: DateTime<Utc>) -> Value {
    Value::String(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

pub(crate) fn optional_timestamp_value(dt: Option<DateTime<Utc>>) -> Value {
    dt.map(timestamp_value).unwrap_or(Value::Null)
}

fn invalid(field: &'static str, message: String) -> CodecError {
    CodecError::InvalidField { field, message }
}
