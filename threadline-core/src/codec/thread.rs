//! Polymorphic thread-item codec.
//!
//! All variants share one row shape. The `type` column selects the variant
//! and only that variant's columns carry values; the rest are written as
//! null so a type change never leaves stale fields behind.

use serde_json::Value;

use super::{
    bool_or, i64_or, optional_str, optional_timestamp, optional_timestamp_value, required_str,
    str_list, timestamp, timestamp_value,
};
use crate::error::CodecError;
use crate::models::{ActionStatus, ThreadItem, ThreadKind, ThreadType};
use crate::store::Record;

/// Columns owned by a single variant.
pub const VARIANT_FIELDS: [&str; 7] = [
    "is_resolved",
    "is_completed",
    "status",
    "time_spent",
    "deadline",
    "completed_at",
    "start_time",
];

pub fn serialize(item: &ThreadItem) -> Record {
    let mut record = Record::new();
    record.insert("id".into(), Value::String(item.id.clone()));
    record.insert("problem_id".into(), Value::String(item.problem_id.clone()));
    record.insert(
        "parent_id".into(),
        item.parent_id.clone().map(Value::String).unwrap_or(Value::Null),
    );
    record.insert("child_thread_ids".into(), id_list(&item.child_thread_ids));
    record.insert("type".into(), Value::String(item.thread_type().as_str().into()));
    record.insert("content".into(), Value::String(item.content.clone()));
    record.insert("is_important".into(), Value::Bool(item.is_important));
    record.insert("result_ids".into(), id_list(&item.result_ids));
    record.insert("author_id".into(), Value::String(item.author_id.clone()));
    record.insert("created_at".into(), timestamp_value(item.created_at));

    for field in VARIANT_FIELDS {
        record.insert(field.into(), Value::Null);
    }

    match &item.kind {
        ThreadKind::General | ThreadKind::Insight => {}
        ThreadKind::Bottleneck { is_resolved } => {
            record.insert("is_resolved".into(), Value::Bool(*is_resolved));
        }
        ThreadKind::Task { is_completed } => {
            record.insert("is_completed".into(), Value::Bool(*is_completed));
        }
        ThreadKind::Action {
            status,
            time_spent,
            deadline,
            completed_at,
        } => {
            record.insert("status".into(), Value::String(status.as_str().into()));
            record.insert("time_spent".into(), Value::from(*time_spent));
            record.insert("deadline".into(), optional_timestamp_value(*deadline));
            record.insert("completed_at".into(), optional_timestamp_value(*completed_at));
        }
        ThreadKind::Session {
            time_spent,
            start_time,
        } => {
            record.insert("time_spent".into(), Value::from(*time_spent));
            record.insert("start_time".into(), timestamp_value(*start_time));
        }
    }

    record
}

pub fn parse(record: &Record) -> Result<ThreadItem, CodecError> {
    let id = required_str(record, "id")?;
    let created_at = timestamp(record, "created_at")?;
    let ty = match optional_str(record, "type")? {
        Some(raw) => ThreadType::from_str(&raw).unwrap_or_else(|| {
            tracing::warn!("Unknown thread type {:?} on {}, reading as General", raw, id);
            ThreadType::General
        }),
        None => {
            tracing::warn!("Thread item {} has no type, reading as General", id);
            ThreadType::General
        }
    };

    let kind = match ty {
        ThreadType::General => ThreadKind::General,
        ThreadType::Insight => ThreadKind::Insight,
        ThreadType::Bottleneck => ThreadKind::Bottleneck {
            is_resolved: bool_or(record, "is_resolved", false)?,
        },
        ThreadType::Task => ThreadKind::Task {
            is_completed: bool_or(record, "is_completed", false)?,
        },
        ThreadType::Action => ThreadKind::Action {
            status: parse_status(record, &id)?,
            time_spent: i64_or(record, "time_spent", 0)?.clamp(0, u32::MAX as i64) as u32,
            deadline: optional_timestamp(record, "deadline")?,
            completed_at: optional_timestamp(record, "completed_at")?,
        },
        ThreadType::Session => ThreadKind::Session {
            time_spent: i64_or(record, "time_spent", 0)?.max(0),
            start_time: optional_timestamp(record, "start_time")?.unwrap_or(created_at),
        },
    };

    Ok(ThreadItem {
        id,
        problem_id: required_str(record, "problem_id")?,
        parent_id: optional_str(record, "parent_id")?,
        child_thread_ids: str_list(record, "child_thread_ids")?,
        content: optional_str(record, "content")?.unwrap_or_default(),
        is_important: bool_or(record, "is_important", false)?,
        result_ids: str_list(record, "result_ids")?,
        author_id: optional_str(record, "author_id")?.unwrap_or_default(),
        created_at,
        kind,
    })
}

fn parse_status(record: &Record, id: &str) -> Result<ActionStatus, CodecError> {
    Ok(match optional_str(record, "status")? {
        Some(raw) => ActionStatus::from_str(&raw).unwrap_or_else(|| {
            tracing::warn!("Unknown action status {:?} on {}, reading as todo", raw, id);
            ActionStatus::Todo
        }),
        None => ActionStatus::Todo,
    })
}

fn id_list(ids: &[String]) -> Value {
    Value::Array(ids.iter().cloned().map(Value::String).collect())
}
