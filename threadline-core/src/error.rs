//! Error types for threadline-core

use thiserror::Error;

use crate::models::EntityKind;
use crate::session::TimerPhase;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors raised by a [`RecordStore`](crate::store::RecordStore) backend.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No row with this id exists for the kind
    #[error("{kind} row not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    /// The record does not fit the table definition
    #[error("Schema violation on {kind}: {message}")]
    Schema { kind: EntityKind, message: String },

    /// Underlying database failure
    #[error("Backend error: {0}")]
    Backend(String),

    /// Failure raised on purpose by a test store
    #[error("Injected failure: {0}")]
    Injected(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Errors converting between stored records and typed entities.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Missing field `{0}`")]
    MissingField(&'static str),

    #[error("Invalid value for `{field}`: {message}")]
    InvalidField { field: &'static str, message: String },

    #[error("Record is not an object")]
    NotAnObject,

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Main error type for engine operations
#[derive(Error, Debug)]
pub enum EngineError {
    /// The operation references an id absent from cache and store
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    /// A persistence call failed; the cache was left unmodified
    #[error("Store write failed during {operation}: {source}")]
    StoreWriteFailure {
        operation: &'static str,
        #[source]
        source: StoreError,
    },

    /// Session timer transition attempted from the wrong state
    #[error("Cannot {action} session while {from}")]
    InvalidStateTransition {
        action: &'static str,
        from: TimerPhase,
    },

    /// A child references a parent that does not exist
    #[error("{child_kind} {child_id} references missing {parent_kind} {parent_id}")]
    OrphanedReference {
        child_kind: EntityKind,
        child_id: String,
        parent_kind: EntityKind,
        parent_id: String,
    },

    /// The parent already holds another child in a single-id slot
    #[error("{parent_kind} {parent_id} already has {field} {occupant}")]
    SlotOccupied {
        parent_kind: EntityKind,
        parent_id: String,
        field: &'static str,
        occupant: String,
    },

    /// Locked entities are read-only to mutations
    #[error("{kind} {id} is locked")]
    Locked { kind: EntityKind, id: String },

    /// A record could not be decoded or encoded
    #[error("Codec error on {kind}: {source}")]
    Codec {
        kind: EntityKind,
        #[source]
        source: CodecError,
    },
}

impl EngineError {
    pub(crate) fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        EngineError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub(crate) fn store(operation: &'static str, source: StoreError) -> Self {
        tracing::error!("{} failed: {}", operation, source);
        EngineError::StoreWriteFailure { operation, source }
    }

    pub(crate) fn codec(kind: EntityKind, source: CodecError) -> Self {
        EngineError::Codec { kind, source }
    }
}
