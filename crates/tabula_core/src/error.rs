//! Error types for the schema layer.

use tabula_engine::EngineError;
use thiserror::Error;

/// Result type for schema-layer operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in the schema layer.
///
/// Construction errors are pure and synchronous: a bad builder call fails
/// before any engine work happens. Migration errors wrap whatever the
/// engine reported.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A compound key or compound index listed the same path twice.
    #[error("duplicate keys in a compound key are not allowed")]
    DuplicateKeysInCompound,

    /// A compound key or compound index listed fewer than two paths.
    #[error("a compound key needs at least two paths, got {got}")]
    CompoundTooShort {
        /// Number of paths supplied.
        got: usize,
    },

    /// An index over the same path or path sequence is already registered.
    #[error("index on {target} is already registered")]
    DuplicateIndex {
        /// Display form of the offending path or path sequence.
        target: String,
    },

    /// A single or multi-entry index targeted the primary-key path.
    #[error("path {path:?} is the primary key and cannot be indexed again")]
    IndexShadowsPrimaryKey {
        /// The offending path.
        path: String,
    },

    /// A compound index exactly duplicated the compound primary key.
    #[error("a compound index identical to the primary key is redundant")]
    CompoundIndexMatchesPrimaryKey,

    /// An operation referenced a table that does not exist.
    #[error("no such table {name:?}")]
    TableNotFound {
        /// The missing table name.
        name: String,
    },

    /// Row serialization failed.
    #[error("row serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Engine error during a migration or table operation.
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
}
