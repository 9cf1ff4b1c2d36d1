//! Error types for engine operations.

use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A version transition was requested for a version that is not greater
    /// than the currently applied one.
    #[error("version conflict: requested version {requested}, current version is {current}")]
    VersionConflict {
        /// The version that was requested.
        requested: u64,
        /// The currently applied version.
        current: u64,
    },

    /// The named table does not exist.
    #[error("table not found: {name}")]
    TableNotFound {
        /// Name of the table.
        name: String,
    },

    /// A schema string did not match the schema grammar.
    #[error("invalid schema {schema:?}: {message}")]
    InvalidSchema {
        /// The offending schema string.
        schema: String,
        /// Description of the problem.
        message: String,
    },

    /// An insert would reuse an existing primary key.
    #[error("duplicate primary key in table {table}: {key}")]
    DuplicateKey {
        /// Table the insert targeted.
        table: String,
        /// Display form of the conflicting key.
        key: String,
    },

    /// An insert or update would violate a unique index.
    #[error("unique constraint violated in table {table} on index {index}")]
    UniqueViolation {
        /// Table the write targeted.
        table: String,
        /// Display form of the violated index.
        index: String,
    },

    /// An outbound-key table was written without an explicit key.
    #[error("table {table} has an outbound key; an explicit key is required")]
    MissingKey {
        /// Table the write targeted.
        table: String,
    },

    /// An inbound-key table was written with an explicit key.
    #[error("table {table} has an inbound key; explicit keys are not accepted")]
    ExplicitKey {
        /// Table the write targeted.
        table: String,
    },

    /// A row is missing a value at its primary-key path.
    #[error("row in table {table} has no value at key path {path:?}")]
    KeyPathMissing {
        /// Table the write targeted.
        table: String,
        /// The key path that failed to resolve.
        path: String,
    },

    /// A value cannot serve as a key.
    #[error("invalid key: {message}")]
    InvalidKey {
        /// Description of the problem.
        message: String,
    },

    /// A bulk write was given a key list of the wrong length.
    #[error("bulk write to table {table} has {rows} rows but {keys} keys")]
    KeyCountMismatch {
        /// Table the write targeted.
        table: String,
        /// Number of rows supplied.
        rows: usize,
        /// Number of keys supplied.
        keys: usize,
    },

    /// An equality filter referenced a path that is neither indexed nor the
    /// primary key.
    #[error("path {path:?} in table {table} is not indexed")]
    NotIndexed {
        /// Table the query targeted.
        table: String,
        /// The unindexed path.
        path: String,
    },

    /// A typed read was attempted on a table with no registered materializer.
    #[error("table {table} has no class mapping")]
    NotMapped {
        /// Table the read targeted.
        table: String,
    },

    /// A typed read requested a different type than the registered mapping.
    #[error("table is mapped to {mapped}, not {requested}")]
    TypeMismatch {
        /// Type name the table is mapped to.
        mapped: &'static str,
        /// Type name the caller requested.
        requested: &'static str,
    },

    /// A row could not be decoded into its mapped type.
    #[error("row deserialization failed: {message}")]
    Deserialize {
        /// Description of the failure.
        message: String,
    },

    /// An upgrade callback reported a failure.
    #[error("upgrade failed: {message}")]
    UpgradeFailed {
        /// Description of the failure.
        message: String,
    },
}

impl EngineError {
    /// Creates an `InvalidSchema` error.
    pub fn invalid_schema(schema: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidSchema {
            schema: schema.into(),
            message: message.into(),
        }
    }

    /// Creates an `UpgradeFailed` error.
    pub fn upgrade_failed(message: impl Into<String>) -> Self {
        Self::UpgradeFailed {
            message: message.into(),
        }
    }
}
