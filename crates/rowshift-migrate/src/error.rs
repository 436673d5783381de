//! Error types for the migration system.

use rowshift_core::{ConfigError, DescriptorError, LiteralError};

use crate::report::TableFailure;
use crate::version::Version;

/// Errors that can occur during migration operations.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// A record type cannot be described (no usable identifier).
    #[error("Descriptor error: {0}")]
    Descriptor(#[from] DescriptorError),

    /// A migration component was configured with invalid input.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Database error from the SQLite version store.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Backend failure reported by a store implementation.
    #[error("Store error: {0}")]
    Store(String),

    /// A generated literal could not be read back.
    #[error("Literal error: {0}")]
    Literal(#[from] LiteralError),

    /// A migrator failed for a reason of its own.
    #[error("Execution error: {0}")]
    Execution(String),

    /// A record needs a caller-supplied identifier and has none.
    #[error("Record '{type_name}' requires an identifier but none was supplied")]
    MissingId {
        /// Display name of the record type.
        type_name: String,
    },

    /// Two migrators target the same version of one table.
    #[error("Table '{table}' has more than one migrator targeting version {version}")]
    DuplicateVersion {
        /// The table.
        table: String,
        /// The duplicated version.
        version: Version,
    },

    /// A table's migration sequence failed.
    #[error("Table '{table}': {failure}")]
    Table {
        /// The table.
        table: String,
        /// What failed.
        failure: Box<TableFailure>,
    },

    /// IO error (reading configuration files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Multiple errors occurred.
    #[error("Multiple errors occurred:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Multiple(Vec<MigrateError>),
}

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
