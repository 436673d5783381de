//! Error types for record descriptors and migration configuration.

use thiserror::Error;

/// Errors raised while resolving or using a record descriptor.
///
/// Each variant names the record type involved so callers can tell a type
/// that cannot be stored or migrated apart from any other failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    /// No field is annotated as identifier and no field has a conventional
    /// identifier name.
    #[error(
        "record type '{type_name}' has no identifier field: annotate one with #[record(id)] \
         or name it one of: {conventions}"
    )]
    MissingIdField {
        /// Display name of the record type.
        type_name: String,
        /// Comma-separated list of accepted conventional names.
        conventions: String,
    },

    /// More than one field qualifies as identifier.
    #[error("record type '{type_name}' has ambiguous identifier fields: {}", .candidates.join(", "))]
    AmbiguousId {
        /// Display name of the record type.
        type_name: String,
        /// The competing field names.
        candidates: Vec<String>,
    },

    /// The identifier field is not a `String`.
    #[error(
        "identifier field '{field}' of record type '{type_name}' has unsupported type \
         '{found}', expected String"
    )]
    UnsupportedIdType {
        /// Display name of the record type.
        type_name: String,
        /// The identifier field name.
        field: String,
        /// The declared type of the field.
        found: String,
    },

    /// A record of another type was handed to a descriptor accessor.
    #[error("record is not an instance of '{expected}'")]
    RecordTypeMismatch {
        /// Display name of the descriptor's record type.
        expected: String,
    },
}

/// Errors raised while constructing migration components.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The table name is empty once sanitized.
    #[error("table name is empty")]
    EmptyTableName,

    /// The table name contains characters that cannot be interpolated into a
    /// statement.
    #[error("invalid table name '{name}': {reason}")]
    InvalidTableName {
        /// The offending name (after terminator stripping).
        name: String,
        /// Why the name was rejected.
        reason: &'static str,
    },

    /// A substitution pattern failed to compile.
    #[error("invalid pattern '{pattern}': {message}")]
    InvalidPattern {
        /// The pattern source.
        pattern: String,
        /// The compiler's message.
        message: String,
    },

    /// A version string could not be parsed.
    #[error("invalid version '{0}', expected MAJOR.MINOR")]
    InvalidVersion(String),
}

/// Result type for descriptor operations.
pub type Result<T> = std::result::Result<T, DescriptorError>;
