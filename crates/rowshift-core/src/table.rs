//! Sanitized table names.

use std::fmt;
use std::str::FromStr;

use tracing::warn;

use crate::error::ConfigError;

/// Characters that end a statement and are stripped from table names.
pub const STATEMENT_TERMINATORS: &[char] = &[';'];

/// A table name that is safe to interpolate into generated statements.
///
/// Construction strips statement terminators and surrounding whitespace,
/// then rejects names that are empty or still contain quotes, whitespace,
/// control characters or comment markers. Keyspace-qualified names such as
/// `shop.orders` are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableName(String);

impl TableName {
    /// Sanitizes and validates a table name.
    pub fn new(raw: &str) -> Result<Self, ConfigError> {
        let stripped: String = raw
            .chars()
            .filter(|c| !STATEMENT_TERMINATORS.contains(c))
            .collect();
        let name = stripped.trim();

        if name.is_empty() {
            return Err(ConfigError::EmptyTableName);
        }
        if name.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(invalid(name, "contains whitespace or control characters"));
        }
        if name.chars().any(|c| matches!(c, '\'' | '"' | '`')) {
            return Err(invalid(name, "contains quote characters"));
        }
        if name.contains("--") || name.contains("/*") || name.contains("*/") {
            return Err(invalid(name, "contains a comment marker"));
        }

        if name != raw {
            warn!(raw = %raw, sanitized = %name, "Sanitized table name");
        }
        Ok(Self(name.to_string()))
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn invalid(name: &str, reason: &'static str) -> ConfigError {
    ConfigError::InvalidTableName {
        name: name.to_string(),
        reason,
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TableName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for TableName {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<&str> for TableName {
    type Error = ConfigError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<String> for TableName {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}
