//! Upsert statement building.
//!
//! Statements are rendered with literal values inlined, in the
//! `INSERT INTO ... VALUES ...` form that document and column stores treat
//! as an upsert.

use std::fmt;

use crate::table::TableName;

/// An upsert of one row.
///
/// # Example
///
/// ```
/// use rowshift_core::statement::Upsert;
/// use rowshift_core::table::TableName;
///
/// let upsert = Upsert::into_table(TableName::new("users").unwrap())
///     .value("id", "1")
///     .value("name", "'bb-x'");
///
/// assert_eq!(
///     upsert.to_statement(),
///     "INSERT INTO users (\"id\", \"name\") VALUES (1, 'bb-x')"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upsert {
    table: TableName,
    columns: Vec<String>,
    values: Vec<String>,
}

impl Upsert {
    /// Starts an upsert into `table`.
    #[must_use]
    pub const fn into_table(table: TableName) -> Self {
        Self {
            table,
            columns: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Adds a column with its literal value expression.
    #[must_use]
    pub fn value(mut self, column: impl Into<String>, literal: impl Into<String>) -> Self {
        self.push(column, literal);
        self
    }

    /// Adds a column in place.
    pub fn push(&mut self, column: impl Into<String>, literal: impl Into<String>) {
        self.columns.push(column.into());
        self.values.push(literal.into());
    }

    /// Returns the target table.
    #[must_use]
    pub const fn table(&self) -> &TableName {
        &self.table
    }

    /// Returns the column names, in insertion order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns the literal value expressions, aligned with [`Self::columns`].
    #[must_use]
    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Iterates over `(column, literal)` pairs.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().map(String::as_str))
    }

    /// Returns the number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns whether no column has been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Renders the statement text.
    #[must_use]
    pub fn to_statement(&self) -> String {
        let columns: Vec<String> = self.columns.iter().map(|c| quote_identifier(c)).collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table,
            columns.join(", "),
            self.values.join(", ")
        )
    }
}

impl fmt::Display for Upsert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_statement())
    }
}

/// Quotes an identifier, doubling embedded double quotes.
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> TableName {
        TableName::new("users").unwrap()
    }

    #[test]
    fn test_statement_rendering() {
        let upsert = Upsert::into_table(users())
            .value("id", "1")
            .value("tags", "['a','b']");
        assert_eq!(
            upsert.to_statement(),
            "INSERT INTO users (\"id\", \"tags\") VALUES (1, ['a','b'])"
        );
        assert_eq!(upsert.to_string(), upsert.to_statement());
    }

    #[test]
    fn test_sanitized_table_in_statement() {
        let table = TableName::new("users;drop").unwrap();
        let upsert = Upsert::into_table(table).value("id", "1");
        assert_eq!(
            upsert.to_statement(),
            "INSERT INTO usersdrop (\"id\") VALUES (1)"
        );
        assert!(!upsert.to_statement().contains(';'));
    }

    #[test]
    fn test_identifier_quoting() {
        assert_eq!(quote_identifier("name"), "\"name\"");
        assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_accessors() {
        let mut upsert = Upsert::into_table(users());
        assert!(upsert.is_empty());
        upsert.push("id", "7");
        upsert.push("name", "'x'");
        assert_eq!(upsert.len(), 2);
        assert_eq!(upsert.table().as_str(), "users");
        assert_eq!(
            upsert.pairs().collect::<Vec<_>>(),
            vec![("id", "7"), ("name", "'x'")]
        );
    }
}
