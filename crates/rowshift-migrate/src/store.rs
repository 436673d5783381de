//! Repository interfaces consumed by the orchestrator and the migrators.

use std::future::Future;
use std::pin::Pin;

use futures::stream::BoxStream;
use rowshift_core::{Descriptor, Record, TableName, Upsert, Value};

use crate::error::{MigrateError, Result};
use crate::version::VersionRecord;

/// A boxed future for async repository operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Returns the identifier of `record`, generating a UUID first when it is
/// empty and the store owns identifier generation.
pub fn assign_id<T: Record>(descriptor: &Descriptor, record: &mut T) -> Result<String> {
    let id = descriptor.get_id(&*record)?;
    if !id.is_empty() {
        return Ok(id);
    }
    if !descriptor.is_id_auto_generated() {
        return Err(MigrateError::MissingId {
            type_name: descriptor.type_name().to_string(),
        });
    }
    let id = uuid::Uuid::new_v4().to_string();
    descriptor.set_id(record, id.clone())?;
    Ok(id)
}

/// Persistence for [`VersionRecord`]s, keyed by table name.
///
/// Implementations must read their own writes for a given table.
pub trait VersionStore: Send + Sync {
    /// Returns the record tracking `table_name`, if any.
    fn find_by_table_name<'a>(
        &'a self,
        table_name: &'a str,
    ) -> BoxFuture<'a, Result<Option<VersionRecord>>>;

    /// Persists `record` and returns it as committed.
    ///
    /// A record with an empty id is assigned one. Saving a record for a table
    /// that is already tracked replaces the tracked version.
    fn save(&self, record: VersionRecord) -> BoxFuture<'_, Result<VersionRecord>>;
}

/// Row access for table migrators.
pub trait RowStore: Send + Sync {
    /// Streams every row of `table`.
    fn scan<'a>(&'a self, table: &'a TableName) -> BoxStream<'a, Result<Row>>;

    /// Executes an upsert statement.
    fn upsert<'a>(&'a self, upsert: &'a Upsert) -> BoxFuture<'a, Result<()>>;
}

/// One table row: column names mapped to raw values, in column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    /// Creates an empty row.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            columns: Vec::new(),
        }
    }

    /// Adds a column.
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    /// Sets a column, replacing any previous value under the same name.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        let column = column.into();
        let value = value.into();
        match self.columns.iter_mut().find(|(name, _)| *name == column) {
            Some((_, existing)) => *existing = value,
            None => self.columns.push((column, value)),
        }
    }

    /// Returns the value of `column`.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Iterates over `(column, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Returns the first column, which stores treat as the row key.
    #[must_use]
    pub fn key(&self) -> Option<(&str, &Value)> {
        self.columns.first().map(|(name, value)| (name.as_str(), value))
    }

    /// Returns the number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns whether the row has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Self::new();
        for (column, value) in iter {
            row.set(column, value);
        }
        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowshift_core::DescriptorProvider;

    #[derive(Debug, Default, Record)]
    struct Tenant {
        #[record(id(auto_generated = false))]
        slug: String,
    }

    #[test]
    fn test_assign_id_generates_for_auto_ids() {
        let provider = DescriptorProvider::new();
        let descriptor = provider.descriptor::<VersionRecord>().unwrap();
        let mut record = VersionRecord::new("users");
        let id = assign_id(&descriptor, &mut record).unwrap();
        assert_eq!(id.len(), 36);
        assert_eq!(record.id, id);

        // An existing id is kept
        assert_eq!(assign_id(&descriptor, &mut record).unwrap(), id);
    }

    #[test]
    fn test_assign_id_requires_caller_ids() {
        let provider = DescriptorProvider::new();
        let descriptor = provider.descriptor::<Tenant>().unwrap();
        let err = assign_id(&descriptor, &mut Tenant::default()).unwrap_err();
        assert!(matches!(err, MigrateError::MissingId { type_name } if type_name == "Tenant"));

        let mut tenant = Tenant {
            slug: "acme".to_string(),
        };
        assert_eq!(assign_id(&descriptor, &mut tenant).unwrap(), "acme");
    }

    #[test]
    fn test_row_preserves_column_order() {
        let row = Row::new().with("id", 1).with("name", "aaa").with("age", 3);
        let names: Vec<&str> = row.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["id", "name", "age"]);
        assert_eq!(row.key(), Some(("id", &Value::Int(1))));
    }

    #[test]
    fn test_row_set_replaces() {
        let mut row: Row = vec![("id", Value::Int(1)), ("name", Value::from("a"))]
            .into_iter()
            .collect();
        row.set("name", "b");
        assert_eq!(row.len(), 2);
        assert_eq!(row.get("name"), Some(&Value::from("b")));
        assert_eq!(row.get("missing"), None);
    }
}
