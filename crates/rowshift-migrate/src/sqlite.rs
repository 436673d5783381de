//! SQLite-backed version tracking.
//!
//! This module manages the `rowshift_versions` table that records the highest
//! migration version applied to each tracked table.

use std::sync::Arc;

use rowshift_core::{Descriptor, DescriptorProvider};
use sqlx::sqlite::SqlitePool;
use tracing::debug;

use crate::error::{MigrateError, Result};
use crate::store::{assign_id, BoxFuture, VersionStore};
use crate::version::{Version, VersionRecord};

/// SQL to create the version table (SQLite).
pub const CREATE_VERSIONS_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS rowshift_versions (
    id TEXT PRIMARY KEY,
    table_name TEXT NOT NULL UNIQUE,
    major INTEGER NOT NULL,
    minor INTEGER NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
)
"#;

const UPSERT_VERSION_SQL: &str = r#"
INSERT INTO rowshift_versions (id, table_name, major, minor)
VALUES (?, ?, ?, ?)
ON CONFLICT(table_name) DO UPDATE SET
    major = excluded.major,
    minor = excluded.minor,
    updated_at = datetime('now')
RETURNING id, table_name, major, minor
"#;

type VersionRow = (String, String, i64, i64);

/// A [`VersionStore`] persisting records in a SQLite database.
pub struct SqliteVersionStore {
    pool: SqlitePool,
    descriptor: Arc<Descriptor>,
}

impl SqliteVersionStore {
    /// Creates a store over `pool`.
    pub fn new(pool: SqlitePool, provider: &DescriptorProvider) -> Result<Self> {
        Ok(Self {
            pool,
            descriptor: provider.descriptor::<VersionRecord>()?,
        })
    }

    /// Ensures the version table exists.
    pub async fn ensure_table(&self) -> Result<()> {
        sqlx::query(CREATE_VERSIONS_TABLE_SQL)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Gets every tracked record, ordered by table name.
    pub async fn all(&self) -> Result<Vec<VersionRecord>> {
        let rows: Vec<VersionRow> = sqlx::query_as(
            "SELECT id, table_name, major, minor FROM rowshift_versions ORDER BY table_name",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(record_from_row).collect()
    }

    async fn find(&self, table_name: &str) -> Result<Option<VersionRecord>> {
        let row: Option<VersionRow> = sqlx::query_as(
            "SELECT id, table_name, major, minor FROM rowshift_versions WHERE table_name = ?",
        )
        .bind(table_name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(record_from_row).transpose()
    }

    async fn upsert(&self, mut record: VersionRecord) -> Result<VersionRecord> {
        let id = assign_id(&self.descriptor, &mut record)?;
        debug!(
            table = %record.table_name,
            version = %record.version,
            "Saving version record"
        );

        // On conflict the existing id is kept and returned
        let row: VersionRow = sqlx::query_as(UPSERT_VERSION_SQL)
            .bind(id)
            .bind(&record.table_name)
            .bind(i64::from(record.version.major))
            .bind(i64::from(record.version.minor))
            .fetch_one(&self.pool)
            .await?;

        record_from_row(row)
    }
}

impl VersionStore for SqliteVersionStore {
    fn find_by_table_name<'a>(
        &'a self,
        table_name: &'a str,
    ) -> BoxFuture<'a, Result<Option<VersionRecord>>> {
        Box::pin(self.find(table_name))
    }

    fn save(&self, record: VersionRecord) -> BoxFuture<'_, Result<VersionRecord>> {
        Box::pin(self.upsert(record))
    }
}

fn record_from_row((id, table_name, major, minor): VersionRow) -> Result<VersionRecord> {
    let component = |value: i64| {
        u32::try_from(value).map_err(|_| {
            MigrateError::Store(format!(
                "stored version component {value} for table '{table_name}' is out of range"
            ))
        })
    };
    let version = Version::new(component(major)?, component(minor)?);
    Ok(VersionRecord {
        id,
        table_name,
        version,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn create_test_store() -> SqliteVersionStore {
        // One connection: every connection to `sqlite::memory:` is its own database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory SQLite pool");
        let store = SqliteVersionStore::new(pool, &DescriptorProvider::new()).unwrap();
        store.ensure_table().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_ensure_table_is_idempotent() {
        let store = create_test_store().await;
        store.ensure_table().await.unwrap();
        assert!(store.all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_and_find() {
        let store = create_test_store().await;
        assert!(store.find_by_table_name("users").await.unwrap().is_none());

        let saved = store
            .save(VersionRecord::new("users").with_version(Version::new(0, 3)))
            .await
            .unwrap();
        assert!(!saved.id.is_empty());

        let found = store.find_by_table_name("users").await.unwrap().unwrap();
        assert_eq!(found, saved);
    }

    #[tokio::test]
    async fn test_save_keeps_one_row_per_table() {
        let store = create_test_store().await;
        let first = store
            .save(VersionRecord::new("users").with_version(Version::new(0, 1)))
            .await
            .unwrap();
        let second = store
            .save(VersionRecord::new("users").with_version(Version::new(1, 0)))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.version, Version::new(1, 0));
        assert_eq!(store.all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_all_ordered_by_table() {
        let store = create_test_store().await;
        for table in ["orders", "accounts", "users"] {
            store.save(VersionRecord::new(table)).await.unwrap();
        }
        let tables: Vec<String> = store
            .all()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.table_name)
            .collect();
        assert_eq!(tables, vec!["accounts", "orders", "users"]);
    }

    #[tokio::test]
    async fn test_out_of_range_version_is_reported() {
        let store = create_test_store().await;
        sqlx::query(
            "INSERT INTO rowshift_versions (id, table_name, major, minor) VALUES ('x', 'users', -1, 0)",
        )
        .execute(&store.pool)
        .await
        .unwrap();

        let err = store.find_by_table_name("users").await.unwrap_err();
        assert!(matches!(err, MigrateError::Store(_)));
    }
}
