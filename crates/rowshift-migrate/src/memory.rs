//! In-memory repositories.
//!
//! These back tests and embedded use. Data lives behind `tokio` locks and is
//! lost when the store is dropped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};
use rowshift_core::{parse_literal, Descriptor, DescriptorProvider, Record, TableName, Upsert};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::error::{MigrateError, Result};
use crate::store::{assign_id, BoxFuture, Row, RowStore, VersionStore};
use crate::version::{Version, VersionRecord};

/// Default number of rows a scan reads per page.
pub const DEFAULT_PAGE_SIZE: usize = 256;

/// An id-keyed repository of records of one type.
///
/// Identifiers are read and written through the type's [`Descriptor`].
#[derive(Debug)]
pub struct MemoryRepository<T> {
    descriptor: Arc<Descriptor>,
    records: RwLock<Vec<T>>,
}

impl<T: Record + Clone> MemoryRepository<T> {
    /// Creates an empty repository, resolving `T`'s descriptor from
    /// `provider`.
    pub fn new(provider: &DescriptorProvider) -> Result<Self> {
        Ok(Self {
            descriptor: provider.descriptor::<T>()?,
            records: RwLock::new(Vec::new()),
        })
    }

    /// Returns the descriptor used for identifiers.
    #[must_use]
    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    /// Inserts a new record, assigning an identifier if needed.
    ///
    /// Fails if a record with the same identifier exists.
    pub async fn insert(&self, mut record: T) -> Result<T> {
        let id = assign_id(&self.descriptor, &mut record)?;
        let mut records = self.records.write().await;
        if self.position(&records, &id)?.is_some() {
            return Err(MigrateError::Store(format!(
                "{} '{}' already exists",
                self.descriptor.type_name(),
                id
            )));
        }
        records.push(record.clone());
        Ok(record)
    }

    /// Inserts or replaces a record by identifier.
    pub async fn upsert(&self, mut record: T) -> Result<T> {
        let id = assign_id(&self.descriptor, &mut record)?;
        let mut records = self.records.write().await;
        match self.position(&records, &id)? {
            Some(index) => records[index] = record.clone(),
            None => records.push(record.clone()),
        }
        Ok(record)
    }

    /// Returns the record with identifier `id`.
    pub async fn find_by_id(&self, id: &str) -> Result<Option<T>> {
        let records = self.records.read().await;
        Ok(self.position(&records, id)?.map(|index| records[index].clone()))
    }

    /// Returns the first record matching `predicate`, in insertion order.
    pub async fn find<F>(&self, predicate: F) -> Option<T>
    where
        F: Fn(&T) -> bool,
    {
        self.records.read().await.iter().find(|r| predicate(r)).cloned()
    }

    /// Returns every record, in insertion order.
    pub async fn all(&self) -> Vec<T> {
        self.records.read().await.clone()
    }

    /// Returns the number of records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Returns whether the repository is empty.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Inserts `record`, or replaces the first record `same` matches with it,
    /// keeping the replaced record's identifier.
    ///
    /// The lookup and the write happen under one write lock.
    pub async fn upsert_by<F>(&self, mut record: T, same: F) -> Result<T>
    where
        F: Fn(&T, &T) -> bool,
    {
        let mut records = self.records.write().await;
        let index = records.iter().position(|tracked| same(tracked, &record));
        if let Some(index) = index {
            let id = self.descriptor.get_id(&records[index])?;
            self.descriptor.set_id(&mut record, id)?;
            records[index] = record.clone();
        } else {
            assign_id(&self.descriptor, &mut record)?;
            records.push(record.clone());
        }
        Ok(record)
    }

    fn position(&self, records: &[T], id: &str) -> Result<Option<usize>> {
        for (index, record) in records.iter().enumerate() {
            if self.descriptor.get_id(record)? == id {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }
}

/// A [`VersionStore`] holding one [`VersionRecord`] per table in memory.
#[derive(Debug)]
pub struct MemoryVersionStore {
    records: MemoryRepository<VersionRecord>,
    saves: AtomicUsize,
    fail_saves_after: Option<usize>,
}

impl MemoryVersionStore {
    /// Creates an empty store.
    pub fn new(provider: &DescriptorProvider) -> Result<Self> {
        Ok(Self {
            records: MemoryRepository::new(provider)?,
            saves: AtomicUsize::new(0),
            fail_saves_after: None,
        })
    }

    /// Makes every save after the first `n` fail.
    #[must_use]
    pub fn fail_saves_after(mut self, n: usize) -> Self {
        self.fail_saves_after = Some(n);
        self
    }

    /// Returns the number of successful saves.
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Returns the version tracked for `table_name`.
    pub async fn version_of(&self, table_name: &str) -> Option<Version> {
        self.records
            .find(|r| r.table_name == table_name)
            .await
            .map(|r| r.version)
    }

    /// Returns every tracked record.
    pub async fn records(&self) -> Vec<VersionRecord> {
        self.records.all().await
    }

    async fn save_record(&self, mut record: VersionRecord) -> Result<VersionRecord> {
        if let Some(limit) = self.fail_saves_after {
            if self.saves.load(Ordering::SeqCst) >= limit {
                return Err(MigrateError::Store(format!(
                    "version store rejected save for table '{}'",
                    record.table_name
                )));
            }
        }

        // Table name is the natural key: lookup and write share one lock
        let saved = self
            .records
            .upsert_by(record, |tracked, incoming| {
                tracked.table_name == incoming.table_name
            })
            .await?;
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(saved)
    }
}

impl VersionStore for MemoryVersionStore {
    fn find_by_table_name<'a>(
        &'a self,
        table_name: &'a str,
    ) -> BoxFuture<'a, Result<Option<VersionRecord>>> {
        Box::pin(async move {
            Ok(self
                .records
                .find(|r| r.table_name == table_name)
                .await)
        })
    }

    fn save(&self, record: VersionRecord) -> BoxFuture<'_, Result<VersionRecord>> {
        Box::pin(self.save_record(record))
    }
}

/// A [`RowStore`] holding tables of rows in memory.
///
/// Rows keep insertion order. An upsert matches existing rows on its first
/// column, which is treated as the primary key; an upsert whose key matches
/// no row appends a new one, so rewriting a key leaves the old row in place.
///
/// A scan visits the rows present when it started, even if upserts append
/// rows while it runs.
#[derive(Debug)]
pub struct MemoryRowStore {
    tables: RwLock<HashMap<String, Vec<Row>>>,
    statements: Mutex<Vec<String>>,
    page_size: usize,
    upserts: AtomicUsize,
    fail_upserts_after: Option<usize>,
}

impl Default for MemoryRowStore {
    fn default() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            statements: Mutex::new(Vec::new()),
            page_size: DEFAULT_PAGE_SIZE,
            upserts: AtomicUsize::new(0),
            fail_upserts_after: None,
        }
    }
}

impl MemoryRowStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how many rows a scan reads per page.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Makes every upsert after the first `n` fail.
    #[must_use]
    pub fn fail_upserts_after(mut self, n: usize) -> Self {
        self.fail_upserts_after = Some(n);
        self
    }

    /// Creates `table` if missing and appends `rows` to it.
    pub async fn insert_rows<I>(&self, table: &str, rows: I)
    where
        I: IntoIterator<Item = Row>,
    {
        self.tables
            .write()
            .await
            .entry(table.to_string())
            .or_default()
            .extend(rows);
    }

    /// Returns a copy of every row of `table`.
    pub async fn rows(&self, table: &str) -> Vec<Row> {
        self.tables
            .read()
            .await
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns the text of every executed statement, oldest first.
    pub async fn statements(&self) -> Vec<String> {
        self.statements.lock().await.clone()
    }

    async fn apply(&self, upsert: &Upsert) -> Result<()> {
        if let Some(limit) = self.fail_upserts_after {
            if self.upserts.load(Ordering::SeqCst) >= limit {
                return Err(MigrateError::Store(format!(
                    "row store rejected write to '{}'",
                    upsert.table()
                )));
            }
        }

        let mut incoming = Row::new();
        for (column, literal) in upsert.pairs() {
            incoming.set(column, parse_literal(literal)?);
        }
        let (key_column, key_value) = incoming
            .key()
            .map(|(c, v)| (c.to_string(), v.clone()))
            .ok_or_else(|| MigrateError::Store("upsert names no columns".to_string()))?;

        let statement = upsert.to_statement();
        debug!(sql = %statement, "Executing upsert");

        let mut tables = self.tables.write().await;
        let rows = tables.entry(upsert.table().as_str().to_string()).or_default();
        match rows
            .iter_mut()
            .find(|row| row.get(&key_column) == Some(&key_value))
        {
            Some(row) => {
                for (column, value) in incoming.iter() {
                    row.set(column, value.clone());
                }
            }
            None => rows.push(incoming),
        }
        drop(tables);

        self.statements.lock().await.push(statement);
        self.upserts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl RowStore for MemoryRowStore {
    fn scan<'a>(&'a self, table: &'a TableName) -> BoxStream<'a, Result<Row>> {
        // Each page is copied under a short read lock so writers interleave.
        // The row count is fixed on the first page: rows appended during the
        // scan are not visited.
        stream::unfold(Some((0_usize, None::<usize>)), move |cursor| async move {
            let (offset, end) = cursor?;
            let tables = self.tables.read().await;
            let Some(rows) = tables.get(table.as_str()) else {
                let missing = end.is_none().then(|| {
                    MigrateError::Store(format!("table '{table}' does not exist"))
                });
                return missing.map(|e| (stream::iter(vec![Err(e)]), None));
            };

            let end = end.unwrap_or(rows.len()).min(rows.len());
            let stop = (offset + self.page_size).min(end);
            if offset >= stop {
                return None;
            }
            let page: Vec<Result<Row>> = rows[offset..stop].iter().cloned().map(Ok).collect();
            drop(tables);

            let next = (stop < end).then_some((stop, Some(end)));
            Some((stream::iter(page), next))
        })
        .flatten()
        .boxed()
    }

    fn upsert<'a>(&'a self, upsert: &'a Upsert) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.apply(upsert))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use rowshift_core::Value;

    #[derive(Debug, Clone, Default, PartialEq, Record)]
    struct Account {
        #[record(id(auto_generated = false))]
        email: String,
        name: String,
    }

    fn users() -> TableName {
        TableName::new("users").unwrap()
    }

    #[tokio::test]
    async fn test_repository_insert_and_find() {
        let provider = DescriptorProvider::new();
        let repo = MemoryRepository::<Account>::new(&provider).unwrap();
        assert!(repo.is_empty().await);

        let ada = Account {
            email: "ada@example.com".to_string(),
            name: "Ada".to_string(),
        };
        repo.insert(ada.clone()).await.unwrap();
        assert_eq!(repo.find_by_id("ada@example.com").await.unwrap(), Some(ada.clone()));
        assert!(repo.insert(ada).await.is_err());
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn test_repository_requires_caller_ids() {
        let provider = DescriptorProvider::new();
        let repo = MemoryRepository::<Account>::new(&provider).unwrap();
        let err = repo.insert(Account::default()).await.unwrap_err();
        assert!(matches!(err, MigrateError::MissingId { .. }));
    }

    #[tokio::test]
    async fn test_repository_upsert_replaces() {
        let provider = DescriptorProvider::new();
        let repo = MemoryRepository::<VersionRecord>::new(&provider).unwrap();
        let saved = repo.upsert(VersionRecord::new("users")).await.unwrap();
        assert!(!saved.id.is_empty());

        let bumped = saved.clone().with_version(Version::new(0, 2));
        repo.upsert(bumped).await.unwrap();
        let all = repo.all().await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].version, Version::new(0, 2));
    }

    #[tokio::test]
    async fn test_version_store_one_record_per_table() {
        let provider = DescriptorProvider::new();
        let store = MemoryVersionStore::new(&provider).unwrap();
        assert!(store.find_by_table_name("users").await.unwrap().is_none());

        let first = store
            .save(VersionRecord::new("users").with_version(Version::new(0, 1)))
            .await
            .unwrap();
        // A fresh record for the same table replaces the tracked one
        let second = store
            .save(VersionRecord::new("users").with_version(Version::new(0, 2)))
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(store.records().await.len(), 1);
        assert_eq!(store.version_of("users").await, Some(Version::new(0, 2)));
        assert_eq!(store.save_count(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_saves_keep_one_record_per_table() {
        let provider = DescriptorProvider::new();
        let store = Arc::new(MemoryVersionStore::new(&provider).unwrap());

        let saves = (1..=8).map(|minor| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                store
                    .save(VersionRecord::new("users").with_version(Version::new(0, minor)))
                    .await
            })
        });
        for handle in saves.collect::<Vec<_>>() {
            handle.await.unwrap().unwrap();
        }

        let records = store.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].table_name, "users");
        assert_eq!(store.save_count(), 8);
    }

    #[tokio::test]
    async fn test_version_store_fault_injection() {
        let provider = DescriptorProvider::new();
        let store = MemoryVersionStore::new(&provider)
            .unwrap()
            .fail_saves_after(1);
        store.save(VersionRecord::new("a")).await.unwrap();
        let err = store.save(VersionRecord::new("b")).await.unwrap_err();
        assert!(matches!(err, MigrateError::Store(_)));
        assert_eq!(store.version_of("b").await, None);
    }

    #[tokio::test]
    async fn test_scan_pages_through_table() {
        let store = MemoryRowStore::new().with_page_size(2);
        store
            .insert_rows("users", (1..=5).map(|i| Row::new().with("id", i)))
            .await;

        let rows: Vec<Row> = store.scan(&users()).try_collect().await.unwrap();
        let ids: Vec<&Value> = rows.iter().filter_map(|r| r.get("id")).collect();
        assert_eq!(
            ids,
            vec![
                &Value::Int(1),
                &Value::Int(2),
                &Value::Int(3),
                &Value::Int(4),
                &Value::Int(5)
            ]
        );
    }

    #[tokio::test]
    async fn test_scan_skips_rows_appended_during_scan() {
        let store = MemoryRowStore::new().with_page_size(1);
        store
            .insert_rows("users", vec![Row::new().with("id", "a").with("name", "x")])
            .await;

        let table = users();
        let mut scan = store.scan(&table);
        let mut seen = Vec::new();
        while let Some(row) = scan.try_next().await.unwrap() {
            let key = row.key().map(|(_, v)| v.to_text()).unwrap_or_default();
            // A new key appends a row instead of replacing this one
            let upsert = Upsert::into_table(users())
                .value("id", Value::from(format!("{key}a")).to_literal())
                .value("name", "'x'");
            store.upsert(&upsert).await.unwrap();
            seen.push(key);
        }

        assert_eq!(seen, vec!["a".to_string()]);
        let rows = store.rows("users").await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("id"), Some(&Value::from("a")));
        assert_eq!(rows[1].get("id"), Some(&Value::from("aa")));
    }

    #[tokio::test]
    async fn test_scan_unknown_table_fails() {
        let store = MemoryRowStore::new();
        let result: Result<Vec<Row>> = store.scan(&users()).try_collect().await;
        assert!(matches!(result, Err(MigrateError::Store(_))));
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_first_column() {
        let store = MemoryRowStore::new();
        store
            .insert_rows(
                "users",
                vec![
                    Row::new().with("id", 1).with("name", "aaa").with("age", 30),
                    Row::new().with("id", 2).with("name", "zzz"),
                ],
            )
            .await;

        let upsert = Upsert::into_table(users())
            .value("id", "1")
            .value("name", "'bb'");
        store.upsert(&upsert).await.unwrap();

        let rows = store.rows("users").await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("name"), Some(&Value::from("bb")));
        assert_eq!(rows[0].get("age"), Some(&Value::Int(30)));
        assert_eq!(
            store.statements().await,
            vec!["INSERT INTO users (\"id\", \"name\") VALUES (1, 'bb')".to_string()]
        );

        let insert = Upsert::into_table(users()).value("id", "3");
        store.upsert(&insert).await.unwrap();
        assert_eq!(store.rows("users").await.len(), 3);
    }

    #[tokio::test]
    async fn test_upsert_rejects_bad_literals() {
        let store = MemoryRowStore::new();
        let upsert = Upsert::into_table(users()).value("id", "'unterminated");
        assert!(matches!(
            store.upsert(&upsert).await,
            Err(MigrateError::Literal(_))
        ));
        assert!(store.statements().await.is_empty());
    }

    #[tokio::test]
    async fn test_upsert_fault_injection() {
        let store = MemoryRowStore::new().fail_upserts_after(0);
        let upsert = Upsert::into_table(users()).value("id", "1");
        assert!(store.upsert(&upsert).await.is_err());
        assert!(store.rows("users").await.is_empty());
    }
}
