//! Migration orchestration.
//!
//! Migrators are grouped by target table. Each group reads the table's
//! recorded version, runs the migrators with a greater target version one at
//! a time in ascending order, and records the new version after every
//! successful step. Groups are independent: one table failing does not stop
//! the others.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::{MigrateError, Result};
use crate::migrator::TableMigrator;
use crate::report::{MigrationReport, TableFailure, TableOutcome, TablePlan, TableReport};
use crate::store::VersionStore;
use crate::version::{Version, VersionRecord};

/// Default number of tables migrated concurrently.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Options controlling a migration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorOptions {
    /// Maximum number of table groups in flight. `1` runs tables one after
    /// another; `0` is treated as `1`.
    pub concurrency: usize,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl OrchestratorOptions {
    /// Options that migrate one table at a time.
    #[must_use]
    pub const fn sequential() -> Self {
        Self { concurrency: 1 }
    }

    /// Sets the concurrency.
    #[must_use]
    pub const fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }
}

/// Applies registered [`TableMigrator`]s against a [`VersionStore`].
///
/// # Example
///
/// ```ignore
/// let orchestrator = Orchestrator::new(versions)
///     .register(Arc::new(rename_domain))
///     .register(Arc::new(fix_tags));
///
/// let report = orchestrator.migrate().await;
/// for table in report.failed_tables() {
///     eprintln!("{table} needs attention");
/// }
/// ```
pub struct Orchestrator {
    store: Arc<dyn VersionStore>,
    migrators: Vec<Arc<dyn TableMigrator>>,
    options: OrchestratorOptions,
}

impl Orchestrator {
    /// Creates an orchestrator recording progress in `store`.
    #[must_use]
    pub fn new(store: Arc<dyn VersionStore>) -> Self {
        Self {
            store,
            migrators: Vec::new(),
            options: OrchestratorOptions::default(),
        }
    }

    /// Registers a migrator.
    #[must_use]
    pub fn register(mut self, migrator: Arc<dyn TableMigrator>) -> Self {
        self.migrators.push(migrator);
        self
    }

    /// Registers several migrators.
    #[must_use]
    pub fn register_all<I>(mut self, migrators: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn TableMigrator>>,
    {
        self.migrators.extend(migrators);
        self
    }

    /// Sets the run options.
    #[must_use]
    pub fn with_options(mut self, options: OrchestratorOptions) -> Self {
        self.options = options;
        self
    }

    /// Returns the registered migrators, in registration order.
    #[must_use]
    pub fn migrators(&self) -> &[Arc<dyn TableMigrator>] {
        &self.migrators
    }

    /// Returns the run options.
    #[must_use]
    pub const fn options(&self) -> OrchestratorOptions {
        self.options
    }

    /// Computes what a run would execute, without executing or writing
    /// anything.
    pub async fn pending(&self) -> Result<Vec<TablePlan>> {
        let mut plans = Vec::new();
        for (table, group) in group_by_table(&self.migrators) {
            let current = current_record(self.store.as_ref(), &table).await?.version;
            let pending = order_group(&table, group)?
                .iter()
                .map(|m| m.target_version())
                .filter(|v| *v > current)
                .collect();
            plans.push(TablePlan {
                table,
                current,
                pending,
            });
        }
        Ok(plans)
    }

    /// Runs every pending migrator and reports the outcome per table.
    pub async fn migrate(&self) -> MigrationReport {
        run(&self.migrators, self.store.as_ref(), self.options).await
    }
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let migrators: Vec<String> = self.migrators.iter().map(|m| m.description()).collect();
        f.debug_struct("Orchestrator")
            .field("migrators", &migrators)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Runs every pending migrator in `migrators` with default options.
pub async fn migrate(
    migrators: &[Arc<dyn TableMigrator>],
    store: &dyn VersionStore,
) -> MigrationReport {
    run(migrators, store, OrchestratorOptions::default()).await
}

async fn run(
    migrators: &[Arc<dyn TableMigrator>],
    store: &dyn VersionStore,
    options: OrchestratorOptions,
) -> MigrationReport {
    let groups = group_by_table(migrators);
    info!(
        tables = groups.len(),
        migrators = migrators.len(),
        concurrency = options.concurrency.max(1),
        "Starting migration run"
    );

    let mut tables: Vec<TableReport> = stream::iter(groups)
        .map(|(table, group)| run_table(table, group, store))
        .buffer_unordered(options.concurrency.max(1))
        .collect()
        .await;
    tables.sort_by(|a, b| a.table.cmp(&b.table));

    let report = MigrationReport { tables };
    if report.is_success() {
        info!(applied = report.applied_count(), "Migration run complete");
    } else {
        warn!(
            applied = report.applied_count(),
            failed = ?report.failed_tables(),
            "Migration run finished with failures"
        );
    }
    report
}

fn group_by_table(
    migrators: &[Arc<dyn TableMigrator>],
) -> BTreeMap<String, Vec<Arc<dyn TableMigrator>>> {
    let mut groups: BTreeMap<String, Vec<Arc<dyn TableMigrator>>> = BTreeMap::new();
    for migrator in migrators {
        groups
            .entry(migrator.target_table().as_str().to_string())
            .or_default()
            .push(Arc::clone(migrator));
    }
    groups
}

/// Sorts a table's migrators by target version, rejecting duplicates.
fn order_group(
    table: &str,
    mut group: Vec<Arc<dyn TableMigrator>>,
) -> Result<Vec<Arc<dyn TableMigrator>>> {
    group.sort_by_key(|m| m.target_version());
    if let Some(pair) = group
        .windows(2)
        .find(|pair| pair[0].target_version() == pair[1].target_version())
    {
        return Err(MigrateError::DuplicateVersion {
            table: table.to_string(),
            version: pair[0].target_version(),
        });
    }
    Ok(group)
}

async fn current_record(store: &dyn VersionStore, table: &str) -> Result<VersionRecord> {
    Ok(store
        .find_by_table_name(table)
        .await?
        .unwrap_or_else(|| VersionRecord::new(table)))
}

async fn run_table(
    table: String,
    group: Vec<Arc<dyn TableMigrator>>,
    store: &dyn VersionStore,
) -> TableReport {
    let mut record = match current_record(store, &table).await {
        Ok(record) => record,
        Err(error) => {
            error!(table = %table, error = %error, "Failed to read table version");
            // The version is unknown; ZERO is a placeholder
            let failure = TableFailure::VersionRead(error);
            return finished(table, Version::ZERO, Vec::new(), Some(failure));
        }
    };
    let from = record.version;

    let group = match order_group(&table, group) {
        Ok(group) => group,
        Err(error) => {
            error!(table = %table, error = %error, "Refusing to migrate table");
            return finished(table, from, Vec::new(), Some(TableFailure::Plan(error)));
        }
    };

    let pending: Vec<_> = group
        .into_iter()
        .filter(|m| m.target_version() > from)
        .collect();
    if pending.is_empty() {
        debug!(table = %table, version = %from, "Table is up to date");
        return finished(table, from, Vec::new(), None);
    }

    info!(
        table = %table,
        from = %from,
        pending = pending.len(),
        "Migrating table"
    );

    let mut applied = Vec::new();
    let mut failure = None;
    for migrator in pending {
        let version = migrator.target_version();
        info!(
            table = %table,
            version = %version,
            migrator = %migrator.description(),
            "Applying migrator"
        );

        if let Err(error) = migrator.execute().await {
            error!(table = %table, version = %version, error = %error, "Migrator failed");
            failure = Some(TableFailure::Migrator { version, error });
            break;
        }

        record.version = version;
        match store.save(record.clone()).await {
            Ok(saved) => {
                record = saved;
                applied.push(version);
            }
            Err(error) => {
                error!(
                    table = %table,
                    version = %version,
                    error = %error,
                    "Migrator succeeded but its version was not recorded; it will be re-applied"
                );
                failure = Some(TableFailure::VersionWrite { version, error });
                break;
            }
        }
    }

    finished(table, from, applied, failure)
}

fn finished(
    table: String,
    from: Version,
    applied: Vec<Version>,
    failure: Option<TableFailure>,
) -> TableReport {
    let to = applied.last().copied().unwrap_or(from);
    let outcome = match failure {
        Some(failure) if applied.is_empty() => TableOutcome::Failed(failure),
        Some(failure) => TableOutcome::Partial(failure),
        None if applied.is_empty() => TableOutcome::Untouched,
        None => TableOutcome::Completed,
    };
    if outcome.is_success() {
        debug!(table = %table, from = %from, to = %to, outcome = %outcome, "Table finished");
    }
    TableReport {
        table,
        outcome,
        from,
        to,
        applied,
    }
}
