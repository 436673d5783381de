//! Per-table migration outcomes.

use std::fmt;

use crate::error::MigrateError;
use crate::version::Version;

/// Why a table's migration sequence stopped.
#[derive(Debug)]
pub enum TableFailure {
    /// The sequence could not be planned (for example, duplicate versions).
    Plan(MigrateError),
    /// The current version could not be read. Nothing ran.
    VersionRead(MigrateError),
    /// A migrator failed. Earlier steps stay recorded.
    Migrator {
        /// The failing step's target version.
        version: Version,
        /// The migrator's error.
        error: MigrateError,
    },
    /// A migrator succeeded but its version could not be recorded.
    ///
    /// The next run will apply this step again.
    VersionWrite {
        /// The step whose version was not recorded.
        version: Version,
        /// The store's error.
        error: MigrateError,
    },
}

impl TableFailure {
    /// Returns the underlying error.
    #[must_use]
    pub const fn error(&self) -> &MigrateError {
        match self {
            Self::Plan(error) | Self::VersionRead(error) => error,
            Self::Migrator { error, .. } | Self::VersionWrite { error, .. } => error,
        }
    }

    /// Returns whether the next run may re-apply an already applied step.
    #[must_use]
    pub const fn may_reapply(&self) -> bool {
        matches!(self, Self::VersionWrite { .. })
    }
}

impl fmt::Display for TableFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plan(error) => write!(f, "planning failed: {error}"),
            Self::VersionRead(error) => write!(f, "reading version failed: {error}"),
            Self::Migrator { version, error } => {
                write!(f, "migrator {version} failed: {error}")
            }
            Self::VersionWrite { version, error } => write!(
                f,
                "recording version {version} failed, it will be re-applied: {error}"
            ),
        }
    }
}

/// The end state of one table's migration sequence.
#[derive(Debug)]
pub enum TableOutcome {
    /// No migrator was pending.
    Untouched,
    /// Every pending migrator ran and was recorded.
    Completed,
    /// Some migrators were recorded before a failure.
    Partial(TableFailure),
    /// The sequence failed before any progress was recorded.
    Failed(TableFailure),
}

impl TableOutcome {
    /// Returns the failure, if any.
    #[must_use]
    pub const fn failure(&self) -> Option<&TableFailure> {
        match self {
            Self::Partial(failure) | Self::Failed(failure) => Some(failure),
            Self::Untouched | Self::Completed => None,
        }
    }

    /// Returns whether the sequence ended without failure.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Untouched | Self::Completed)
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Untouched => "untouched",
            Self::Completed => "completed",
            Self::Partial(_) => "partial",
            Self::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for TableOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.failure() {
            Some(failure) => write!(f, "{} ({failure})", self.label()),
            None => f.write_str(self.label()),
        }
    }
}

/// The result of migrating one table.
#[derive(Debug)]
pub struct TableReport {
    /// The table.
    pub table: String,
    /// How the sequence ended.
    pub outcome: TableOutcome,
    /// The recorded version before the run.
    ///
    /// When the version could not be read ([`TableFailure::VersionRead`]),
    /// `from` and `to` hold [`Version::ZERO`] as placeholders and the real
    /// version is unknown; see [`TableReport::is_version_known`].
    pub from: Version,
    /// The recorded version after the run.
    pub to: Version,
    /// Target versions of the migrators that ran and were recorded, in order.
    pub applied: Vec<Version>,
}

impl TableReport {
    /// Returns whether `from` and `to` reflect a version read from the store.
    #[must_use]
    pub fn is_version_known(&self) -> bool {
        !matches!(self.outcome, TableOutcome::Failed(TableFailure::VersionRead(_)))
    }
}

impl fmt::Display for TableReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_version_known() {
            write!(f, "{}: {} -> {} {}", self.table, self.from, self.to, self.outcome)
        } else {
            write!(f, "{}: version unknown {}", self.table, self.outcome)
        }
    }
}

/// The result of a whole migration run, one entry per table.
#[derive(Debug, Default)]
pub struct MigrationReport {
    /// Per-table reports, sorted by table name.
    pub tables: Vec<TableReport>,
}

impl MigrationReport {
    /// Returns whether every table ended without failure.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.tables.iter().all(|t| t.outcome.is_success())
    }

    /// Returns the report for `table`.
    #[must_use]
    pub fn table(&self, table: &str) -> Option<&TableReport> {
        self.tables.iter().find(|t| t.table == table)
    }

    /// Returns the names of tables whose sequence failed.
    #[must_use]
    pub fn failed_tables(&self) -> Vec<&str> {
        self.tables
            .iter()
            .filter(|t| !t.outcome.is_success())
            .map(|t| t.table.as_str())
            .collect()
    }

    /// Returns the total number of migrators applied.
    #[must_use]
    pub fn applied_count(&self) -> usize {
        self.tables.iter().map(|t| t.applied.len()).sum()
    }

    /// Converts the report into an error listing every failed table.
    ///
    /// Succeeds with the report when no table failed.
    pub fn into_result(self) -> Result<Self, MigrateError> {
        if self.is_success() {
            return Ok(self);
        }

        let errors: Vec<MigrateError> = self
            .tables
            .into_iter()
            .filter_map(|t| match t.outcome {
                TableOutcome::Partial(failure) | TableOutcome::Failed(failure) => {
                    Some(MigrateError::Table {
                        table: t.table,
                        failure: Box::new(failure),
                    })
                }
                TableOutcome::Untouched | TableOutcome::Completed => None,
            })
            .collect();
        Err(MigrateError::Multiple(errors))
    }
}

impl fmt::Display for MigrationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, table) in self.tables.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{table}")?;
        }
        Ok(())
    }
}

/// The pending work for one table, computed without executing anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TablePlan {
    /// The table.
    pub table: String,
    /// The recorded version.
    pub current: Version,
    /// Target versions that would run, in execution order.
    pub pending: Vec<Version>,
}

impl TablePlan {
    /// Returns whether nothing would run.
    #[must_use]
    pub fn is_up_to_date(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(table: &str, outcome: TableOutcome) -> TableReport {
        TableReport {
            table: table.to_string(),
            outcome,
            from: Version::ZERO,
            to: Version::new(0, 1),
            applied: vec![Version::new(0, 1)],
        }
    }

    #[test]
    fn test_unread_version_is_unknown() {
        let unread = TableReport {
            table: "users".to_string(),
            outcome: TableOutcome::Failed(TableFailure::VersionRead(MigrateError::Store(
                "offline".to_string(),
            ))),
            from: Version::ZERO,
            to: Version::ZERO,
            applied: Vec::new(),
        };
        assert!(!unread.is_version_known());
        assert!(unread.to_string().starts_with("users: version unknown"));
        assert!(!unread.to_string().contains("0.0"));

        assert!(report("users", TableOutcome::Completed).is_version_known());
        assert!(report("users", TableOutcome::Completed)
            .to_string()
            .starts_with("users: 0.0 -> 0.1"));
    }

    #[test]
    fn test_failed_tables_and_into_result() {
        let report = MigrationReport {
            tables: vec![
                report("accounts", TableOutcome::Completed),
                report(
                    "orders",
                    TableOutcome::Partial(TableFailure::Migrator {
                        version: Version::new(0, 2),
                        error: MigrateError::Execution("boom".to_string()),
                    }),
                ),
                report("users", TableOutcome::Untouched),
            ],
        };

        assert!(!report.is_success());
        assert_eq!(report.failed_tables(), vec!["orders"]);
        assert_eq!(report.applied_count(), 3);

        match report.into_result() {
            Err(MigrateError::Multiple(errors)) => {
                assert_eq!(errors.len(), 1);
                let message = errors[0].to_string();
                assert!(message.contains("orders"));
                assert!(message.contains("migrator 0.2 failed"));
            }
            other => panic!("expected Multiple, got {other:?}"),
        }
    }

    #[test]
    fn test_successful_report_passes_through() {
        let report = MigrationReport {
            tables: vec![report("users", TableOutcome::Completed)],
        };
        let report = report.into_result().unwrap();
        assert_eq!(report.to_string(), "users: 0.0 -> 0.1 completed");
    }

    #[test]
    fn test_version_write_failure_is_distinct() {
        let failure = TableFailure::VersionWrite {
            version: Version::new(0, 3),
            error: MigrateError::Store("disk full".to_string()),
        };
        assert!(failure.may_reapply());
        assert!(failure.to_string().contains("re-applied"));
        assert!(matches!(failure.error(), MigrateError::Store(_)));

        let migrator = TableFailure::Migrator {
            version: Version::new(0, 3),
            error: MigrateError::Execution("bad row".to_string()),
        };
        assert!(!migrator.may_reapply());
    }
}
