//! Pattern-substitution migrator.
//!
//! Scans a whole table and applies a regex replacement to the textual form of
//! every non-null column. Rows where any column changed are written back with
//! a single upsert; other rows issue no write.
//!
//! Text columns are matched on their raw content and re-quoted when written.
//! Lists and maps are matched on their literal rendering (`['a','b']`,
//! `{'k':1}`), so a replacement may rewrite keys and quoted leaves alike.
//! Other scalars are matched on their natural rendering and written back
//! verbatim.
//!
//! Each run visits the rows present when its scan started. A rewrite that
//! changes a row's key column is written under the new key, so stores that
//! match upserts on the key keep the old row and gain a new one.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use futures::TryStreamExt;
use regex::Regex;
use rowshift_core::{ConfigError, TableName, Upsert, Value};
use tracing::{debug, info};

use crate::error::Result;
use crate::migrator::TableMigrator;
use crate::store::{BoxFuture, Row, RowStore};
use crate::version::Version;

/// Counters from one run of a [`RegexMigrator`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewriteStats {
    /// Rows read.
    pub scanned: usize,
    /// Rows written back.
    pub rewritten: usize,
}

/// Rewrites every column value of a table matching a pattern.
pub struct RegexMigrator {
    rows: Arc<dyn RowStore>,
    table: TableName,
    version: Version,
    pattern: Regex,
    replacement: String,
}

impl RegexMigrator {
    /// Creates a migrator.
    ///
    /// The table name is sanitized and the pattern compiled here, so a bad
    /// configuration fails before anything executes.
    pub fn new(
        rows: Arc<dyn RowStore>,
        table: &str,
        version: Version,
        pattern: &str,
        replacement: impl Into<String>,
    ) -> std::result::Result<Self, ConfigError> {
        let table = TableName::new(table)?;
        let pattern = Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            rows,
            table,
            version,
            pattern,
            replacement: replacement.into(),
        })
    }

    /// Returns the compiled pattern.
    #[must_use]
    pub const fn pattern(&self) -> &Regex {
        &self.pattern
    }

    /// Returns the replacement string.
    #[must_use]
    pub fn replacement(&self) -> &str {
        &self.replacement
    }

    /// Builds the upsert for one row, or `None` when no column matches.
    ///
    /// The upsert names every non-null column of the row, each with its
    /// possibly rewritten literal.
    #[must_use]
    pub fn rewrite_row(&self, row: &Row) -> Option<Upsert> {
        let mut upsert = Upsert::into_table(self.table.clone());
        let mut changed = false;

        for (column, value) in row.iter() {
            if value.is_null() {
                continue;
            }
            let text = value.to_text();
            let literal = match self.pattern.replace_all(&text, self.replacement.as_str()) {
                Cow::Owned(rewritten) if rewritten != text => {
                    changed = true;
                    match value {
                        Value::Text(_) => Value::Text(rewritten).to_literal(),
                        _ => rewritten,
                    }
                }
                _ => value.to_literal(),
            };
            upsert.push(column, literal);
        }

        changed.then_some(upsert)
    }

    /// Streams the table and rewrites matching rows.
    pub async fn run(&self) -> Result<RewriteStats> {
        let mut stats = RewriteStats::default();
        let mut rows = self.rows.scan(&self.table);

        while let Some(row) = rows.try_next().await? {
            stats.scanned += 1;
            if let Some(upsert) = self.rewrite_row(&row) {
                debug!(table = %self.table, sql = %upsert, "Rewriting row");
                self.rows.upsert(&upsert).await?;
                stats.rewritten += 1;
            }
        }

        info!(
            table = %self.table,
            version = %self.version,
            scanned = stats.scanned,
            rewritten = stats.rewritten,
            "Pattern substitution complete"
        );
        Ok(stats)
    }
}

impl TableMigrator for RegexMigrator {
    fn target_table(&self) -> &TableName {
        &self.table
    }

    fn target_version(&self) -> Version {
        self.version
    }

    fn description(&self) -> String {
        format!(
            "{}@{} s/{}/{}/",
            self.table, self.version, self.pattern, self.replacement
        )
    }

    fn execute(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.run().await?;
            Ok(())
        })
    }
}

impl fmt::Debug for RegexMigrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegexMigrator")
            .field("table", &self.table)
            .field("version", &self.version)
            .field("pattern", &self.pattern.as_str())
            .field("replacement", &self.replacement)
            .finish_non_exhaustive()
    }
}
