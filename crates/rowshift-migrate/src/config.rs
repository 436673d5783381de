//! JSON migration configuration.
//!
//! A configuration declares orchestrator options and a list of
//! pattern-substitution rules:
//!
//! ```json
//! {
//!   "options": { "concurrency": 2 },
//!   "rules": [
//!     { "table": "users", "version": "0.1", "pattern": "aaa", "replacement": "bb" }
//!   ]
//! }
//! ```

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::migrator::TableMigrator;
use crate::orchestrator::{Orchestrator, OrchestratorOptions};
use crate::regex_migrator::RegexMigrator;
use crate::store::{RowStore, VersionStore};
use crate::version::Version;

/// One pattern-substitution step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegexRule {
    /// Target table.
    pub table: String,
    /// Target version, as `MAJOR.MINOR`.
    pub version: Version,
    /// Regular expression matched against column values.
    pub pattern: String,
    /// Replacement, which may reference capture groups as `$1` or `${name}`.
    pub replacement: String,
}

/// A full migration configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Orchestrator options.
    pub options: OrchestratorOptions,
    /// Pattern-substitution rules, in any order.
    pub rules: Vec<RegexRule>,
}

impl MigrationConfig {
    /// Parses a configuration from JSON.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a JSON configuration file.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path).await?;
        let config = Self::from_json_str(&json)?;
        debug!(path = %path.display(), rules = config.rules.len(), "Loaded migration config");
        Ok(config)
    }

    /// Builds a migrator for every rule against `rows`.
    ///
    /// Fails on the first rule with an invalid table name or pattern.
    pub fn migrators(&self, rows: &Arc<dyn RowStore>) -> Result<Vec<Arc<dyn TableMigrator>>> {
        self.rules
            .iter()
            .map(|rule| -> Result<Arc<dyn TableMigrator>> {
                let migrator = RegexMigrator::new(
                    Arc::clone(rows),
                    &rule.table,
                    rule.version,
                    &rule.pattern,
                    rule.replacement.clone(),
                )?;
                Ok(Arc::new(migrator))
            })
            .collect()
    }

    /// Builds an orchestrator with this configuration's options and rules.
    pub fn orchestrator(
        &self,
        versions: Arc<dyn VersionStore>,
        rows: &Arc<dyn RowStore>,
    ) -> Result<Orchestrator> {
        Ok(Orchestrator::new(versions)
            .with_options(self.options)
            .register_all(self.migrators(rows)?))
    }
}
