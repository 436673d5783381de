//! Versioned per-table data migrations for record-oriented stores.
//!
//! `rowshift-migrate` applies independently authored migration steps to the
//! tables of a store, recording per table the highest version applied:
//! - Each table only receives the steps it has not seen, in ascending version
//!   order, one at a time
//! - Progress is recorded after every successful step, so a failed run
//!   resumes where it stopped
//! - Tables are migrated independently, optionally concurrently
//!
//! # Architecture
//!
//! - **Version** - `MAJOR.MINOR` ordering and the per-table `VersionRecord`
//! - **Stores** - `VersionStore` and `RowStore`, with in-memory and SQLite
//!   implementations
//! - **Migrators** - The `TableMigrator` trait and the pattern-substitution
//!   `RegexMigrator`
//! - **Orchestrator** - Plans and runs migrators, producing a `MigrationReport`
//! - **Config** - JSON rule files that build an orchestrator
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use rowshift_core::DescriptorProvider;
//! use rowshift_migrate::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<()> {
//! let provider = DescriptorProvider::new();
//! let versions = Arc::new(MemoryVersionStore::new(&provider)?);
//! let rows = Arc::new(MemoryRowStore::new());
//! rows.insert_rows("users", vec![Row::new().with("id", 1).with("name", "aaa-x")])
//!     .await;
//!
//! let rename = RegexMigrator::new(rows.clone(), "users", Version::new(0, 1), "aaa", "bb")?;
//! let report = Orchestrator::new(versions.clone())
//!     .register(Arc::new(rename))
//!     .migrate()
//!     .await
//!     .into_result()?;
//!
//! assert_eq!(report.applied_count(), 1);
//! assert_eq!(versions.version_of("users").await, Some(Version::new(0, 1)));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod memory;
pub mod migrator;
pub mod orchestrator;
pub mod regex_migrator;
pub mod report;
pub mod sqlite;
pub mod store;
pub mod version;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::{MigrationConfig, RegexRule};
    pub use crate::error::{MigrateError, Result};
    pub use crate::memory::{MemoryRepository, MemoryRowStore, MemoryVersionStore};
    pub use crate::migrator::TableMigrator;
    pub use crate::orchestrator::{migrate, Orchestrator, OrchestratorOptions};
    pub use crate::regex_migrator::{RegexMigrator, RewriteStats};
    pub use crate::report::{
        MigrationReport, TableFailure, TableOutcome, TablePlan, TableReport,
    };
    pub use crate::sqlite::SqliteVersionStore;
    pub use crate::store::{BoxFuture, Row, RowStore, VersionStore};
    pub use crate::version::{Version, VersionRecord};
}

pub use error::{MigrateError, Result};
pub use orchestrator::{migrate, Orchestrator};
