//! The table migrator interface.

use rowshift_core::TableName;

use crate::error::Result;
use crate::store::BoxFuture;
use crate::version::Version;

/// One versioned transformation step against one table.
///
/// A migrator owns no persisted state. The orchestrator records its
/// [`target_version`](Self::target_version) once [`execute`](Self::execute)
/// returns `Ok`; a migrator interrupted mid-run may leave some rows
/// transformed, so `execute` should tolerate being re-run.
///
/// # Example
///
/// ```ignore
/// struct AddDefaults {
///     table: TableName,
///     rows: Arc<dyn RowStore>,
/// }
///
/// impl TableMigrator for AddDefaults {
///     fn target_table(&self) -> &TableName {
///         &self.table
///     }
///
///     fn target_version(&self) -> Version {
///         Version::new(0, 2)
///     }
///
///     fn execute(&self) -> BoxFuture<'_, Result<()>> {
///         Box::pin(async move {
///             let upsert = Upsert::into_table(self.table.clone())
///                 .value("id", "1")
///                 .value("plan", "'free'");
///             self.rows.upsert(&upsert).await
///         })
///     }
/// }
/// ```
pub trait TableMigrator: Send + Sync {
    /// The table this step applies to.
    fn target_table(&self) -> &TableName;

    /// The version this step advances the table to.
    fn target_version(&self) -> Version;

    /// A human-readable label used in logs and reports.
    fn description(&self) -> String {
        format!("{}@{}", self.target_table(), self.target_version())
    }

    /// Performs the transformation.
    fn execute(&self) -> BoxFuture<'_, Result<()>>;
}
