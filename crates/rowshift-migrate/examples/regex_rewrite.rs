//! Rewrites a domain name across a table with a pattern-substitution
//! migrator, recording progress in a SQLite file.
//!
//! Run with `cargo run -p rowshift-migrate --example regex_rewrite`. Running
//! it twice against the same database applies nothing the second time.

use std::sync::Arc;

use rowshift_core::{DescriptorProvider, Value};
use rowshift_migrate::prelude::*;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let db_path = std::env::temp_dir().join("rowshift-example.db");
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(
            SqliteConnectOptions::new()
                .filename(&db_path)
                .create_if_missing(true),
        )
        .await?;

    let provider = DescriptorProvider::new();
    let versions = SqliteVersionStore::new(pool, &provider)?;
    versions.ensure_table().await?;
    let versions = Arc::new(versions);

    let rows = Arc::new(MemoryRowStore::new());
    rows.insert_rows(
        "customers",
        vec![
            Row::new()
                .with("id", 1)
                .with("email", "ada@old.example")
                .with("aliases", Value::list(["ada@old.example", "al@other.example"])),
            Row::new().with("id", 2).with("email", "grace@other.example"),
            Row::new().with("id", 3).with("email", Value::Null),
        ],
    )
    .await;

    let config = MigrationConfig::from_json_str(
        r#"{
            "rules": [
                { "table": "customers", "version": "1.0", "pattern": "@old\\.example", "replacement": "@new.example" },
                { "table": "customers", "version": "1.1", "pattern": "^(\\w+)@new", "replacement": "$1+migrated@new" }
            ]
        }"#,
    )?;

    let row_store: Arc<dyn RowStore> = rows.clone();
    let orchestrator = config.orchestrator(versions.clone(), &row_store)?;
    for plan in orchestrator.pending().await? {
        println!("{}: at {}, pending {:?}", plan.table, plan.current, plan.pending);
    }

    let report = orchestrator.migrate().await;
    println!("{report}");

    for statement in rows.statements().await {
        println!("{statement}");
    }
    for record in versions.all().await? {
        println!("{} is at {}", record.table_name, record.version);
    }

    report.into_result()?;
    Ok(())
}
