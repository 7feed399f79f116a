//! Recomputes every contact's deal value from its won deals.
//!
//! Used after imports or manual database edits. With `--dry-run` the pass
//! runs inside a transaction that is rolled back.

use anyhow::{Context, Result};
use clap::Parser;
use crm::aggregation::sync_all_contact_values_in;
use crm::config::ConfigLoader;
use crm::{db, telemetry};
use sea_orm::TransactionTrait;

#[derive(Debug, Parser)]
#[command(about = "Recompute contact deal values from won deals")]
struct Args {
    /// Report what would change without writing
    #[arg(long)]
    dry_run: bool,

    /// Override CRM_DATABASE_URL
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ConfigLoader::new().load().context("loading configuration")?;
    if let Some(url) = args.database_url {
        config.database_url = url;
    }
    telemetry::init_tracing(&config).context("initializing tracing")?;

    let db = db::init_pool(&config)
        .await
        .context("initializing database connection pool")?;
    if config.run_migrations {
        db::run_migrations(&db).await.context("running migrations")?;
    }

    let txn = db.begin().await.context("opening transaction")?;
    let report = sync_all_contact_values_in(&txn)
        .await
        .context("syncing contact deal values")?;

    if args.dry_run {
        txn.rollback().await.context("rolling back dry run")?;
    } else {
        txn.commit().await.context("committing contact deal values")?;
    }

    println!(
        "Scanned {} contacts, {} {}",
        report.contacts_scanned,
        report.contacts_updated,
        if args.dry_run { "would change" } else { "updated" }
    );

    Ok(())
}
