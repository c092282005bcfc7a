//! Simple Diet Tracker Migrator
//!
//! Applies schema migrations to the SQLite database. The migrations embedded
//! in `sdt-platform` are used unless `--migrations-path` points elsewhere.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use sqlx::migrate::Migrator;
use tracing::info;

use sdt_common::Environment;
use sdt_platform::repository::SqliteStorage;

#[derive(Parser, Debug)]
#[command(name = "sdt-migrator")]
#[command(about = "Apply database migrations")]
struct Args {
    /// Path of the SQLite database file
    #[arg(long)]
    storage_path: String,

    /// Directory with migration files, embedded set when omitted
    #[arg(long)]
    migrations_path: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    sdt_common::init_logging(Environment::Local);
    let args = Args::parse();

    let storage = SqliteStorage::connect(&args.storage_path)
        .await
        .with_context(|| format!("failed to open {}", args.storage_path))?;

    let applied = match &args.migrations_path {
        Some(dir) => {
            let migrator = Migrator::new(Path::new(dir))
                .await
                .with_context(|| format!("failed to read migrations from {}", dir))?;
            storage.run_migrations(&migrator).await
        }
        None => storage.migrate().await,
    }
    .context("failed to apply migrations")?;

    if applied == 0 {
        println!("no migrations to apply");
    } else {
        info!("Applied {} migrations to {}", applied, args.storage_path);
        println!("migrations applied successfully");
    }

    Ok(())
}
