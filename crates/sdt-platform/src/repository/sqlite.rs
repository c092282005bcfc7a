//! SQLite Storage
//!
//! Accounts and records live in one SQLite database. The schema is managed by
//! the migrations embedded from `migrations/`.

use std::collections::HashSet;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::{debug, info};

use super::{AccountStore, RecordStore, Result, StorageError};
use crate::domain::{Account, AccountId, IdentityId, NewRecord, Record, RecordId};

/// Migrations shipped with the crate
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if missing) the database file at `storage_path`.
    pub async fn connect(storage_path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(storage_path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        info!("SQLite storage opened: {}", storage_path);
        Ok(Self { pool })
    }

    /// Private in-memory database.
    ///
    /// Every SQLite memory connection is its own database, so the pool is
    /// pinned to one connection that never expires.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Apply the embedded migrations.
    pub async fn migrate(&self) -> Result<usize> {
        self.run_migrations(&MIGRATOR).await
    }

    /// Apply `migrator`, returning how many migrations were pending.
    pub async fn run_migrations(&self, migrator: &Migrator) -> Result<usize> {
        let applied = self.applied_versions().await?;
        let pending = migrator
            .iter()
            .filter(|m| !m.migration_type.is_down_migration() && !applied.contains(&m.version))
            .count();

        migrator.run(&self.pool).await?;

        debug!("Applied {} pending migrations", pending);
        Ok(pending)
    }

    async fn applied_versions(&self) -> Result<HashSet<i64>> {
        let table: Option<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations'",
        )
        .fetch_optional(&self.pool)
        .await?;

        if table.is_none() {
            return Ok(HashSet::new());
        }

        let versions: Vec<i64> =
            sqlx::query_scalar("SELECT version FROM _sqlx_migrations WHERE success = 1")
                .fetch_all(&self.pool)
                .await?;
        Ok(versions.into_iter().collect())
    }
}

fn account_from_row(row: &SqliteRow) -> Result<Account> {
    Ok(Account {
        id: AccountId(row.try_get("id")?),
        identity_id: IdentityId(row.try_get("identity_id")?),
        daily_limit: row.try_get("daily_limit")?,
    })
}

fn record_from_row(row: &SqliteRow) -> Result<Record> {
    let created_ms: i64 = row.try_get("date_created")?;
    let date_created = DateTime::from_timestamp_millis(created_ms)
        .ok_or_else(|| StorageError::Corrupt(format!("invalid date_created {}", created_ms)))?;

    Ok(Record {
        id: RecordId(row.try_get("id")?),
        account_id: AccountId(row.try_get("account_id")?),
        value: row.try_get("value")?,
        date_record: row.try_get::<NaiveDate, _>("date_record")?,
        date_created,
    })
}

#[async_trait]
impl AccountStore for SqliteStorage {
    async fn account_by_id(&self, id: AccountId) -> Result<Account> {
        let row = sqlx::query("SELECT id, identity_id, daily_limit FROM accounts WHERE id = ?")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StorageError::AccountNotFound)?;
        account_from_row(&row)
    }

    async fn account_by_identity_id(&self, identity_id: IdentityId) -> Result<Account> {
        let row = sqlx::query("SELECT id, identity_id, daily_limit FROM accounts WHERE identity_id = ?")
            .bind(identity_id.0)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StorageError::AccountNotFound)?;
        account_from_row(&row)
    }

    async fn save_account(&self, identity_id: IdentityId, daily_limit: i64) -> Result<AccountId> {
        let result = sqlx::query("INSERT INTO accounts (identity_id, daily_limit) VALUES (?, ?)")
            .bind(identity_id.0)
            .bind(daily_limit)
            .execute(&self.pool)
            .await;

        match result {
            Ok(done) => Ok(AccountId(done.last_insert_rowid())),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StorageError::AccountExists)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl RecordStore for SqliteStorage {
    async fn record_by_id(&self, id: RecordId) -> Result<Record> {
        let row = sqlx::query(
            "SELECT id, account_id, value, date_record, date_created FROM records WHERE id = ?",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StorageError::RecordNotFound)?;
        record_from_row(&row)
    }

    async fn records_by_account(&self, account_id: AccountId, date: NaiveDate) -> Result<Vec<Record>> {
        let rows = sqlx::query(
            r#"
            SELECT id, account_id, value, date_record, date_created
            FROM records
            WHERE account_id = ? AND date_record = ?
            ORDER BY date_created DESC, id DESC
            "#,
        )
        .bind(account_id.0)
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    async fn save_record(&self, record: &NewRecord) -> Result<RecordId> {
        let done = sqlx::query(
            "INSERT INTO records (account_id, value, date_record, date_created) VALUES (?, ?, ?, ?)",
        )
        .bind(record.account_id.0)
        .bind(record.value)
        .bind(record.date_record)
        .bind(record.date_created.timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(RecordId(done.last_insert_rowid()))
    }

    async fn delete_record(&self, account_id: AccountId, record_id: RecordId) -> Result<u64> {
        let done = sqlx::query("DELETE FROM records WHERE account_id = ? AND id = ?")
            .bind(account_id.0)
            .bind(record_id.0)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected())
    }
}
