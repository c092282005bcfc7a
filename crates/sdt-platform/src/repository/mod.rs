//! Repository Layer
//!
//! Persistence gateway for accounts and records. Services only see the
//! [`AccountStore`] and [`RecordStore`] traits; [`SqliteStorage`] is the
//! production implementation.

pub mod sqlite;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::{Account, AccountId, IdentityId, NewRecord, Record, RecordId};

pub use sqlite::SqliteStorage;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("account not found")]
    AccountNotFound,

    /// Unique constraint on `accounts.identity_id` rejected the insert
    #[error("account exists")]
    AccountExists,

    #[error("record not found")]
    RecordNotFound,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn account_by_id(&self, id: AccountId) -> Result<Account>;
    async fn account_by_identity_id(&self, identity_id: IdentityId) -> Result<Account>;
    /// Insert an account with the given limit; `AccountExists` on a duplicate identity.
    async fn save_account(&self, identity_id: IdentityId, daily_limit: i64) -> Result<AccountId>;
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn record_by_id(&self, id: RecordId) -> Result<Record>;
    /// Records of one account for one calendar day, newest first.
    async fn records_by_account(&self, account_id: AccountId, date: NaiveDate) -> Result<Vec<Record>>;
    async fn save_record(&self, record: &NewRecord) -> Result<RecordId>;
    /// Delete only when both ids match; returns the number of rows removed.
    async fn delete_record(&self, account_id: AccountId, record_id: RecordId) -> Result<u64>;
}
