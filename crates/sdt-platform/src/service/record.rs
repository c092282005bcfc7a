//! Record Service
//!
//! Every operation resolves the caller's account from verified claims first
//! and scopes all storage calls to that account.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{debug, info};

use super::{log_failure, AccountService};
use crate::context::CallContext;
use crate::domain::{NewRecord, Record, RecordId, VerifiedClaims};
use crate::error::{Result, ServiceError};
use crate::repository::RecordStore;

#[derive(Clone)]
pub struct RecordService {
    records: Arc<dyn RecordStore>,
    accounts: Arc<AccountService>,
}

impl RecordService {
    pub fn new(records: Arc<dyn RecordStore>, accounts: Arc<AccountService>) -> Self {
        Self { records, accounts }
    }

    /// Caller's records for one calendar day, newest first.
    pub async fn list_for_caller(
        &self,
        ctx: &CallContext,
        claims: &VerifiedClaims,
        date: NaiveDate,
    ) -> Result<Vec<Record>> {
        const OP: &str = "services.record.list_for_caller";

        let account = self.accounts.account_from_claims(ctx, claims).await?;

        let result = match ctx.run(OP, self.records.records_by_account(account.id, date)).await {
            Ok(Ok(records)) => {
                debug!(op = OP, account_id = %account.id, %date, count = records.len(), "records listed");
                Ok(records)
            }
            Ok(Err(e)) => Err(ServiceError::unexpected(OP, e)),
            Err(e) => Err(e),
        };
        result.inspect_err(|e| log_failure(OP, e))
    }

    /// Store a new intake entry for the caller. `value` must be at least 1.
    pub async fn create_for_caller(
        &self,
        ctx: &CallContext,
        claims: &VerifiedClaims,
        date_record: NaiveDate,
        value: i64,
    ) -> Result<RecordId> {
        const OP: &str = "services.record.create_for_caller";

        if value < 1 {
            let err = ServiceError::invalid_argument(format!("value must be at least 1, got {}", value));
            log_failure(OP, &err);
            return Err(err);
        }

        let account = self.accounts.account_from_claims(ctx, claims).await?;

        let record = NewRecord {
            account_id: account.id,
            value,
            date_record,
            date_created: Utc::now(),
        };

        let result = match ctx.run(OP, self.records.save_record(&record)).await {
            Ok(Ok(id)) => {
                info!(op = OP, account_id = %account.id, record_id = %id, "record created");
                Ok(id)
            }
            Ok(Err(e)) => Err(ServiceError::unexpected(OP, e)),
            Err(e) => Err(e),
        };
        result.inspect_err(|e| log_failure(OP, e))
    }

    /// Delete one of the caller's records.
    ///
    /// Missing and foreign records are indistinguishable to the caller: both
    /// succeed without touching anything.
    pub async fn delete_for_caller(
        &self,
        ctx: &CallContext,
        claims: &VerifiedClaims,
        record_id: RecordId,
    ) -> Result<()> {
        const OP: &str = "services.record.delete_for_caller";

        let account = self.accounts.account_from_claims(ctx, claims).await?;

        let result = match ctx.run(OP, self.records.delete_record(account.id, record_id)).await {
            Ok(Ok(0)) => {
                info!(op = OP, account_id = %account.id, record_id = %record_id, "no record deleted");
                Ok(())
            }
            Ok(Ok(_)) => {
                info!(op = OP, account_id = %account.id, record_id = %record_id, "record deleted");
                Ok(())
            }
            Ok(Err(e)) => Err(ServiceError::unexpected(OP, e)),
            Err(e) => Err(e),
        };
        result.inspect_err(|e| log_failure(OP, e))
    }
}
