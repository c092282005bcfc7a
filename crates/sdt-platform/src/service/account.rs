//! Account Resolution Service
//!
//! Maps identity ids to accounts, resolves the caller's account from
//! verified claims, and provisions accounts on first contact.

use std::sync::Arc;

use tracing::{debug, info};

use super::log_failure;
use crate::context::CallContext;
use crate::domain::{Account, AccountId, IdentityId, VerifiedClaims, DEFAULT_DAILY_LIMIT, IDENTITY_CLAIM};
use crate::error::{Result, ServiceError};
use crate::repository::{AccountStore, StorageError};

#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn AccountStore>,
}

impl AccountService {
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self { store }
    }

    pub async fn account_by_id(&self, ctx: &CallContext, id: AccountId) -> Result<Account> {
        const OP: &str = "services.account.account_by_id";

        let result = match ctx.run(OP, self.store.account_by_id(id)).await {
            Ok(Ok(account)) => Ok(account),
            Ok(Err(StorageError::AccountNotFound)) => Err(ServiceError::not_found("Account", "id", id)),
            Ok(Err(e)) => Err(ServiceError::unexpected(OP, e)),
            Err(e) => Err(e),
        };
        result.inspect_err(|e| log_failure(OP, e))
    }

    pub async fn account_by_identity_id(
        &self,
        ctx: &CallContext,
        identity_id: IdentityId,
    ) -> Result<Account> {
        const OP: &str = "services.account.account_by_identity_id";

        let result = match ctx.run(OP, self.store.account_by_identity_id(identity_id)).await {
            Ok(Ok(account)) => Ok(account),
            Ok(Err(StorageError::AccountNotFound)) => {
                Err(ServiceError::not_found("Account", "identity_id", identity_id))
            }
            Ok(Err(e)) => Err(ServiceError::unexpected(OP, e)),
            Err(e) => Err(e),
        };
        result.inspect_err(|e| log_failure(OP, e))
    }

    /// Resolve the caller's account from the `uid` claim.
    ///
    /// A missing account is reported as NotFound; the caller decides whether
    /// that is fatal.
    pub async fn account_from_claims(
        &self,
        ctx: &CallContext,
        claims: &VerifiedClaims,
    ) -> Result<Account> {
        const OP: &str = "services.account.account_from_claims";

        let uid = claims
            .numeric(IDENTITY_CLAIM)
            .inspect_err(|e| log_failure(OP, e))?;

        self.account_by_identity_id(ctx, IdentityId(uid)).await
    }

    /// Create the account for `identity_id` unless one exists.
    ///
    /// A uniqueness rejection means a concurrent caller won the insert; the
    /// existing account is returned instead of an error.
    pub async fn provision(&self, ctx: &CallContext, identity_id: IdentityId) -> Result<AccountId> {
        const OP: &str = "services.account.provision";

        let result = match ctx
            .run(OP, self.store.save_account(identity_id, DEFAULT_DAILY_LIMIT))
            .await
        {
            Ok(Ok(id)) => {
                info!(op = OP, identity_id = %identity_id, account_id = %id, "account provisioned");
                Ok(id)
            }
            Ok(Err(StorageError::AccountExists)) => {
                debug!(op = OP, identity_id = %identity_id, "account already provisioned");
                match ctx.run(OP, self.store.account_by_identity_id(identity_id)).await {
                    Ok(Ok(existing)) => Ok(existing.id),
                    Ok(Err(e)) => Err(ServiceError::unexpected(OP, e)),
                    Err(e) => Err(e),
                }
            }
            Ok(Err(e)) => Err(ServiceError::unexpected(OP, e)),
            Err(e) => Err(e),
        };
        result.inspect_err(|e| log_failure(OP, e))
    }
}
