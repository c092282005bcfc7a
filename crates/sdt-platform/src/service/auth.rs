//! Auth Orchestration Service
//!
//! Login and registration against the identity service, followed by
//! account provisioning. Neither flow is transactional: a provisioning
//! failure does not undo the remote login or registration.

use std::sync::Arc;

use tracing::info;

use super::{fold_unexpected, log_failure, AccountService};
use crate::client::{IdentityError, IdentityProvider};
use crate::context::CallContext;
use crate::error::{Result, ServiceError};

#[derive(Clone)]
pub struct AuthService {
    identity: Arc<dyn IdentityProvider>,
    accounts: Arc<AccountService>,
}

fn classify_identity(op: &'static str, err: IdentityError) -> ServiceError {
    match err {
        IdentityError::InvalidArgument => ServiceError::invalid_argument("invalid credentials"),
        IdentityError::UserNotFound => ServiceError::IdentityNotFound,
        IdentityError::UserExists => ServiceError::already_exists("Identity"),
        other @ (IdentityError::Unexpected(_) | IdentityError::Transport(_)) => {
            ServiceError::unexpected(op, other)
        }
    }
}

impl AuthService {
    pub fn new(identity: Arc<dyn IdentityProvider>, accounts: Arc<AccountService>) -> Self {
        Self { identity, accounts }
    }

    /// Exchange credentials for a token, provisioning the account on first login.
    pub async fn login(&self, ctx: &CallContext, email: &str, password: &str) -> Result<String> {
        const OP: &str = "services.auth.login";

        info!(op = OP, email, "attempting to login user");
        self.login_inner(ctx, email, password)
            .await
            .inspect_err(|e| log_failure(OP, e))
    }

    async fn login_inner(&self, ctx: &CallContext, email: &str, password: &str) -> Result<String> {
        const OP: &str = "services.auth.login";

        let issued = ctx
            .run(OP, self.identity.login(email, password))
            .await?
            .map_err(|e| classify_identity(OP, e))?;

        match self.accounts.account_by_identity_id(ctx, issued.identity_id).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                info!(op = OP, identity_id = %issued.identity_id, "first login, provisioning account");
                self.accounts
                    .provision(ctx, issued.identity_id)
                    .await
                    .map_err(|e| fold_unexpected(OP, e))?;
            }
            Err(e) => return Err(fold_unexpected(OP, e)),
        }

        info!(op = OP, identity_id = %issued.identity_id, "user logged in successfully");
        Ok(issued.token)
    }

    /// Create the remote identity and its account.
    pub async fn register(&self, ctx: &CallContext, email: &str, password: &str) -> Result<()> {
        const OP: &str = "services.auth.register";

        info!(op = OP, email, "registering user");
        self.register_inner(ctx, email, password)
            .await
            .inspect_err(|e| log_failure(OP, e))
    }

    async fn register_inner(&self, ctx: &CallContext, email: &str, password: &str) -> Result<()> {
        const OP: &str = "services.auth.register";

        let identity_id = ctx
            .run(OP, self.identity.register(email, password))
            .await?
            .map_err(|e| classify_identity(OP, e))?;

        let account_id = self
            .accounts
            .provision(ctx, identity_id)
            .await
            .map_err(|e| fold_unexpected(OP, e))?;

        info!(op = OP, identity_id = %identity_id, account_id = %account_id, "user registered");
        Ok(())
    }
}
