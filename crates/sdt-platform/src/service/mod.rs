//! Service Layer
//!
//! Account resolution, auth orchestration and ownership-scoped record
//! operations. Services are stateless and built once with their
//! collaborators injected.

pub mod account;
pub mod auth;
pub mod record;

pub use account::AccountService;
pub use auth::AuthService;
pub use record::RecordService;

use tracing::{error, info};

use crate::error::ServiceError;

/// Unexpected failures are errors; everything else is an expected outcome.
pub(crate) fn log_failure(op: &'static str, err: &ServiceError) {
    if err.is_unexpected() {
        error!(op, error = %err, "operation failed");
    } else {
        info!(op, error = %err, "operation rejected");
    }
}

/// Fold a collaborator failure into Unexpected, keeping cancellation as is.
pub(crate) fn fold_unexpected(op: &'static str, err: ServiceError) -> ServiceError {
    match err {
        ServiceError::Cancelled { .. } | ServiceError::Unexpected { .. } => err,
        other => ServiceError::unexpected(op, other),
    }
}
