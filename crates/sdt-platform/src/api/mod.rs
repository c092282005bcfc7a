//! API Layer
//!
//! REST endpoints for accounts and intake records.

pub mod accounts;
pub mod common;
pub mod health;
pub mod middleware;
pub mod openapi;
pub mod records;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use accounts::{accounts_router, AccountsState};
pub use common::{ApiError, CreatedResponse, FieldError, HandlerError};
pub use health::health_router;
pub use middleware::{Authenticated, TokenVerifier};
pub use openapi::TrackerApiDoc;
pub use records::{records_router, RecordsState};

use crate::service::{AccountService, AuthService, RecordService};

/// Shared services behind every router
#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<AuthService>,
    pub account_service: Arc<AccountService>,
    pub record_service: Arc<RecordService>,
    pub verifier: Arc<TokenVerifier>,
    /// Deadline applied to each request's service calls
    pub request_timeout: Duration,
}

/// Full application router, documentation included.
pub fn create_router(state: AppState) -> Router {
    let accounts_state = AccountsState {
        auth_service: state.auth_service.clone(),
        account_service: state.account_service.clone(),
        verifier: state.verifier.clone(),
        request_timeout: state.request_timeout,
    };
    let records_state = RecordsState {
        record_service: state.record_service.clone(),
        verifier: state.verifier.clone(),
        request_timeout: state.request_timeout,
    };

    Router::new()
        .nest("/accounts", accounts_router(accounts_state))
        .nest("/records", records_router(records_state))
        .merge(health_router())
        .merge(SwaggerUi::new("/swagger-ui").url("/q/openapi", TrackerApiDoc::openapi()))
}
