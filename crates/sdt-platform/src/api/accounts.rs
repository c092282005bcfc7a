//! Accounts API
//!
//! - POST /accounts/login - Exchange credentials for a token
//! - POST /accounts/registration - Create identity and account
//! - GET /accounts/me - Caller's account

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::common::{ApiError, ApiJson, HandlerError, Validator};
use crate::api::middleware::{Authenticated, TokenVerifier};
use crate::context::CallContext;
use crate::domain::Account;
use crate::error::ServiceError;
use crate::service::{AccountService, AuthService};

/// Credentials for login and registration
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsRequest {
    /// Email address
    #[serde(default)]
    pub email: String,

    /// Password
    #[serde(default)]
    pub password: String,
}

impl CredentialsRequest {
    fn validate(&self) -> Result<(), HandlerError> {
        Validator::new()
            .required("email", &self.email)
            .email("email", &self.email)
            .required("password", &self.password)
            .finish()
    }
}

/// Login response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    /// Bearer token issued by the identity service
    pub token: String,
}

/// Accounts API state
#[derive(Clone)]
pub struct AccountsState {
    pub auth_service: Arc<AuthService>,
    pub account_service: Arc<AccountService>,
    pub verifier: Arc<TokenVerifier>,
    pub request_timeout: Duration,
}

impl FromRef<AccountsState> for Arc<TokenVerifier> {
    fn from_ref(state: &AccountsState) -> Self {
        state.verifier.clone()
    }
}

/// Login with email and password
///
/// Provisions the caller's account on first successful login.
#[utoipa::path(
    post,
    path = "/accounts/login",
    tag = "accounts",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 401, description = "Invalid credentials", body = ApiError)
    )
)]
pub async fn login(
    State(state): State<AccountsState>,
    ApiJson(req): ApiJson<CredentialsRequest>,
) -> Result<Json<LoginResponse>, HandlerError> {
    req.validate()?;

    let ctx = CallContext::with_timeout(state.request_timeout);
    let token = state
        .auth_service
        .login(&ctx, &req.email, &req.password)
        .await
        .map_err(|e| match e {
            // Rejected input on login is reported as bad credentials
            ServiceError::InvalidArgument { .. } => ServiceError::IdentityNotFound,
            other => other,
        })?;

    Ok(Json(LoginResponse { token }))
}

/// Register a new user
#[utoipa::path(
    post,
    path = "/accounts/registration",
    tag = "accounts",
    request_body = CredentialsRequest,
    responses(
        (status = 201, description = "Registered"),
        (status = 400, description = "Validation error or user already exists", body = ApiError)
    )
)]
pub async fn registration(
    State(state): State<AccountsState>,
    ApiJson(req): ApiJson<CredentialsRequest>,
) -> Result<StatusCode, HandlerError> {
    req.validate()?;

    let ctx = CallContext::with_timeout(state.request_timeout);
    state
        .auth_service
        .register(&ctx, &req.email, &req.password)
        .await?;

    Ok(StatusCode::CREATED)
}

/// Get the caller's account
#[utoipa::path(
    get,
    path = "/accounts/me",
    tag = "accounts",
    responses(
        (status = 200, description = "Current account", body = Account),
        (status = 401, description = "Not authenticated", body = ApiError),
        (status = 404, description = "No account for this identity", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn me(
    State(state): State<AccountsState>,
    Authenticated(claims): Authenticated,
) -> Result<Json<Account>, HandlerError> {
    let ctx = CallContext::with_timeout(state.request_timeout);
    let account = state.account_service.account_from_claims(&ctx, &claims).await?;
    Ok(Json(account))
}

/// Create the accounts router
pub fn accounts_router(state: AccountsState) -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/registration", post(registration))
        .route("/me", get(me))
        .with_state(state)
}
