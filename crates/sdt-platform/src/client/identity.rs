//! Identity Service Client
//!
//! Exchanges credentials with the remote identity service over HTTP/JSON.
//! Remote failures are classified into the [`IdentityError`] classes; the
//! retry policy lives here and is opaque to the services.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::IdentityId;

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("invalid argument")]
    InvalidArgument,

    /// Unknown identity or rejected password
    #[error("user not found")]
    UserNotFound,

    #[error("user exists")]
    UserExists,

    #[error("unexpected identity service error: {0}")]
    Unexpected(String),

    #[error("identity transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Successful login exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub identity_id: IdentityId,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> Result<IssuedToken, IdentityError>;
    async fn register(&self, email: &str, password: &str) -> Result<IdentityId, IdentityError>;
}

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct IdentityClientConfig {
    /// Identity service base URL
    pub base_url: String,
    /// Application id presented on login
    pub app_id: i32,
    /// Per-attempt timeout
    pub timeout: Duration,
    /// Extra attempts after a retryable failure
    pub retries_count: u32,
    /// Base delay between attempts, multiplied by the attempt number
    pub retry_backoff: Duration,
}

impl Default for IdentityClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:44044".to_string(),
            app_id: 1,
            timeout: Duration::from_secs(5),
            retries_count: 3,
            retry_backoff: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
    app_id: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    token: String,
    user_id: i64,
}

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterResponse {
    user_id: i64,
}

/// Which remote call a status code came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Call {
    Login,
    Register,
}

fn classify_status(call: Call, status: StatusCode, body: &str) -> IdentityError {
    match (call, status.as_u16()) {
        (_, 400) | (_, 422) => IdentityError::InvalidArgument,
        (Call::Login, 401) | (Call::Login, 404) => IdentityError::UserNotFound,
        (Call::Register, 409) => IdentityError::UserExists,
        _ => IdentityError::Unexpected(format!("HTTP {}: {}", status, body)),
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 502 | 503 | 504)
}

fn is_retryable_transport(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect()
}

pub struct HttpIdentityClient {
    config: IdentityClientConfig,
    client: reqwest::Client,
}

impl HttpIdentityClient {
    pub fn new(config: IdentityClientConfig) -> Result<Self, IdentityError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.timeout)
            .timeout(config.timeout)
            .build()?;

        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// POST `body` to `path`, retrying transport failures and gateway errors.
    async fn post<B, R>(&self, call: Call, path: &str, body: &B) -> Result<R, IdentityError>
    where
        B: Serialize + ?Sized + Sync,
        R: for<'de> Deserialize<'de>,
    {
        let url = self.url(path);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            debug!("Identity call {:?} attempt {} -> {}", call, attempt, url);

            let retry_reason = match self.client.post(&url).json(body).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response
                            .json::<R>()
                            .await
                            .map_err(|e| IdentityError::Unexpected(format!("malformed response: {}", e)));
                    }

                    let body = response.text().await.unwrap_or_default();
                    if !is_retryable_status(status) || attempt > self.config.retries_count {
                        return Err(classify_status(call, status, &body));
                    }
                    format!("HTTP {}", status)
                }
                Err(e) => {
                    if !is_retryable_transport(&e) || attempt > self.config.retries_count {
                        return Err(e.into());
                    }
                    e.to_string()
                }
            };

            warn!(
                "Identity call {:?} failed ({}), retrying ({}/{})",
                call, retry_reason, attempt, self.config.retries_count
            );
            tokio::time::sleep(self.config.retry_backoff * attempt).await;
        }
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityClient {
    async fn login(&self, email: &str, password: &str) -> Result<IssuedToken, IdentityError> {
        let request = LoginRequest {
            email,
            password,
            app_id: self.config.app_id,
        };
        let response: LoginResponse = self.post(Call::Login, "login", &request).await?;

        Ok(IssuedToken {
            token: response.token,
            identity_id: IdentityId(response.user_id),
        })
    }

    async fn register(&self, email: &str, password: &str) -> Result<IdentityId, IdentityError> {
        let request = RegisterRequest { email, password };
        let response: RegisterResponse = self.post(Call::Register, "register", &request).await?;
        Ok(IdentityId(response.user_id))
    }
}
