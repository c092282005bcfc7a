//! Common API types and utilities

use std::sync::OnceLock;

use axum::{
    async_trait,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::ServiceError;

/// Standard API error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Created response with ID
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreatedResponse {
    pub id: i64,
}

impl CreatedResponse {
    pub fn new(id: i64) -> Self {
        Self { id }
    }
}

/// One rejected request field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Failure produced by a handler before or after the service call
#[derive(Debug)]
pub enum HandlerError {
    /// Request fields failed validation
    Validation(Vec<FieldError>),
    /// Body or parameters could not be decoded at all
    Malformed(String),
    Service(ServiceError),
}

impl From<ServiceError> for HandlerError {
    fn from(err: ServiceError) -> Self {
        HandlerError::Service(err)
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        let body = match self {
            HandlerError::Service(err) => return err.into_response(),
            HandlerError::Validation(fields) => ApiError {
                error: "VALIDATION_ERROR".to_string(),
                message: "request validation failed".to_string(),
                details: serde_json::to_value(fields).ok(),
            },
            HandlerError::Malformed(message) => ApiError {
                error: "BAD_REQUEST".to_string(),
                message,
                details: None,
            },
        };
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

/// Collects field errors for one request.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, ok: bool, field: &str, message: &str) -> &mut Self {
        if !ok {
            self.errors.push(FieldError {
                field: field.to_string(),
                message: message.to_string(),
            });
        }
        self
    }

    /// Empty values are left to [`Validator::required`].
    pub fn email(&mut self, field: &str, value: &str) -> &mut Self {
        self.check(value.is_empty() || is_valid_email(value), field, "must be a valid email address")
    }

    pub fn required(&mut self, field: &str, value: &str) -> &mut Self {
        self.check(!value.trim().is_empty(), field, "must not be empty")
    }

    pub fn finish(&mut self) -> Result<(), HandlerError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(HandlerError::Validation(std::mem::take(&mut self.errors)))
        }
    }
}

const EMAIL_PATTERN: &str = r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$";

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(EMAIL_PATTERN).expect("EMAIL_PATTERN is a valid regex"))
}

pub fn is_valid_email(value: &str) -> bool {
    email_regex().is_match(value)
}

/// Calendar day from `YYYY-MM-DD`, or the UTC day of an RFC 3339 timestamp.
pub fn parse_day(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.with_timezone(&Utc).date_naive())
        })
}

/// JSON body extractor whose rejections use the [`ApiError`] envelope.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = HandlerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(HandlerError::Malformed(rejection.body_text())),
        }
    }
}
