//! Service Error Types
//!
//! Every failure leaving the service layer is classified into one of these
//! kinds. Identity-service and storage failures are tagged with the name of
//! the operation that hit them before being reclassified.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::api::common::ApiError;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Invalid credential: {message}")]
    InvalidCredential { message: String },

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Entity not found: {entity_type} with {key}={value}")]
    NotFound {
        entity_type: &'static str,
        key: &'static str,
        value: String,
    },

    #[error("Already exists: {entity_type}")]
    AlreadyExists { entity_type: &'static str },

    #[error("Identity not found or credentials rejected")]
    IdentityNotFound,

    #[error("{op}: cancelled before completion")]
    Cancelled { op: &'static str },

    #[error("{op}: {source}")]
    Unexpected {
        op: &'static str,
        #[source]
        source: BoxError,
    },
}

impl ServiceError {
    pub fn invalid_credential(message: impl Into<String>) -> Self {
        Self::InvalidCredential { message: message.into() }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument { message: message.into() }
    }

    pub fn not_found(entity_type: &'static str, key: &'static str, value: impl ToString) -> Self {
        Self::NotFound {
            entity_type,
            key,
            value: value.to_string(),
        }
    }

    pub fn already_exists(entity_type: &'static str) -> Self {
        Self::AlreadyExists { entity_type }
    }

    pub fn unexpected(op: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Unexpected {
            op,
            source: source.into(),
        }
    }

    /// Only unexpected failures are server faults; everything else is an
    /// expected, caller-attributable outcome.
    pub fn is_unexpected(&self) -> bool {
        matches!(self, Self::Unexpected { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidCredential { .. } | Self::IdentityNotFound => StatusCode::UNAUTHORIZED,
            Self::InvalidArgument { .. } => StatusCode::BAD_REQUEST,
            Self::AlreadyExists { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Cancelled { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Unexpected { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidCredential { .. } | Self::IdentityNotFound => "UNAUTHORIZED",
            Self::InvalidArgument { .. } => "INVALID_ARGUMENT",
            Self::AlreadyExists { .. } => "ALREADY_EXISTS",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Cancelled { .. } => "UNAVAILABLE",
            Self::Unexpected { .. } => "INTERNAL_ERROR",
        }
    }

    /// Message safe to show to the caller. Internal details stay in the logs.
    fn public_message(&self) -> String {
        match self {
            Self::InvalidCredential { .. } | Self::IdentityNotFound => "invalid credentials".to_string(),
            Self::InvalidArgument { message } => message.clone(),
            Self::AlreadyExists { entity_type } => format!("{} already exists", entity_type),
            Self::NotFound { entity_type, .. } => format!("{} not found", entity_type),
            Self::Cancelled { .. } => "request cancelled".to_string(),
            Self::Unexpected { .. } => "unexpected error".to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let body = ApiError {
            error: self.error_code().to_string(),
            message: self.public_message(),
            details: None,
        };
        (self.status_code(), Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;
