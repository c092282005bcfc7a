//! API Middleware
//!
//! Bearer credential verification and the `Authenticated` extractor.

use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};
use tracing::debug;

use crate::api::common::ApiError;
use crate::domain::VerifiedClaims;
use crate::error::ServiceError;

/// Validates HS256 tokens signed with the shared application secret.
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Verify signature and expiry, returning the payload as claims.
    pub fn verify(&self, token: &str) -> Result<VerifiedClaims, ServiceError> {
        decode::<Map<String, Value>>(token, &self.key, &self.validation)
            .map(|data| VerifiedClaims::from(data.claims))
            .map_err(|e| ServiceError::invalid_credential(e.to_string()))
    }
}

/// Extract the token from a `Bearer <token>` header value.
pub fn extract_bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.split_once(' ')?;
    let token = token.trim();
    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}

fn unauthorized(message: &str) -> Response {
    let error = ApiError {
        error: "UNAUTHORIZED".to_string(),
        message: message.to_string(),
        details: None,
    };
    (StatusCode::UNAUTHORIZED, Json(error)).into_response()
}

/// Extractor for authenticated requests.
///
/// Rejects with 401 before the handler runs when the bearer token is
/// missing, malformed, wrongly signed or expired.
pub struct Authenticated(pub VerifiedClaims);

#[axum::async_trait]
impl<S> FromRequestParts<S> for Authenticated
where
    Arc<TokenVerifier>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| unauthorized("Missing Authorization header"))?;

        let token = extract_bearer_token(auth_header)
            .ok_or_else(|| unauthorized("Invalid Authorization header format"))?;

        let verifier = Arc::<TokenVerifier>::from_ref(state);
        let claims = verifier.verify(token).map_err(|e| {
            debug!("Rejected bearer token: {}", e);
            unauthorized("Invalid or expired token")
        })?;

        Ok(Authenticated(claims))
    }
}
