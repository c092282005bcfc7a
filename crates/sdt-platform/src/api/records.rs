//! Records API
//!
//! Intake records of the authenticated caller.
//! - GET /records?date=YYYY-MM-DD - List one day's records
//! - POST /records - Create a record
//! - DELETE /records/{recordId} - Delete a record

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{FromRef, Path, Query, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::api::common::{parse_day, ApiError, ApiJson, CreatedResponse, HandlerError, Validator};
use crate::api::middleware::{Authenticated, TokenVerifier};
use crate::context::CallContext;
use crate::domain::{Record, RecordId};
use crate::service::RecordService;

/// Query parameters for the records list
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RecordsQuery {
    /// Calendar day (YYYY-MM-DD), today (UTC) when omitted
    pub date: Option<String>,
}

/// Create record request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateRecordRequest {
    /// Intake amount, at least 1
    pub value: Option<i64>,

    /// Calendar day as YYYY-MM-DD or an RFC 3339 timestamp
    pub date_record: Option<String>,
}

impl CreateRecordRequest {
    fn validate(&self) -> Result<(i64, NaiveDate), HandlerError> {
        let date = self.date_record.as_deref().and_then(parse_day);

        Validator::new()
            .check(self.value.is_some(), "value", "is required")
            .check(self.value.map_or(true, |v| v >= 1), "value", "must be at least 1")
            .check(self.date_record.is_some(), "dateRecord", "is required")
            .check(
                self.date_record.is_none() || date.is_some(),
                "dateRecord",
                "must be a date (YYYY-MM-DD) or RFC 3339 timestamp",
            )
            .finish()?;

        match (self.value, date) {
            (Some(value), Some(date)) => Ok((value, date)),
            _ => Err(HandlerError::Malformed("invalid request".to_string())),
        }
    }
}

/// Records API state
#[derive(Clone)]
pub struct RecordsState {
    pub record_service: Arc<RecordService>,
    pub verifier: Arc<TokenVerifier>,
    pub request_timeout: Duration,
}

impl FromRef<RecordsState> for Arc<TokenVerifier> {
    fn from_ref(state: &RecordsState) -> Self {
        state.verifier.clone()
    }
}

/// List the caller's records for one day
#[utoipa::path(
    get,
    path = "/records",
    tag = "records",
    params(RecordsQuery),
    responses(
        (status = 200, description = "Records, newest first", body = Vec<Record>),
        (status = 400, description = "Invalid date", body = ApiError),
        (status = 401, description = "Not authenticated", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_records(
    State(state): State<RecordsState>,
    Authenticated(claims): Authenticated,
    Query(query): Query<RecordsQuery>,
) -> Result<Json<Vec<Record>>, HandlerError> {
    let date = match query.date.as_deref().filter(|d| !d.is_empty()) {
        None => Utc::now().date_naive(),
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
            HandlerError::Malformed("invalid date format (YYYY-MM-DD format expected)".to_string())
        })?,
    };

    let ctx = CallContext::with_timeout(state.request_timeout);
    let records = state.record_service.list_for_caller(&ctx, &claims, date).await?;
    Ok(Json(records))
}

/// Create a record for the caller
#[utoipa::path(
    post,
    path = "/records",
    tag = "records",
    request_body = CreateRecordRequest,
    responses(
        (status = 201, description = "Record created", body = CreatedResponse),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 401, description = "Not authenticated", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_record(
    State(state): State<RecordsState>,
    Authenticated(claims): Authenticated,
    ApiJson(req): ApiJson<CreateRecordRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>), HandlerError> {
    let (value, date_record) = req.validate()?;

    let ctx = CallContext::with_timeout(state.request_timeout);
    let id = state
        .record_service
        .create_for_caller(&ctx, &claims, date_record, value)
        .await?;

    Ok((StatusCode::CREATED, Json(CreatedResponse::new(id.0))))
}

/// Delete one of the caller's records
///
/// Succeeds whether or not a matching record existed.
#[utoipa::path(
    delete,
    path = "/records/{recordId}",
    tag = "records",
    params(("recordId" = i64, Path, description = "Record ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 400, description = "Invalid record id", body = ApiError),
        (status = 401, description = "Not authenticated", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_record(
    State(state): State<RecordsState>,
    Authenticated(claims): Authenticated,
    Path(record_id): Path<String>,
) -> Result<StatusCode, HandlerError> {
    let record_id = record_id
        .parse::<i64>()
        .ok()
        .filter(|id| *id >= 1)
        .map(RecordId)
        .ok_or_else(|| HandlerError::Malformed("invalid record id".to_string()))?;

    let ctx = CallContext::with_timeout(state.request_timeout);
    state
        .record_service
        .delete_for_caller(&ctx, &claims, record_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Create the records router
pub fn records_router(state: RecordsState) -> Router {
    Router::new()
        .route("/", get(list_records).post(create_record))
        .route("/:record_id", delete(delete_record))
        .with_state(state)
}
