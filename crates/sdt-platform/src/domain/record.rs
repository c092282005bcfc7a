//! Intake Record Entity

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::account::AccountId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct RecordId(pub i64);

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single dated intake entry, owned by exactly one account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    #[schema(value_type = i64)]
    pub id: RecordId,

    #[schema(value_type = i64)]
    pub account_id: AccountId,

    /// Intake amount, always >= 1
    pub value: i64,

    /// Calendar day the entry applies to
    pub date_record: NaiveDate,

    /// Server time at which the entry was written
    pub date_created: DateTime<Utc>,
}

/// Values for a record that has not been stored yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    pub account_id: AccountId,
    pub value: i64,
    pub date_record: NaiveDate,
    pub date_created: DateTime<Utc>,
}
