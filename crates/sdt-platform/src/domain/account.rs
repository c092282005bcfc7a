//! Account Entity

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Daily calorie limit assigned to freshly provisioned accounts
pub const DEFAULT_DAILY_LIMIT: i64 = 2000;

/// Storage-assigned account identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct AccountId(pub i64);

/// Identifier issued by the external identity service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct IdentityId(pub i64);

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for IdentityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-user calorie account, keyed 1:1 to an identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[schema(value_type = i64)]
    pub id: AccountId,

    #[schema(value_type = i64)]
    pub identity_id: IdentityId,

    /// Daily intake limit (immutable once provisioned)
    pub daily_limit: i64,
}
