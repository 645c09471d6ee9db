use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Read-only view of a directory account, derived from its raw attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserRecord {
    pub dn: String,
    pub cn: Option<String>,
    pub mail: Option<String>,
    #[serde(rename = "sAMAccountName")]
    pub sam_account_name: Option<String>,
    /// Common names of the groups the account belongs to
    #[serde(rename = "memberOf")]
    pub member_of: Vec<String>,
    #[serde(rename = "isLocked")]
    pub is_locked: bool,
    #[serde(rename = "isDisabled")]
    pub is_disabled: bool,
    /// Local date-time of the last replicated logon, `YYYY-MM-DD HH:MM:SS`
    #[serde(rename = "lastLogon")]
    #[schema(example = "2019-04-17 18:40:00")]
    pub last_logon: Option<String>,
    pub position: Option<String>,
    pub department: Option<String>,
    pub description: Option<String>,
}

/// Projection of a group member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserSummary {
    pub dn: String,
    pub cn: Option<String>,
    pub mail: Option<String>,
    #[serde(rename = "sAMAccountName")]
    pub sam_account_name: Option<String>,
}
