use serde::Serialize;
use utoipa::ToSchema;

use crate::models::{GroupRecord, UserRecord, UserSummary};

/// Envelope for mutating endpoints: `message` on success, `error` otherwise.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActionResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserSearchResponse {
    pub success: bool,
    pub data: UserRecord,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GroupListResponse {
    pub success: bool,
    pub groups: Vec<GroupRecord>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GroupMembersResponse {
    pub success: bool,
    pub members: Vec<UserSummary>,
}

/// Body of the non-200 responses of `/api/user/search`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}
