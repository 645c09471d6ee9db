use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GroupRecord {
    pub cn: Option<String>,
    pub dn: String,
}

/// How a group member listing reacts to members that cannot be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MemberFetchMode {
    /// Skip unreadable or dangling member DNs.
    #[default]
    BestEffort,
    /// Fail the whole listing on the first unreadable member.
    Strict,
}
