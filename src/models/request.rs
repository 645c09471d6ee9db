use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserSearchQuery {
    /// sAMAccountName of the account; takes precedence over `email`
    #[serde(rename = "samAccountName")]
    pub sam_account_name: Option<String>,
    /// Mail address of the account
    pub email: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct GroupMembershipForm {
    /// Common name of the group
    #[schema(example = "IT-Admins")]
    pub group: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct PasswordResetForm {
    #[schema(example = "Geheimes123!")]
    pub password: Option<String>,
}

/// Treats an empty string the same as a missing field.
pub fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.is_empty())
}
