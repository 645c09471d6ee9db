use utoipa::openapi::{OpenApi, Server};

use crate::config::AppConfig;
use crate::handlers;
use crate::models::{
    ActionResponse, ErrorResponse, GroupListResponse, GroupMembersResponse, GroupMembershipForm, GroupRecord,
    PasswordResetForm, UserRecord, UserSearchResponse, UserSummary,
};

#[derive(utoipa::OpenApi)]
#[openapi(
    info(
        title = "LDAP REST Gateway",
        description = "User lookup, account state and group membership of an Active Directory over HTTP/JSON"
    ),
    paths(
        handlers::users::search_user,
        handlers::users::unlock_user,
        handlers::users::disable_user,
        handlers::users::enable_user,
        handlers::users::reset_password,
        handlers::groups::list_groups,
        handlers::groups::group_members,
        handlers::groups::add_to_group,
        handlers::groups::remove_from_group,
    ),
    components(schemas(
        UserRecord,
        UserSummary,
        GroupRecord,
        ActionResponse,
        ErrorResponse,
        UserSearchResponse,
        GroupListResponse,
        GroupMembersResponse,
        GroupMembershipForm,
        PasswordResetForm,
    )),
    tags(
        (name = "user", description = "Account lookup and account state"),
        (name = "group", description = "Groups and group membership")
    )
)]
pub struct ApiDoc;

pub fn configure_openapi(mut openapi: OpenApi, config: &AppConfig) -> OpenApi {
    openapi.info.version = env!("CARGO_PKG_VERSION").to_string();

    // Document which directory the gateway fronts
    let directory = format!("Directory: {} (base DN {})", config.ldap.url(), config.ldap.base_dn);
    openapi.info.description = Some(match openapi.info.description.take() {
        Some(description) => format!("{}\n\n{}", description, directory),
        None => directory,
    });

    openapi.servers = Some(vec![Server::new(format!("http://{}", config.bind_address))]);

    openapi
}
