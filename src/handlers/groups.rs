use actix_web::{web, HttpResponse};
use tracing::error;

use crate::handlers::parse_body;
use crate::models::{
    non_empty, ActionResponse, GroupListResponse, GroupMembersResponse, GroupMembershipForm, MemberFetchMode,
    ServiceError,
};
use crate::services::DirectoryService;

#[derive(Clone, Copy, Debug)]
enum MembershipChange {
    Add,
    Remove,
}

impl MembershipChange {
    fn success_message(self) -> &'static str {
        match self {
            MembershipChange::Add => "Benutzer zur Gruppe hinzugefügt.",
            MembershipChange::Remove => "Benutzer aus Gruppe entfernt.",
        }
    }
}

async fn apply_membership_change(
    directory: &DirectoryService,
    sam_account_name: &str,
    group: &str,
    change: MembershipChange,
) -> Result<(), ServiceError> {
    let group_dn = directory
        .resolve_group_dn_by_cn(group)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Gruppe nicht gefunden".to_string()))?;

    match change {
        MembershipChange::Add => directory.add_user_to_group(sam_account_name, &group_dn).await,
        MembershipChange::Remove => directory.remove_user_from_group(sam_account_name, &group_dn).await,
    }
}

async fn change_membership(
    directory: &DirectoryService,
    sam_account_name: &str,
    body: &[u8],
    change: MembershipChange,
) -> ActionResponse {
    let form: GroupMembershipForm = parse_body(body);
    let Some(group) = non_empty(form.group.as_ref()) else {
        return ActionResponse::failed("Gruppenname fehlt");
    };

    let outcome = apply_membership_change(directory, sam_account_name, group, change).await;

    match outcome {
        Ok(()) => ActionResponse::ok(change.success_message()),
        Err(e) => {
            error!(account = %sam_account_name, group = %group, ?change, error = %e, "Group membership change failed");
            ActionResponse::failed(e.to_string())
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/group/list",
    tag = "group",
    responses(
        (status = 200, description = "All groups below the base DN", body = GroupListResponse)
    )
)]
pub async fn list_groups(directory: web::Data<DirectoryService>) -> HttpResponse {
    match directory.get_all_groups().await {
        Ok(groups) => HttpResponse::Ok().json(GroupListResponse { success: true, groups }),
        Err(e) => {
            error!(error = %e, "Failed to list groups");
            HttpResponse::Ok().json(ActionResponse::failed(e.to_string()))
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/group/{cn}/members",
    tag = "group",
    params(
        ("cn" = String, Path, description = "Common name of the group", example = "IT-Admins")
    ),
    responses(
        (status = 200, description = "Members of the group, or success=false", body = GroupMembersResponse)
    )
)]
pub async fn group_members(directory: web::Data<DirectoryService>, path: web::Path<String>) -> HttpResponse {
    let cn = path.into_inner();
    match directory.get_group_members_by_cn(&cn, MemberFetchMode::BestEffort).await {
        Ok(members) => HttpResponse::Ok().json(GroupMembersResponse { success: true, members }),
        Err(e) => HttpResponse::Ok().json(ActionResponse::failed(e.to_string())),
    }
}

#[utoipa::path(
    post,
    path = "/api/user/{samAccountName}/add-to-group",
    tag = "group",
    params(
        ("samAccountName" = String, Path, description = "sAMAccountName of the account")
    ),
    request_body = GroupMembershipForm,
    responses(
        (status = 200, description = "Outcome in the success field", body = ActionResponse)
    )
)]
pub async fn add_to_group(
    directory: web::Data<DirectoryService>,
    path: web::Path<String>,
    body: web::Bytes,
) -> HttpResponse {
    let sam_account_name = path.into_inner();
    HttpResponse::Ok().json(change_membership(&directory, &sam_account_name, &body, MembershipChange::Add).await)
}

#[utoipa::path(
    post,
    path = "/api/user/{samAccountName}/remove-from-group",
    tag = "group",
    params(
        ("samAccountName" = String, Path, description = "sAMAccountName of the account")
    ),
    request_body = GroupMembershipForm,
    responses(
        (status = 200, description = "Outcome in the success field", body = ActionResponse)
    )
)]
pub async fn remove_from_group(
    directory: web::Data<DirectoryService>,
    path: web::Path<String>,
    body: web::Bytes,
) -> HttpResponse {
    let sam_account_name = path.into_inner();
    HttpResponse::Ok().json(change_membership(&directory, &sam_account_name, &body, MembershipChange::Remove).await)
}
