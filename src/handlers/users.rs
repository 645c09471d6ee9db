use actix_web::{web, HttpResponse};
use tracing::error;

use crate::handlers::parse_body;
use crate::models::{
    non_empty, ActionResponse, PasswordResetForm, ServiceError, UserSearchQuery,
    UserSearchResponse,
};
use crate::services::DirectoryService;

/// Account operations that act on the DN resolved from a sAMAccountName.
#[derive(Clone, Copy)]
enum AccountAction<'a> {
    Unlock,
    Disable,
    Enable,
    ResetPassword(&'a str),
}

impl AccountAction<'_> {
    fn success_message(self) -> &'static str {
        match self {
            AccountAction::Unlock => "Benutzer wurde entsperrt.",
            AccountAction::Disable => "Benutzer wurde deaktiviert.",
            AccountAction::Enable => "Benutzer wurde aktiviert.",
            AccountAction::ResetPassword(_) => "Passwort wurde zurückgesetzt.",
        }
    }

    fn failure_prefix(self) -> &'static str {
        match self {
            AccountAction::Unlock => "Fehler beim Entsperren: ",
            AccountAction::Disable => "Fehler beim Deaktivieren: ",
            AccountAction::Enable => "Fehler beim Aktivieren: ",
            AccountAction::ResetPassword(_) => "Fehler beim Zurücksetzen: ",
        }
    }

    async fn apply(self, directory: &DirectoryService, dn: &str) -> Result<(), ServiceError> {
        match self {
            AccountAction::Unlock => directory.unlock_user(dn).await,
            AccountAction::Disable => directory.disable_user(dn).await,
            AccountAction::Enable => directory.enable_user(dn).await,
            AccountAction::ResetPassword(password) => directory.reset_password(dn, password).await,
        }
    }
}

async fn run_account_action(
    directory: &DirectoryService,
    sam_account_name: &str,
    action: AccountAction<'_>,
) -> ActionResponse {
    let outcome = match directory.get_dn_by_sam_account_name(sam_account_name).await {
        Ok(Some(dn)) => action.apply(directory, &dn).await,
        Ok(None) => return ActionResponse::failed("Benutzer nicht gefunden"),
        Err(e) => Err(e),
    };

    match outcome {
        Ok(()) => ActionResponse::ok(action.success_message()),
        Err(e) => {
            error!(account = %sam_account_name, error = %e, "Account operation failed");
            ActionResponse::failed(format!("{}{}", action.failure_prefix(), e))
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/user/search",
    tag = "user",
    params(UserSearchQuery),
    responses(
        (status = 200, description = "User found, or success=false if no account matches", body = UserSearchResponse),
        (status = 400, description = "Neither samAccountName nor email given", body = crate::models::ErrorResponse),
        (status = 500, description = "Directory error", body = crate::models::ErrorResponse)
    )
)]
pub async fn search_user(
    directory: web::Data<DirectoryService>,
    query: web::Query<UserSearchQuery>,
) -> Result<HttpResponse, ServiceError> {
    let user = directory
        .find_user(
            non_empty(query.sam_account_name.as_ref()),
            non_empty(query.email.as_ref()),
        )
        .await
        .map_err(|e| match e {
            ServiceError::ValidationError(_) => e,
            other => ServiceError::DirectoryError(other.to_string()),
        })?;

    match user {
        Some(user) => Ok(HttpResponse::Ok().json(UserSearchResponse {
            success: true,
            data: user,
        })),
        None => Ok(HttpResponse::Ok().json(ActionResponse::failed("Benutzer nicht gefunden"))),
    }
}

#[utoipa::path(
    post,
    path = "/api/user/{samAccountName}/unlock",
    tag = "user",
    params(
        ("samAccountName" = String, Path, description = "sAMAccountName of the account")
    ),
    responses(
        (status = 200, description = "Outcome in the success field", body = ActionResponse)
    )
)]
pub async fn unlock_user(directory: web::Data<DirectoryService>, path: web::Path<String>) -> HttpResponse {
    let sam_account_name = path.into_inner();
    HttpResponse::Ok().json(run_account_action(&directory, &sam_account_name, AccountAction::Unlock).await)
}

#[utoipa::path(
    post,
    path = "/api/user/{samAccountName}/disable",
    tag = "user",
    params(
        ("samAccountName" = String, Path, description = "sAMAccountName of the account", example = "jdoe")
    ),
    responses(
        (status = 200, description = "Outcome in the success field", body = ActionResponse)
    )
)]
pub async fn disable_user(directory: web::Data<DirectoryService>, path: web::Path<String>) -> HttpResponse {
    let sam_account_name = path.into_inner();
    HttpResponse::Ok().json(run_account_action(&directory, &sam_account_name, AccountAction::Disable).await)
}

#[utoipa::path(
    post,
    path = "/api/user/{samAccountName}/enable",
    tag = "user",
    params(
        ("samAccountName" = String, Path, description = "sAMAccountName of the account", example = "jdoe")
    ),
    responses(
        (status = 200, description = "Outcome in the success field", body = ActionResponse)
    )
)]
pub async fn enable_user(directory: web::Data<DirectoryService>, path: web::Path<String>) -> HttpResponse {
    let sam_account_name = path.into_inner();
    HttpResponse::Ok().json(run_account_action(&directory, &sam_account_name, AccountAction::Enable).await)
}

#[utoipa::path(
    post,
    path = "/api/user/{samAccountName}/password",
    tag = "user",
    params(
        ("samAccountName" = String, Path, description = "sAMAccountName of the account")
    ),
    request_body = PasswordResetForm,
    responses(
        (status = 200, description = "Outcome in the success field", body = ActionResponse)
    )
)]
pub async fn reset_password(
    directory: web::Data<DirectoryService>,
    path: web::Path<String>,
    body: web::Bytes,
) -> HttpResponse {
    let sam_account_name = path.into_inner();
    let form: PasswordResetForm = parse_body(&body);

    let Some(password) = non_empty(form.password.as_ref()) else {
        return HttpResponse::Ok().json(ActionResponse::failed("Passwort fehlt im Request-Body"));
    };

    HttpResponse::Ok().json(
        run_account_action(&directory, &sam_account_name, AccountAction::ResetPassword(password)).await,
    )
}
