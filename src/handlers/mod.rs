pub mod groups;
pub mod users;

use actix_web::web;
use serde::de::DeserializeOwned;

// Re-export all handler functions for easy importing
pub use groups::*;
pub use users::*;

/// Decodes a JSON request body. A missing or malformed body yields the
/// default form, so field validation reports the problem instead of the
/// extractor rejecting the request.
pub(crate) fn parse_body<T: DeserializeOwned + Default>(body: &[u8]) -> T {
    serde_json::from_slice(body).unwrap_or_default()
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/group/list", web::get().to(list_groups))
        .route("/api/group/{cn}/members", web::get().to(group_members))
        .route("/api/user/search", web::get().to(search_user))
        .route("/api/user/{samAccountName}/add-to-group", web::post().to(add_to_group))
        .route("/api/user/{samAccountName}/remove-from-group", web::post().to(remove_from_group))
        .route("/api/user/{samAccountName}/unlock", web::post().to(unlock_user))
        .route("/api/user/{samAccountName}/disable", web::post().to(disable_user))
        .route("/api/user/{samAccountName}/enable", web::post().to(enable_user))
        .route("/api/user/{samAccountName}/password", web::post().to(reset_password));
}
