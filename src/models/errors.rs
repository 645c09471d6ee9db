use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

/// Errors raised by the directory layer and the handlers.
///
/// `Display` is the bare message so handlers can embed it verbatim in the
/// `error` field of a response envelope.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    ValidationError(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    DirectoryError(String),
}

impl ServiceError {
    /// Prefix the message with operation context, keeping the variant.
    pub fn context(self, prefix: &str) -> Self {
        match self {
            ServiceError::ValidationError(msg) => ServiceError::ValidationError(format!("{}{}", prefix, msg)),
            ServiceError::NotFound(msg) => ServiceError::NotFound(format!("{}{}", prefix, msg)),
            ServiceError::DirectoryError(msg) => ServiceError::DirectoryError(format!("{}{}", prefix, msg)),
        }
    }
}

impl ResponseError for ServiceError {
    fn error_response(&self) -> HttpResponse {
        match self {
            ServiceError::ValidationError(msg) => HttpResponse::BadRequest().json(json!({
                "error": msg
            })),
            ServiceError::NotFound(msg) => HttpResponse::Ok().json(json!({
                "success": false,
                "error": msg
            })),
            ServiceError::DirectoryError(msg) => {
                tracing::error!("Directory error: {}", msg);
                HttpResponse::InternalServerError().json(json!({
                    "error": format!("LDAP-Fehler: {}", msg)
                }))
            }
        }
    }
}

impl From<ldap3::LdapError> for ServiceError {
    fn from(err: ldap3::LdapError) -> Self {
        ServiceError::DirectoryError(err.to_string())
    }
}
