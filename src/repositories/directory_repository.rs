use async_trait::async_trait;

use crate::models::{DirectoryEntry, Modification, SearchScope, ServiceError};

/// The two directory primitives the service layer is built on.
#[async_trait]
pub trait DirectoryRepository: Send + Sync {
    /// Runs a search and returns every matching entry. An empty attribute
    /// list requests all user attributes.
    async fn search(
        &self,
        base: &str,
        scope: SearchScope,
        filter: &str,
        attributes: &[&str],
    ) -> Result<Vec<DirectoryEntry>, ServiceError>;

    /// Applies all modifications to `dn` in a single modify request.
    async fn modify_batch(&self, dn: &str, modifications: Vec<Modification>) -> Result<(), ServiceError>;

    /// Reads the entry at `dn`, or `None` if no such object exists.
    async fn read_entry(&self, dn: &str, attributes: &[&str]) -> Result<Option<DirectoryEntry>, ServiceError> {
        match self.search(dn, SearchScope::Base, "(objectClass=*)", attributes).await {
            Ok(entries) => Ok(entries.into_iter().next()),
            Err(ServiceError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

pub const RC_SIZE_LIMIT_EXCEEDED: u32 = 4;
pub const RC_NO_SUCH_OBJECT: u32 = 32;

/// Human readable name of an LDAP result code, in the wording of the
/// OpenLDAP client library.
pub fn result_code_description(rc: u32) -> &'static str {
    match rc {
        0 => "Success",
        1 => "Operations error",
        2 => "Protocol error",
        3 => "Time limit exceeded",
        4 => "Size limit exceeded",
        8 => "Strong(er) authentication required",
        10 => "Referral",
        11 => "Administrative limit exceeded",
        12 => "Critical extension is unavailable",
        13 => "Confidentiality required",
        16 => "No such attribute",
        17 => "Undefined attribute type",
        18 => "Inappropriate matching",
        19 => "Constraint violation",
        20 => "Type or value exists",
        21 => "Invalid syntax",
        32 => "No such object",
        34 => "Invalid DN syntax",
        49 => "Invalid credentials",
        50 => "Insufficient access",
        51 => "Server is busy",
        52 => "Server is unavailable",
        53 => "Server is unwilling to perform",
        64 => "Naming violation",
        65 => "Object class violation",
        66 => "Operation not allowed on non-leaf",
        67 => "Operation not allowed on RDN",
        68 => "Already exists",
        69 => "Cannot modify object class",
        80 => "Other (e.g., implementation specific) error",
        _ => "Unknown error",
    }
}

/// Renders a rejected operation the way it is reported to API clients:
/// `"<description> (rc=<code>)"`, followed by the server's diagnostic text.
pub fn describe_result(rc: u32, text: &str) -> String {
    let text = text.trim_end_matches('\0').trim();
    if text.is_empty() {
        format!("{} (rc={})", result_code_description(rc), rc)
    } else {
        format!("{} (rc={}): {}", result_code_description(rc), rc, text)
    }
}

/// Maps a non-zero result code to the matching error variant.
pub fn result_error(rc: u32, text: &str) -> ServiceError {
    let message = describe_result(rc, text);
    if rc == RC_NO_SUCH_OBJECT {
        ServiceError::NotFound(message)
    } else {
        ServiceError::DirectoryError(message)
    }
}

/// Checks the result of a completed search. `Ok(true)` means the server hit
/// its size limit and the entries received so far are all there is.
pub fn check_search_result(rc: u32, text: &str) -> Result<bool, ServiceError> {
    match rc {
        0 => Ok(false),
        RC_SIZE_LIMIT_EXCEEDED => Ok(true),
        _ => Err(result_error(rc, text)),
    }
}
