use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::models::{DirectoryEntry, Modification, SearchScope, ServiceError, UserRecord};
use crate::repositories::DirectoryRepository;
use crate::utils::ad;
use crate::utils::filter::{equality_filter, FilterEscaping};

/// Attributes needed to build a [`UserRecord`].
const USER_ATTRIBUTES: &[&str] = &[
    "cn",
    "mail",
    "sAMAccountName",
    "memberOf",
    "lockoutTime",
    "userAccountControl",
    "lastLogonTimestamp",
    "title",
    "department",
    "description",
];

#[derive(Debug, Clone)]
pub struct DirectoryOptions {
    pub base_dn: String,
    pub filter_escaping: FilterEscaping,
}

impl DirectoryOptions {
    pub fn new(base_dn: impl Into<String>) -> Self {
        Self {
            base_dn: base_dn.into(),
            filter_escaping: FilterEscaping::default(),
        }
    }

    pub fn with_filter_escaping(mut self, filter_escaping: FilterEscaping) -> Self {
        self.filter_escaping = filter_escaping;
        self
    }
}

/// Translates account and group operations into directory searches and
/// modify-batch requests.
pub struct DirectoryService {
    pub(super) repository: Arc<dyn DirectoryRepository>,
    pub(super) options: DirectoryOptions,
}

impl DirectoryService {
    pub fn new(repository: Arc<dyn DirectoryRepository>, options: DirectoryOptions) -> Self {
        Self { repository, options }
    }

    pub(super) fn filter(&self, attribute: &str, value: &str) -> String {
        equality_filter(attribute, value, self.options.filter_escaping)
    }

    /// First entry below the base DN matching `(attribute=value)`.
    pub(super) async fn find_first(
        &self,
        attribute: &str,
        value: &str,
        attributes: &[&str],
    ) -> Result<Option<DirectoryEntry>, ServiceError> {
        let filter = self.filter(attribute, value);
        debug!(filter = %filter, "Searching directory");
        let entries = self
            .repository
            .search(&self.options.base_dn, SearchScope::Subtree, &filter, attributes)
            .await?;
        Ok(entries.into_iter().next())
    }

    /// Looks up an account by sAMAccountName or, failing that, by mail.
    ///
    /// At least one identifier must be non-empty; when both are given the
    /// sAMAccountName wins.
    #[instrument(skip(self))]
    pub async fn find_user(
        &self,
        sam_account_name: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<UserRecord>, ServiceError> {
        let sam_account_name = sam_account_name.filter(|v| !v.is_empty());
        let email = email.filter(|v| !v.is_empty());

        let entry = match (sam_account_name, email) {
            (Some(sam), _) => self.find_first("sAMAccountName", sam, USER_ATTRIBUTES).await?,
            (None, Some(mail)) => self.find_first("mail", mail, USER_ATTRIBUTES).await?,
            (None, None) => {
                return Err(ServiceError::ValidationError(
                    "Parameter \"samAccountName\" oder \"email\" erforderlich".to_string(),
                ))
            }
        };

        Ok(entry.map(|entry| user_record_from_entry(&entry)))
    }

    pub async fn get_dn_by_sam_account_name(&self, sam_account_name: &str) -> Result<Option<String>, ServiceError> {
        Ok(self
            .find_first("sAMAccountName", sam_account_name, &["sAMAccountName"])
            .await?
            .map(|entry| entry.dn))
    }

    #[instrument(skip(self))]
    pub async fn unlock_user(&self, dn: &str) -> Result<(), ServiceError> {
        self.repository
            .modify_batch(dn, vec![Modification::replace("lockoutTime", "0")])
            .await
            .map_err(|e| e.context("Unlock fehlgeschlagen: "))?;

        info!(dn = %dn, "Account unlocked");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn disable_user(&self, dn: &str) -> Result<(), ServiceError> {
        self.update_account_control(dn, ad::with_disabled_flag)
            .await
            .map_err(|e| e.context("Deaktivierung fehlgeschlagen: "))?;

        info!(dn = %dn, "Account disabled");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn enable_user(&self, dn: &str) -> Result<(), ServiceError> {
        self.update_account_control(dn, ad::without_disabled_flag)
            .await
            .map_err(|e| e.context("Aktivierung fehlgeschlagen: "))?;

        info!(dn = %dn, "Account enabled");
        Ok(())
    }

    /// Read-modify-write of `userAccountControl`. Not atomic: a change to
    /// other bits made between the read and the replace is overwritten.
    async fn update_account_control(&self, dn: &str, update: fn(u32) -> u32) -> Result<(), ServiceError> {
        let entry = self
            .repository
            .read_entry(dn, &["userAccountControl"])
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Benutzer nicht gefunden: {}", dn)))?;

        let raw = entry
            .first("userAccountControl")
            .ok_or_else(|| ServiceError::NotFound("userAccountControl nicht vorhanden.".to_string()))?;
        let current = ad::parse_account_control(raw).ok_or_else(|| {
            ServiceError::DirectoryError(format!("userAccountControl ist keine Zahl: {}", raw))
        })?;

        let updated = update(current);
        debug!(dn = %dn, current, updated, "Replacing userAccountControl");

        self.repository
            .modify_batch(dn, vec![Modification::replace("userAccountControl", updated.to_string())])
            .await
    }

    /// Sets a new password through `unicodePwd`. Password policy is enforced
    /// by the directory, not here.
    #[instrument(skip(self, new_password))]
    pub async fn reset_password(&self, dn: &str, new_password: &str) -> Result<(), ServiceError> {
        let encoded = ad::encode_unicode_pwd(new_password);
        self.repository
            .modify_batch(dn, vec![Modification::replace("unicodePwd", encoded)])
            .await
            .map_err(|e| e.context("Passwortänderung fehlgeschlagen: "))?;

        info!(dn = %dn, "Password reset");
        Ok(())
    }
}

pub fn user_record_from_entry(entry: &DirectoryEntry) -> UserRecord {
    UserRecord {
        dn: entry.dn.clone(),
        cn: entry.first_owned("cn"),
        mail: entry.first_owned("mail"),
        sam_account_name: entry.first_owned("sAMAccountName"),
        member_of: entry
            .values("memberOf")
            .iter()
            .map(|dn| ad::common_name_from_dn(dn))
            .collect(),
        is_locked: ad::is_locked(entry.first("lockoutTime")),
        is_disabled: ad::is_disabled(entry.first("userAccountControl")),
        last_logon: ad::format_last_logon(entry.first("lastLogonTimestamp")),
        position: entry.first_owned("title"),
        department: entry.first_owned("department"),
        description: entry.first_owned("description"),
    }
}
