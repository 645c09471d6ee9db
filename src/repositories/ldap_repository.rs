use std::collections::HashSet;

use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, LdapError, Mod, Scope, SearchEntry, SearchResult};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::config::{EncryptionMode, LdapConfig};
use crate::models::{DirectoryEntry, Modification, ModifyOperation, SearchScope, ServiceError};
use crate::repositories::{check_search_result, describe_result, result_error, DirectoryRepository};

/// Directory backend talking to a real LDAP / Active Directory server.
///
/// Holds one bound connection. `ldap3` multiplexes concurrent operations on
/// a single connection, so every operation works on a clone of the handle.
/// A transport failure drops the cached handle and the next operation binds
/// a fresh connection.
pub struct LdapDirectoryRepository {
    config: LdapConfig,
    connection: RwLock<Option<Ldap>>,
}

impl LdapDirectoryRepository {
    /// Connects and binds eagerly so that bad credentials fail at startup.
    pub async fn connect(config: LdapConfig) -> Result<Self, ServiceError> {
        let ldap = Self::open(&config).await?;
        Ok(Self {
            config,
            connection: RwLock::new(Some(ldap)),
        })
    }

    async fn open(config: &LdapConfig) -> Result<Ldap, ServiceError> {
        let url = config.url();

        let mut settings = LdapConnSettings::new()
            .set_starttls(config.encryption == EncryptionMode::StartTls)
            .set_no_tls_verify(config.ignore_certificate);
        if let Some(timeout) = config.timeout {
            settings = settings.set_conn_timeout(timeout);
        }

        debug!(url = %url, encryption = ?config.encryption, "Connecting to directory server");

        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &url)
            .await
            .map_err(|e| ServiceError::DirectoryError(format!("Failed to connect to {}: {}", url, e)))?;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!(error = %e, "LDAP connection driver error");
            }
        });

        if let Some(timeout) = config.timeout {
            ldap.with_timeout(timeout);
        }

        debug!(bind_dn = %config.bind_dn, "Performing LDAP bind");
        let result = ldap
            .simple_bind(&config.bind_dn, &config.bind_password)
            .await
            .map_err(|e| ServiceError::DirectoryError(format!("LDAP bind failed for {}: {}", config.bind_dn, e)))?;

        if result.rc != 0 {
            return Err(ServiceError::DirectoryError(format!(
                "LDAP bind failed for {}: {}",
                config.bind_dn,
                describe_result(result.rc, &result.text)
            )));
        }

        info!(url = %url, bind_dn = %config.bind_dn, "Directory connection established");
        Ok(ldap)
    }

    async fn handle(&self) -> Result<Ldap, ServiceError> {
        let cached = self.connection.read().await.clone();
        let mut ldap = match cached {
            Some(ldap) => ldap,
            None => {
                let ldap = Self::open(&self.config).await?;
                *self.connection.write().await = Some(ldap.clone());
                ldap
            }
        };

        // ldap3 timeouts apply to the next operation only
        if let Some(timeout) = self.config.timeout {
            ldap.with_timeout(timeout);
        }
        Ok(ldap)
    }

    async fn transport_error(&self, err: LdapError) -> ServiceError {
        if !matches!(err, LdapError::LdapResult { .. }) {
            warn!(error = %err, "Dropping directory connection after transport error");
            self.connection.write().await.take();
        }
        ServiceError::from(err)
    }
}

fn to_ldap_scope(scope: SearchScope) -> Scope {
    match scope {
        SearchScope::Base => Scope::Base,
        SearchScope::OneLevel => Scope::OneLevel,
        SearchScope::Subtree => Scope::Subtree,
    }
}

fn to_ldap_mod(modification: Modification) -> Mod<Vec<u8>> {
    let attribute = modification.attribute.into_bytes();
    let values: HashSet<Vec<u8>> = modification.values.into_iter().collect();
    match modification.operation {
        ModifyOperation::Replace => Mod::Replace(attribute, values),
        ModifyOperation::Add => Mod::Add(attribute, values),
        ModifyOperation::Remove => Mod::Delete(attribute, values),
    }
}

#[async_trait]
impl DirectoryRepository for LdapDirectoryRepository {
    #[instrument(skip(self, attributes))]
    async fn search(
        &self,
        base: &str,
        scope: SearchScope,
        filter: &str,
        attributes: &[&str],
    ) -> Result<Vec<DirectoryEntry>, ServiceError> {
        let mut ldap = self.handle().await?;

        let outcome = ldap
            .search(base, to_ldap_scope(scope), filter, attributes.to_vec())
            .await;
        let SearchResult(entries, result) = match outcome {
            Ok(search) => search,
            Err(e) => return Err(self.transport_error(e).await),
        };

        let truncated = check_search_result(result.rc, &result.text)?;

        let entries: Vec<DirectoryEntry> = entries
            .into_iter()
            .filter(|entry| !entry.is_ref())
            .map(|entry| {
                let entry = SearchEntry::construct(entry);
                DirectoryEntry {
                    dn: entry.dn,
                    attributes: entry.attrs,
                }
            })
            .collect();

        if truncated {
            warn!(count = entries.len(), "Search stopped at the server size limit, returning partial results");
        }
        debug!(count = entries.len(), "Search completed");
        Ok(entries)
    }

    #[instrument(skip(self, modifications), fields(count = modifications.len()))]
    async fn modify_batch(&self, dn: &str, modifications: Vec<Modification>) -> Result<(), ServiceError> {
        let mut ldap = self.handle().await?;

        let attributes: Vec<String> = modifications.iter().map(|m| m.attribute.clone()).collect();
        debug!(attributes = ?attributes, "Issuing modify request");

        let mods: Vec<Mod<Vec<u8>>> = modifications.into_iter().map(to_ldap_mod).collect();
        let result = match ldap.modify(dn, mods).await {
            Ok(result) => result,
            Err(e) => return Err(self.transport_error(e).await),
        };

        if result.rc != 0 {
            return Err(result_error(result.rc, &result.text));
        }
        Ok(())
    }
}
