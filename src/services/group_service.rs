use tracing::{debug, info, instrument, warn};

use crate::models::{GroupRecord, MemberFetchMode, Modification, SearchScope, ServiceError, UserSummary};
use crate::services::DirectoryService;

const GROUP_FILTER: &str = "(&(objectCategory=group))";
const MEMBER_ATTRIBUTES: &[&str] = &["cn", "mail", "sAMAccountName"];

impl DirectoryService {
    /// Every group below the base DN, in directory order.
    #[instrument(skip(self))]
    pub async fn get_all_groups(&self) -> Result<Vec<GroupRecord>, ServiceError> {
        let entries = self
            .repository
            .search(&self.options.base_dn, SearchScope::Subtree, GROUP_FILTER, &["cn"])
            .await?;

        Ok(entries
            .into_iter()
            .map(|entry| GroupRecord {
                cn: entry.first_owned("cn"),
                dn: entry.dn,
            })
            .collect())
    }

    /// DN of the first entry whose `cn` equals `cn`. Several matches are not
    /// an error; the first one wins.
    pub async fn resolve_group_dn_by_cn(&self, cn: &str) -> Result<Option<String>, ServiceError> {
        Ok(self.find_first("cn", cn, &["cn"]).await?.map(|entry| entry.dn))
    }

    #[instrument(skip(self))]
    pub async fn get_group_members_by_cn(
        &self,
        cn: &str,
        mode: MemberFetchMode,
    ) -> Result<Vec<UserSummary>, ServiceError> {
        let group_not_found = || ServiceError::NotFound("Gruppe nicht gefunden".to_string());

        let group_dn = self.resolve_group_dn_by_cn(cn).await?.ok_or_else(group_not_found)?;
        let group = self
            .repository
            .read_entry(&group_dn, &["member"])
            .await?
            .ok_or_else(group_not_found)?;

        let mut members = Vec::new();
        for member_dn in group.values("member") {
            match self.repository.read_entry(member_dn, MEMBER_ATTRIBUTES).await {
                Ok(Some(entry)) => members.push(UserSummary {
                    dn: member_dn.clone(),
                    cn: entry.first_owned("cn"),
                    mail: entry.first_owned("mail"),
                    sam_account_name: entry.first_owned("sAMAccountName"),
                }),
                Ok(None) if mode == MemberFetchMode::BestEffort => {
                    debug!(member = %member_dn, "Skipping dangling group member");
                }
                Err(e) if mode == MemberFetchMode::BestEffort => {
                    warn!(member = %member_dn, error = %e, "Skipping unreadable group member");
                }
                Ok(None) => {
                    return Err(ServiceError::NotFound(format!(
                        "Mitglied nicht gefunden: {}",
                        member_dn
                    )))
                }
                Err(e) => return Err(e),
            }
        }

        Ok(members)
    }

    #[instrument(skip(self))]
    pub async fn add_user_to_group(&self, sam_account_name: &str, group_dn: &str) -> Result<(), ServiceError> {
        let user_dn = self.require_user_dn(sam_account_name).await?;

        self.repository
            .modify_batch(group_dn, vec![Modification::add("member", user_dn.as_str())])
            .await
            .map_err(|e| e.context("Fehler beim Hinzufügen: "))?;

        info!(user = %user_dn, group = %group_dn, "Added group member");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn remove_user_from_group(&self, sam_account_name: &str, group_dn: &str) -> Result<(), ServiceError> {
        let user_dn = self.require_user_dn(sam_account_name).await?;

        self.repository
            .modify_batch(group_dn, vec![Modification::remove("member", user_dn.as_str())])
            .await
            .map_err(|e| e.context("Fehler beim Entfernen: "))?;

        info!(user = %user_dn, group = %group_dn, "Removed group member");
        Ok(())
    }

    async fn require_user_dn(&self, sam_account_name: &str) -> Result<String, ServiceError> {
        self.get_dn_by_sam_account_name(sam_account_name)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Benutzer nicht gefunden".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::models::DirectoryEntry;
    use crate::repositories::InMemoryDirectoryRepository;
    use crate::services::DirectoryOptions;

    const BASE_DN: &str = "DC=example,DC=com";
    const ADMINS: &str = "CN=IT-Admins,OU=Groups,DC=example,DC=com";
    const JDOE: &str = "CN=John Doe,OU=Users,DC=example,DC=com";
    const JROE: &str = "CN=Jane Roe,OU=Users,DC=example,DC=com";

    fn fixture() -> Arc<InMemoryDirectoryRepository> {
        Arc::new(InMemoryDirectoryRepository::with_entries([
            DirectoryEntry::new(ADMINS)
                .with_attribute("objectCategory", ["group"])
                .with_attribute("cn", ["IT-Admins"])
                .with_attribute("member", [JROE, "CN=Deleted,OU=Users,DC=example,DC=com"]),
            DirectoryEntry::new("CN=Sales,OU=Groups,DC=example,DC=com")
                .with_attribute("objectCategory", ["group"])
                .with_attribute("cn", ["Sales"]),
            DirectoryEntry::new(JDOE)
                .with_attribute("objectCategory", ["person"])
                .with_attribute("cn", ["John Doe"])
                .with_attribute("sAMAccountName", ["jdoe"])
                .with_attribute("mail", ["john.doe@example.com"]),
            DirectoryEntry::new(JROE)
                .with_attribute("objectCategory", ["person"])
                .with_attribute("cn", ["Jane Roe"])
                .with_attribute("sAMAccountName", ["jroe"])
                .with_attribute("memberOf", [ADMINS]),
        ]))
    }

    fn service(repo: Arc<InMemoryDirectoryRepository>) -> DirectoryService {
        DirectoryService::new(repo, DirectoryOptions::new(BASE_DN))
    }

    #[actix_rt::test]
    async fn test_get_all_groups() {
        let svc = service(fixture());
        let groups = svc.get_all_groups().await.unwrap();

        assert_eq!(groups.len(), 2);
        assert!(groups
            .iter()
            .any(|g| g.cn.as_deref() == Some("IT-Admins") && g.dn == ADMINS));
        assert!(groups.iter().any(|g| g.cn.as_deref() == Some("Sales")));
    }

    #[actix_rt::test]
    async fn test_resolve_group_dn_by_cn() {
        let svc = service(fixture());
        assert_eq!(
            svc.resolve_group_dn_by_cn("it-admins").await.unwrap().as_deref(),
            Some(ADMINS)
        );
        assert_eq!(svc.resolve_group_dn_by_cn("Nobody").await.unwrap(), None);
    }

    #[actix_rt::test]
    async fn test_members_best_effort_skips_dangling_member() {
        let svc = service(fixture());
        let members = svc
            .get_group_members_by_cn("IT-Admins", MemberFetchMode::BestEffort)
            .await
            .unwrap();

        assert_eq!(members.len(), 1);
        assert_eq!(members[0].dn, JROE);
        assert_eq!(members[0].sam_account_name.as_deref(), Some("jroe"));
        assert_eq!(members[0].mail, None);
    }

    #[actix_rt::test]
    async fn test_members_strict_fails_on_dangling_member() {
        let svc = service(fixture());
        let err = svc
            .get_group_members_by_cn("IT-Admins", MemberFetchMode::Strict)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[actix_rt::test]
    async fn test_members_unreadable_member() {
        let repo = fixture();
        repo.deny_reads(JROE).await;
        let svc = service(repo);

        let members = svc
            .get_group_members_by_cn("IT-Admins", MemberFetchMode::BestEffort)
            .await
            .unwrap();
        assert!(members.is_empty());

        let err = svc
            .get_group_members_by_cn("IT-Admins", MemberFetchMode::Strict)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::DirectoryError(_)));
    }

    #[actix_rt::test]
    async fn test_members_of_unknown_group() {
        let svc = service(fixture());
        let err = svc
            .get_group_members_by_cn("Nobody", MemberFetchMode::BestEffort)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Gruppe nicht gefunden");
    }

    #[actix_rt::test]
    async fn test_add_then_remove_membership() {
        let svc = service(fixture());

        svc.add_user_to_group("jdoe", ADMINS).await.unwrap();
        let members = svc
            .get_group_members_by_cn("IT-Admins", MemberFetchMode::BestEffort)
            .await
            .unwrap();
        assert_eq!(members.iter().filter(|m| m.dn == JDOE).count(), 1);

        let user = svc.find_user(Some("jdoe"), None).await.unwrap().unwrap();
        assert_eq!(user.member_of, vec!["IT-Admins".to_string()]);

        svc.remove_user_from_group("jdoe", ADMINS).await.unwrap();
        let members = svc
            .get_group_members_by_cn("IT-Admins", MemberFetchMode::BestEffort)
            .await
            .unwrap();
        assert!(members.iter().all(|m| m.dn != JDOE));
    }

    #[actix_rt::test]
    async fn test_duplicate_add_surfaces_directory_error() {
        let svc = service(fixture());
        let err = svc.add_user_to_group("jroe", ADMINS).await.unwrap_err();
        assert_eq!(err.to_string(), "Fehler beim Hinzufügen: Type or value exists (rc=20)");
    }

    #[actix_rt::test]
    async fn test_remove_non_member_surfaces_directory_error() {
        let svc = service(fixture());
        let err = svc.remove_user_from_group("jdoe", ADMINS).await.unwrap_err();
        assert_eq!(err.to_string(), "Fehler beim Entfernen: No such attribute (rc=16)");
    }

    #[actix_rt::test]
    async fn test_membership_change_for_unknown_user() {
        let repo = fixture();
        let svc = service(repo.clone());

        let err = svc.add_user_to_group("ghost", ADMINS).await.unwrap_err();
        assert_eq!(err.to_string(), "Benutzer nicht gefunden");
        assert_eq!(repo.modify_calls(), 0);
    }
}
