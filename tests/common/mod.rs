use actix_web::{web, App};
use std::sync::Arc;
use ldap_rest_gateway::{
    handlers,
    models::DirectoryEntry,
    repositories::InMemoryDirectoryRepository,
    services::{DirectoryOptions, DirectoryService},
};

pub const BASE_DN: &str = "DC=example,DC=com";
pub const ADMINS_DN: &str = "CN=IT-Admins,OU=Groups,DC=example,DC=com";
pub const SALES_DN: &str = "CN=Sales,OU=Groups,DC=example,DC=com";
pub const JDOE_DN: &str = "CN=John Doe,OU=Users,DC=example,DC=com";
pub const JROE_DN: &str = "CN=Jane Roe,OU=Users,DC=example,DC=com";

pub struct TestApp {
    pub repository: Arc<InMemoryDirectoryRepository>,
}

impl TestApp {
    /// Directory with two groups and two accounts. `jroe` is locked, disabled
    /// and a member of IT-Admins; `jdoe` is active and in no group.
    pub async fn new() -> Self {
        let repository = Arc::new(InMemoryDirectoryRepository::with_entries([
            DirectoryEntry::new(BASE_DN).with_attribute("objectClass", ["domain"]),
            DirectoryEntry::new(ADMINS_DN)
                .with_attribute("objectCategory", ["group"])
                .with_attribute("cn", ["IT-Admins"])
                .with_attribute("member", [JROE_DN]),
            DirectoryEntry::new(SALES_DN)
                .with_attribute("objectCategory", ["group"])
                .with_attribute("cn", ["Sales"]),
            DirectoryEntry::new(JDOE_DN)
                .with_attribute("objectCategory", ["person"])
                .with_attribute("cn", ["John Doe"])
                .with_attribute("sAMAccountName", ["jdoe"])
                .with_attribute("mail", ["john.doe@example.com"])
                .with_attribute("userAccountControl", ["512"])
                .with_attribute("lockoutTime", ["0"])
                .with_attribute("title", ["Engineer"])
                .with_attribute("department", ["IT"]),
            DirectoryEntry::new(JROE_DN)
                .with_attribute("objectCategory", ["person"])
                .with_attribute("cn", ["Jane Roe"])
                .with_attribute("sAMAccountName", ["jroe"])
                .with_attribute("mail", ["jane.roe@example.com"])
                .with_attribute("userAccountControl", ["514"])
                .with_attribute("lockoutTime", ["132000000000000000"])
                .with_attribute("memberOf", [ADMINS_DN]),
        ]));

        Self { repository }
    }

    pub fn create_app(&self) -> actix_web::App<
        impl actix_web::dev::ServiceFactory<
            actix_web::dev::ServiceRequest,
            Config = (),
            Response = actix_web::dev::ServiceResponse,
            Error = actix_web::Error,
            InitError = (),
        >,
    > {
        let directory_service = web::Data::new(DirectoryService::new(
            self.repository.clone(),
            DirectoryOptions::new(BASE_DN),
        ));

        App::new()
            .app_data(directory_service)
            .configure(handlers::configure_routes)
    }

    #[allow(dead_code)]
    pub async fn attribute(&self, dn: &str, attribute: &str) -> Vec<String> {
        self.repository
            .entry(dn)
            .await
            .map(|entry| entry.values(attribute).to_vec())
            .unwrap_or_default()
    }
}
