pub mod directory_repository;
pub mod ldap_repository;
#[cfg(any(test, feature = "test-support"))]
pub mod memory_repository;

pub use directory_repository::*;
pub use ldap_repository::*;
#[cfg(any(test, feature = "test-support"))]
pub use memory_repository::*;
