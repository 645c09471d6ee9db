pub mod directory_service;
pub mod group_service;

pub use directory_service::*;
