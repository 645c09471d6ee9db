// Re-export all models organized by domain
pub mod directory;
pub mod errors;
pub mod group;
pub mod request;
pub mod response;
pub mod user;

pub use directory::*;
pub use errors::*;
pub use group::*;
pub use request::*;
pub use response::*;
pub use user::*;
