pub mod config;
pub mod handlers;
pub mod models;
pub mod openapi_config;
pub mod repositories;
pub mod services;
pub mod utils;
