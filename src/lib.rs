pub mod arguments;
pub mod config;
pub mod database;
pub mod errors;
pub mod hydrants;
pub mod logger;
pub mod models;
pub mod notification;
pub mod redaction;
pub mod weather;
pub mod webserver;

pub use config::Config;
pub use database::Database;
pub use errors::AlertHubError;
