pub mod auth;
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod http;

pub use config::ServerConfig;
pub use error::{CoreError, HttpError};
pub use http::AppState;
