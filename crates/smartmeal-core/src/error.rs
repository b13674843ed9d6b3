//! Error types for smartmeal-core

use thiserror::Error;

use crate::auth::AuthError;
use crate::config::ConfigError;
use crate::store::StoreError;

/// Result type alias using smartmeal-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the high-level link service
#[derive(Error, Debug)]
pub enum Error {
    /// Linking, exchange, or backend failure
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Invalid or incomplete client configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Local session storage failure
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}
