use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] smartmeal_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Authentication error: {0}")]
    Auth(String),
    #[error(
        "Profile '{0}' is not configured. Run `smartmeal config init --profile {0}` first."
    )]
    ProfileNotConfigured(String),
}

impl From<smartmeal_core::AuthError> for CliError {
    fn from(error: smartmeal_core::AuthError) -> Self {
        Self::Auth(error.to_string())
    }
}

impl From<smartmeal_core::config::ConfigError> for CliError {
    fn from(error: smartmeal_core::config::ConfigError) -> Self {
        Self::Config(error.to_string())
    }
}
