//! Error types shared across csvrelay crates

use thiserror::Error;

/// Result type alias for environment lookups
pub type Result<T> = std::result::Result<T, EnvError>;

/// Failure to read a value from the process environment
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvError {
    #[error("Required environment variable '{0}' is not set")]
    Missing(String),

    #[error("Environment variable '{name}' is not valid unicode")]
    NotUnicode { name: String },

    #[error("Environment variable '{name}' has invalid value '{value}': {reason}")]
    Invalid {
        name: String,
        value: String,
        reason: String,
    },
}
