//! Environment-based configuration helpers
//!
//! Configuration structs live next to the code they configure; this module
//! only knows how to read the process environment and an optional `.env`.

use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

/// Errors raised while reading configuration from the environment
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is missing or blank
    #[error("environment variable {0} is not set")]
    Missing(String),

    /// A variable is set but does not parse
    #[error("environment variable {name} has invalid value '{value}': {reason}")]
    Invalid {
        name: String,
        value: String,
        reason: String,
    },

    /// The env file exists but could not be read
    #[error("failed to load env file: {0}")]
    EnvFile(String),
}

/// Load `.env` from the working directory, if there is one
///
/// Variables already present in the process environment win. A missing file
/// is not an error.
pub fn load_dotenv() -> Result<(), ConfigError> {
    load_dotenv_from(".env")
}

/// Load an env file from an explicit path, if it exists
pub fn load_dotenv_from(path: impl AsRef<Path>) -> Result<(), ConfigError> {
    let path = path.as_ref();
    match dotenvy::from_path(path) {
        Ok(()) => {
            debug!("Loaded environment from {}", path.display());
            Ok(())
        }
        Err(e) if e.not_found() => Ok(()),
        Err(e) => Err(ConfigError::EnvFile(format!("{}: {e}", path.display()))),
    }
}

/// Read a variable, treating blank values as unset
pub fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read and parse a variable, falling back to `default` when unset
pub fn env_parse<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_var(name) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            name: name.to_string(),
            reason: e.to_string(),
            value,
        }),
    }
}
