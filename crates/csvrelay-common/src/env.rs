//! Environment variable lookups
//!
//! Only the binaries read the environment. Library code receives the
//! resulting values through explicit configuration structs.

use crate::error::{EnvError, Result};
use std::env::VarError;
use std::str::FromStr;

/// Read a variable that must be present and non-empty.
pub fn required(name: &str) -> Result<String> {
    match optional(name)? {
        Some(value) => Ok(value),
        None => Err(EnvError::Missing(name.to_string())),
    }
}

/// Read a variable that may be absent. Empty values count as absent.
pub fn optional(name: &str) -> Result<Option<String>> {
    match std::env::var(name) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(VarError::NotPresent) => Ok(None),
        Err(VarError::NotUnicode(_)) => Err(EnvError::NotUnicode {
            name: name.to_string(),
        }),
    }
}

/// Read and parse an optional variable, falling back to `default` when unset.
pub fn parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional(name)? {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| EnvError::Invalid {
            name: name.to_string(),
            value: raw.clone(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}
