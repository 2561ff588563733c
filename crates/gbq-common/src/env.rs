//! Environment variable lookups used by the configuration structs

use crate::error::{ConfigError, Result};
use std::str::FromStr;

/// Load a `.env` file from the working directory if one exists.
///
/// Variables already present in the process environment win.
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

/// Read a variable, treating an empty value as unset.
pub fn optional(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read the first variable that is set among `keys`.
pub fn first_of(keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| optional(key))
}

/// Read a string variable or fall back to `default`.
pub fn string_or(key: &str, default: &str) -> String {
    optional(key).unwrap_or_else(|| default.to_string())
}

/// Parse a variable into `T`, falling back to `default` when unset.
///
/// A value that is set but fails to parse is an error rather than being
/// silently replaced by the default.
pub fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional(key) {
        Some(raw) => raw.parse::<T>().map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.clone(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

/// Parse a boolean flag. Accepts `true/false`, `1/0`, `yes/no`, `on/off`.
pub fn flag_or(key: &str, default: bool) -> Result<bool> {
    match optional(key) {
        Some(raw) => match raw.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw,
                reason: "expected a boolean".to_string(),
            }),
        },
        None => Ok(default),
    }
}
