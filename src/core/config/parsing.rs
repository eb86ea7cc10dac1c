use std::env;
use std::net::SocketAddr;

use super::types::{ConfigError, Environment};

pub(super) fn env_optional(key: &str) -> Option<String> {
    env::var(key).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

pub(super) fn env_or_default(key: &str, default: &str) -> String {
    env_optional(key).unwrap_or_else(|| default.to_string())
}

pub(super) fn parse_u16(field: &'static str, value: String) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidValue { field, value })
}

pub(super) fn parse_u32(field: &'static str, value: String) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidValue { field, value })
}

pub(super) fn parse_u64(field: &'static str, value: String) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidValue { field, value })
}

pub(super) fn parse_positive_usize(field: &'static str, value: String) -> Result<usize, ConfigError> {
    match value.parse::<usize>() {
        Ok(parsed) if parsed > 0 => Ok(parsed),
        _ => Err(ConfigError::InvalidValue { field, value }),
    }
}

/// A percentage within 0..=100, with or without a trailing `%`.
pub fn parse_percent(field: &'static str, value: String) -> Result<f64, ConfigError> {
    let parsed = value
        .trim()
        .trim_end_matches('%')
        .parse::<f64>()
        .map_err(|_| ConfigError::InvalidValue { field, value: value.clone() })?;
    if !(0.0..=100.0).contains(&parsed) {
        return Err(ConfigError::OutOfRange { field, min: 0.0, max: 100.0, value: parsed });
    }
    Ok(parsed)
}

pub(super) fn parse_socket_addr(field: &'static str, value: String) -> Result<SocketAddr, ConfigError> {
    value.parse::<SocketAddr>().map_err(|_| ConfigError::InvalidValue { field, value })
}

pub(super) fn parse_bool(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "yes" | "YES" | "on" | "ON")
}

pub(super) fn parse_environment(value: Option<String>) -> Environment {
    match value.as_deref().map(|item| item.to_lowercase()) {
        Some(ref val) if val == "production" || val == "prod" => Environment::Production,
        Some(ref val) if val == "staging" => Environment::Staging,
        Some(ref val) if val == "test" || val == "testing" => Environment::Test,
        _ => Environment::Development,
    }
}
