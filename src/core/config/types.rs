use std::net::SocketAddr;

use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Settings {
    pub(super) runtime: RuntimeSettings,
    pub(super) database: DatabaseSettings,
    pub(super) grading: GradingSettings,
    pub(super) telemetry: TelemetrySettings,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub(crate) postgres_server: String,
    pub(crate) postgres_port: u16,
    pub(crate) postgres_user: String,
    pub(crate) postgres_password: String,
    pub(crate) postgres_db: String,
    pub(crate) database_url: Option<String>,
    pub(crate) max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct GradingSettings {
    pub(crate) pass_threshold_percent: f64,
    pub(crate) worker_concurrency: usize,
    pub(crate) poll_interval_seconds: u64,
    pub(crate) stale_after_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct TelemetrySettings {
    pub(crate) log_level: String,
    pub(crate) json: bool,
    pub(crate) prometheus_enabled: bool,
    pub(crate) metrics_addr: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub(crate) environment: Environment,
    pub(crate) strict_config: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Staging,
    Test,
}

impl Environment {
    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
            Environment::Staging => "staging",
            Environment::Test => "test",
        }
    }

    pub(super) fn is_production(self) -> bool {
        matches!(self, Environment::Production)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange { field: &'static str, min: f64, max: f64, value: f64 },
    #[error("missing required secret for {0}")]
    MissingSecret(&'static str),
}
