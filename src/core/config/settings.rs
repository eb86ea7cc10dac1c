use crate::grading::PassPolicy;

use super::parsing::{
    env_optional, env_or_default, parse_bool, parse_environment, parse_percent,
    parse_positive_usize, parse_socket_addr, parse_u16, parse_u32, parse_u64,
};
use super::types::{
    ConfigError, DatabaseSettings, GradingSettings, RuntimeSettings, Settings, TelemetrySettings,
};

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let environment = parse_environment(
            env_optional("EXAM_GRADER_ENV").or_else(|| env_optional("ENVIRONMENT")),
        );
        let strict_config = env_optional("EXAM_GRADER_STRICT_CONFIG")
            .map(|value| parse_bool(&value))
            .unwrap_or(false)
            || environment.is_production();

        let postgres_server = env_or_default("POSTGRES_SERVER", "localhost");
        let postgres_port = parse_u16("POSTGRES_PORT", env_or_default("POSTGRES_PORT", "5432"))?;
        let postgres_user = env_or_default("POSTGRES_USER", "exam_grader");
        let postgres_password = env_or_default("POSTGRES_PASSWORD", "");
        let postgres_db = env_or_default("POSTGRES_DB", "exam_grader");
        let database_url = env_optional("DATABASE_URL");
        let max_connections =
            parse_u32("DATABASE_MAX_CONNECTIONS", env_or_default("DATABASE_MAX_CONNECTIONS", "10"))?;

        let pass_threshold_percent =
            parse_percent("PASS_THRESHOLD_PERCENT", env_or_default("PASS_THRESHOLD_PERCENT", "50"))?;
        let worker_concurrency = parse_positive_usize(
            "GRADING_WORKER_CONCURRENCY",
            env_or_default("GRADING_WORKER_CONCURRENCY", "2"),
        )?;
        let poll_interval_seconds = parse_u64(
            "GRADING_POLL_INTERVAL_SECONDS",
            env_or_default("GRADING_POLL_INTERVAL_SECONDS", "2"),
        )?;
        let stale_after_minutes = parse_u64(
            "GRADING_STALE_AFTER_MINUTES",
            env_or_default("GRADING_STALE_AFTER_MINUTES", "10"),
        )?;

        let log_level = env_or_default("LOG_LEVEL", "info");
        let json = env_optional("LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);
        let prometheus_enabled =
            env_optional("PROMETHEUS_ENABLED").map(|value| parse_bool(&value)).unwrap_or(false);
        let metrics_addr =
            parse_socket_addr("METRICS_ADDR", env_or_default("METRICS_ADDR", "0.0.0.0:9100"))?;

        let settings = Self {
            runtime: RuntimeSettings { environment, strict_config },
            database: DatabaseSettings {
                postgres_server,
                postgres_port,
                postgres_user,
                postgres_password,
                postgres_db,
                database_url,
                max_connections,
            },
            grading: GradingSettings {
                pass_threshold_percent,
                worker_concurrency,
                poll_interval_seconds,
                stale_after_minutes: i64::try_from(stale_after_minutes).map_err(|_| {
                    ConfigError::InvalidValue {
                        field: "GRADING_STALE_AFTER_MINUTES",
                        value: stale_after_minutes.to_string(),
                    }
                })?,
            },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled, metrics_addr },
        };

        settings.validate()?;
        Ok(settings)
    }

    pub fn database(&self) -> &DatabaseSettings {
        &self.database
    }

    pub fn grading(&self) -> &GradingSettings {
        &self.grading
    }

    pub fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    pub fn pass_policy(&self) -> PassPolicy {
        PassPolicy::new(self.grading.pass_threshold_percent)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.max_connections == 0 {
            return Err(ConfigError::InvalidValue {
                field: "DATABASE_MAX_CONNECTIONS",
                value: "0".to_string(),
            });
        }

        if self.grading.poll_interval_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "GRADING_POLL_INTERVAL_SECONDS",
                value: "0".to_string(),
            });
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        if self.database.database_url.is_none() && self.database.postgres_password.is_empty() {
            return Err(ConfigError::MissingSecret("POSTGRES_PASSWORD"));
        }

        Ok(())
    }
}

impl DatabaseSettings {
    pub fn database_url(&self) -> String {
        if let Some(url) = &self.database_url {
            return url.clone();
        }
        format!(
            "postgresql://{}:{}@{}:{}/{}",
            self.postgres_user,
            self.postgres_password,
            self.postgres_server,
            self.postgres_port,
            self.postgres_db
        )
    }
}
