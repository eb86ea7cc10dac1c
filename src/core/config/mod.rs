mod parsing;
mod settings;
mod types;

pub use parsing::parse_percent;
pub use types::{
    ConfigError, DatabaseSettings, Environment, GradingSettings, RuntimeSettings, Settings,
    TelemetrySettings,
};
