use tracing_subscriber::{fmt, EnvFilter};

use crate::core::config::Settings;

/// `RUST_LOG` wins over `LOG_LEVEL`; sqlx is kept at `warn` unless asked for explicitly.
fn filter_from_settings(settings: &Settings) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &settings.telemetry().log_level;
        EnvFilter::try_new(format!("{level},sqlx=warn")).unwrap_or_else(|_| EnvFilter::new("info"))
    })
}

pub(crate) fn init_tracing(settings: &Settings) -> anyhow::Result<()> {
    let builder = fmt().with_env_filter(filter_from_settings(settings)).with_target(false);

    if settings.telemetry().json {
        builder
            .json()
            .with_current_span(false)
            .try_init()
            .map_err(|err| anyhow::anyhow!(err.to_string()))?;
    } else {
        builder.try_init().map_err(|err| anyhow::anyhow!(err.to_string()))?;
    }

    Ok(())
}

/// Logging for one-shot tools: plain text on stderr so stdout stays machine-readable.
pub fn init_stderr_tracing(default_level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!(err.to_string()))
}
