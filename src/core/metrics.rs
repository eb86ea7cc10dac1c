use metrics_exporter_prometheus::PrometheusBuilder;

use crate::core::config::Settings;

pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    let telemetry = settings.telemetry();
    if !telemetry.prometheus_enabled {
        return Ok(());
    }

    PrometheusBuilder::new().with_http_listener(telemetry.metrics_addr).install()?;
    tracing::info!(addr = %telemetry.metrics_addr, "Prometheus exporter listening");
    Ok(())
}
