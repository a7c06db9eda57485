use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROM_HANDLE.set(handle);
    Ok(())
}

pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}

/// One outbound Canvas call, labelled by HTTP method and status (`error` on transport failure).
pub(crate) fn record_canvas_request(method: &str, status: Option<u16>, seconds: f64) {
    let status_label = status.map(|code| code.to_string()).unwrap_or_else(|| "error".to_string());
    metrics::counter!(
        "canvas_requests_total",
        "method" => method.to_string(),
        "status" => status_label.clone()
    )
    .increment(1);
    metrics::histogram!(
        "canvas_request_duration_seconds",
        "method" => method.to_string(),
        "status" => status_label
    )
    .record(seconds);
}

pub(crate) fn record_strategy_outcome(source: &'static str, outcome: &'static str) {
    metrics::counter!(
        "quiz_answer_strategy_total",
        "source" => source,
        "outcome" => outcome
    )
    .increment(1);
}
