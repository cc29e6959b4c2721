//! Prometheus metrics rendering
//!
//! The library crates emit:
//!
//! - `session_refresh_total` (counter): label `outcome`
//! - `api_requests_total` (counter): label `status`
//! - `catalog_cache_lookups_total` (counter): label `result`
//!
//! A one-shot command has no scrape endpoint, so `--metrics` renders the
//! exposition text to stderr when the command finishes.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return a handle for rendering metrics.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_render_in_exposition_format() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let _guard = metrics::set_default_local_recorder(&recorder);
        metrics::counter!("session_refresh_total", "outcome" => "success").increment(2);

        let rendered = handle.render();
        assert!(rendered.contains("session_refresh_total"), "got: {rendered}");
        assert!(rendered.contains(r#"outcome="success""#), "got: {rendered}");
    }
}
