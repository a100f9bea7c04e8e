//! Archive pipeline metrics recorded through the `metrics` facade.
//!
//! Without an installed recorder every call is a no-op, so library users and
//! tests pay nothing unless `init_metrics` runs.

use crate::error::Stage;
use std::net::SocketAddr;
use tracing::{info, warn};

pub const OUTCOMES_TOTAL: &str = "thumber_archive_outcomes_total";
pub const FAILURES_TOTAL: &str = "thumber_archive_failures_total";
pub const UPLOAD_DURATION_SECONDS: &str = "thumber_upload_duration_seconds";
pub const PROCESS_DURATION_SECONDS: &str = "thumber_process_duration_seconds";

/// Installs the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new().with_http_listener(addr);
    match builder.install() {
        Ok(()) => info!("Prometheus exporter listening on http://{}/metrics", addr),
        Err(e) => warn!("Prometheus exporter install failed (possibly already installed): {}", e),
    }
}

pub mod archive {
    use super::*;

    pub fn outcome(kind: &'static str) {
        ::metrics::counter!(OUTCOMES_TOTAL, "outcome" => kind).increment(1);
    }

    pub fn failure(stage: Stage) {
        ::metrics::counter!(FAILURES_TOTAL, "stage" => stage.as_str()).increment(1);
    }

    pub fn upload_duration(secs: f64) {
        ::metrics::histogram!(UPLOAD_DURATION_SECONDS).record(secs);
    }

    pub fn process_duration(secs: f64) {
        ::metrics::histogram!(PROCESS_DURATION_SECONDS).record(secs);
    }
}
