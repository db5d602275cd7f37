//! Prometheus metrics recorder.
//!
//! The sink is a short-lived batch process, so instead of serving an HTTP
//! endpoint the rendered exposition text is written to a file on exit, where
//! a node-exporter textfile collector can pick it up.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use snafu::prelude::*;

use crate::error::{MetricsError, PrometheusInitSnafu};

/// Install the Prometheus recorder as the global metrics recorder.
///
/// Returns a handle that renders the current metrics in text format.
pub fn init() -> Result<PrometheusHandle, MetricsError> {
    PrometheusBuilder::new()
        .install_recorder()
        .context(PrometheusInitSnafu)
}
