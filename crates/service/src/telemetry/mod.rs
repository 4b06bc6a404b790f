//! Metrics and structured log shipping.
//!
//! [`Telemetry`] is the handle request code uses: counters on [`Metrics`]
//! and fire-and-forget events through a [`LogSender`]. Neither can block or
//! fail a request. The background side ([`TelemetryTasks`]) is started once
//! at boot and stopped on shutdown, which flushes both queues.

pub mod logs;
pub mod metrics;
pub mod reporter;
pub mod sink;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

pub use logs::{LogEvent, LogLevel, LogSender, LogShipper};
pub use metrics::{MetricSample, Metrics, MetricsSnapshot};
pub use reporter::MetricsReporter;
pub use sink::{HttpTelemetrySink, TelemetrySink, TracingSink};

use crate::config::TelemetryConfig;

/// Errors pushing telemetry. Logged and dropped by the background tasks.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("telemetry request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("telemetry endpoint returned status {0}")]
    Status(u16),

    #[error("failed to encode telemetry: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Request-side telemetry handle.
#[derive(Debug, Clone)]
pub struct Telemetry {
    metrics: Arc<Metrics>,
    logs: LogSender,
}

impl Telemetry {
    #[must_use]
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Queue a log event; dropped if the queue is full.
    pub fn log(&self, event: LogEvent) {
        self.logs.submit(event);
    }
}

/// Background telemetry tasks.
#[derive(Debug)]
pub struct TelemetryTasks {
    reporter: MetricsReporter,
    shipper: LogShipper,
}

impl TelemetryTasks {
    /// Stop both tasks, flushing pending metrics and log events.
    pub async fn stop(self) {
        self.reporter.stop().await;
        self.shipper.stop().await;
    }
}

/// Start telemetry against the sink described by `config`.
///
/// Without any endpoint configured, telemetry goes to [`TracingSink`].
///
/// # Errors
///
/// Returns `TelemetryError::Request` if the HTTP client cannot be built.
pub fn start(config: &TelemetryConfig) -> Result<(Telemetry, TelemetryTasks), TelemetryError> {
    let sink: Arc<dyn TelemetrySink> = if config.metrics_url.is_none() && config.logs_url.is_none()
    {
        tracing::info!("No telemetry endpoints configured; writing telemetry to tracing");
        Arc::new(TracingSink)
    } else {
        Arc::new(HttpTelemetrySink::new(config)?)
    };

    Ok(start_with_sink(
        sink,
        Duration::from_secs(config.metrics_interval_secs),
        config.log_queue_capacity,
    ))
}

/// Start telemetry against an explicit sink.
pub fn start_with_sink(
    sink: Arc<dyn TelemetrySink>,
    interval: Duration,
    log_capacity: usize,
) -> (Telemetry, TelemetryTasks) {
    let metrics = Arc::new(Metrics::new());
    let reporter = MetricsReporter::start(Arc::clone(&metrics), Arc::clone(&sink), interval);
    let (shipper, logs) = LogShipper::start(sink, log_capacity, Arc::clone(&metrics));

    (
        Telemetry { metrics, logs },
        TelemetryTasks { reporter, shipper },
    )
}
