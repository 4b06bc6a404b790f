//! Periodic metrics flush.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::metrics::Metrics;
use super::sink::TelemetrySink;

/// Background task pushing a metrics snapshot every interval.
#[derive(Debug)]
pub struct MetricsReporter {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl MetricsReporter {
    /// Spawn the reporter. The first push happens one `interval` after start.
    pub fn start(metrics: Arc<Metrics>, sink: Arc<dyn TelemetrySink>, interval: Duration) -> Self {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(metrics, sink, interval, cancel.clone()));
        Self { cancel, handle }
    }

    /// Stop the interval, push one final snapshot, and wait for the task.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            warn!(error = %e, "Metrics reporter task failed");
        }
    }
}

async fn run(
    metrics: Arc<Metrics>,
    sink: Arc<dyn TelemetrySink>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(10)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => flush(&metrics, sink.as_ref()).await,
        }
    }

    flush(&metrics, sink.as_ref()).await;
    debug!("Metrics reporter stopped");
}

async fn flush(metrics: &Metrics, sink: &dyn TelemetrySink) {
    let samples = metrics.snapshot().samples();
    if let Err(e) = sink.push_metrics(&samples).await {
        warn!(error = %e, "Failed to push metrics");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::telemetry::TelemetryError;
    use crate::telemetry::logs::LogEvent;
    use crate::telemetry::metrics::MetricSample;

    #[derive(Default)]
    struct CountingSink {
        batches: Mutex<Vec<Vec<MetricSample>>>,
    }

    #[async_trait]
    impl TelemetrySink for CountingSink {
        async fn push_metrics(&self, samples: &[MetricSample]) -> Result<(), TelemetryError> {
            self.batches.lock().unwrap().push(samples.to_vec());
            Ok(())
        }

        async fn push_logs(&self, _: &[LogEvent]) -> Result<(), TelemetryError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_stop_performs_final_flush() {
        let metrics = Arc::new(Metrics::new());
        let sink = Arc::new(CountingSink::default());
        let reporter =
            MetricsReporter::start(Arc::clone(&metrics), sink.clone(), Duration::from_secs(3600));

        metrics.record_fulfillment_failure();
        reporter.stop().await;

        let batches = sink.batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        let failures = batches[0]
            .iter()
            .find(|s| s.name == "pizza_failures")
            .unwrap();
        assert!((failures.value - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_pushes_on_interval() {
        let metrics = Arc::new(Metrics::new());
        let sink = Arc::new(CountingSink::default());
        let reporter = MetricsReporter::start(metrics, sink.clone(), Duration::from_millis(20));

        tokio::time::sleep(Duration::from_millis(110)).await;
        reporter.stop().await;

        // At least one interval push plus the final flush.
        assert!(sink.batches.lock().unwrap().len() >= 2);
    }
}
