//! Telemetry sinks.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::json;
use url::Url;

use super::TelemetryError;
use super::logs::LogEvent;
use super::metrics::MetricSample;
use crate::config::TelemetryConfig;

/// Destination for metric batches and log batches.
///
/// Sinks report failures; the caller logs and drops them.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn push_metrics(&self, samples: &[MetricSample]) -> Result<(), TelemetryError>;

    async fn push_logs(&self, events: &[LogEvent]) -> Result<(), TelemetryError>;
}

/// Writes telemetry to the local `tracing` output.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

#[async_trait]
impl TelemetrySink for TracingSink {
    async fn push_metrics(&self, samples: &[MetricSample]) -> Result<(), TelemetryError> {
        for sample in samples {
            tracing::debug!(
                target: "pizza_service::metrics",
                name = sample.name,
                value = sample.value,
                unit = sample.unit,
                method = sample.method,
                "metric"
            );
        }
        Ok(())
    }

    async fn push_logs(&self, events: &[LogEvent]) -> Result<(), TelemetryError> {
        for event in events {
            tracing::debug!(
                target: "pizza_service::events",
                kind = event.kind,
                level = event.level.as_str(),
                fields = %event.fields,
                "event"
            );
        }
        Ok(())
    }
}

/// Pushes telemetry as JSON over HTTP.
///
/// Metrics go to `metrics_url` as `{"source", "metrics": [...]}`; logs go to
/// `logs_url` as Loki-style streams. A kind without a URL is dropped.
#[derive(Clone)]
pub struct HttpTelemetrySink {
    client: Client,
    metrics_url: Option<Url>,
    logs_url: Option<Url>,
    api_key: Option<SecretString>,
    source: String,
}

impl std::fmt::Debug for HttpTelemetrySink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTelemetrySink")
            .field("metrics_url", &self.metrics_url.as_ref().map(Url::as_str))
            .field("logs_url", &self.logs_url.as_ref().map(Url::as_str))
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct MetricsBody<'a> {
    source: &'a str,
    metrics: &'a [MetricSample],
}

impl HttpTelemetrySink {
    /// Build a sink from configuration.
    ///
    /// # Errors
    ///
    /// Returns `TelemetryError::Request` if the HTTP client cannot be built.
    pub fn new(config: &TelemetryConfig) -> Result<Self, TelemetryError> {
        let client = Client::builder().timeout(Duration::from_secs(5)).build()?;

        Ok(Self {
            client,
            metrics_url: config.metrics_url.clone(),
            logs_url: config.logs_url.clone(),
            api_key: config.api_key.clone(),
            source: config.source.clone(),
        })
    }

    async fn post(&self, url: &Url, body: &serde_json::Value) -> Result<(), TelemetryError> {
        let mut request = self.client.post(url.clone()).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TelemetryError::Status(status.as_u16()));
        }
        Ok(())
    }

    /// Group events into one stream per (level, kind) label set.
    fn log_streams(&self, events: &[LogEvent]) -> serde_json::Value {
        let mut streams: BTreeMap<(&str, &str), Vec<[String; 2]>> = BTreeMap::new();
        for event in events {
            let nanos = event
                .timestamp
                .timestamp_nanos_opt()
                .unwrap_or_default()
                .to_string();
            streams
                .entry((event.level.as_str(), event.kind))
                .or_default()
                .push([nanos, event.fields.to_string()]);
        }

        let streams: Vec<serde_json::Value> = streams
            .into_iter()
            .map(|((level, kind), values)| {
                json!({
                    "stream": { "component": self.source, "level": level, "type": kind },
                    "values": values,
                })
            })
            .collect();

        json!({ "streams": streams })
    }
}

#[async_trait]
impl TelemetrySink for HttpTelemetrySink {
    async fn push_metrics(&self, samples: &[MetricSample]) -> Result<(), TelemetryError> {
        let Some(url) = &self.metrics_url else {
            return Ok(());
        };
        let body = serde_json::to_value(MetricsBody {
            source: &self.source,
            metrics: samples,
        })?;
        self.post(url, &body).await
    }

    async fn push_logs(&self, events: &[LogEvent]) -> Result<(), TelemetryError> {
        let Some(url) = &self.logs_url else {
            return Ok(());
        };
        if events.is_empty() {
            return Ok(());
        }
        self.post(url, &self.log_streams(events)).await
    }
}
