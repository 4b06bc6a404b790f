//! Process-wide metrics aggregation.
//!
//! Counters are lock-free atomics updated from request handlers. The
//! reporter takes a [`MetricsSnapshot`] on every interval; counters are
//! cumulative, latency windows reset on each snapshot.

use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use axum::http::Method;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;

use pizza_core::Price;

/// HTTP methods tracked individually; everything else lands in `other`.
const METHODS: [&str; 5] = ["GET", "POST", "PUT", "DELETE", "other"];

fn method_slot(method: &Method) -> usize {
    match *method {
        Method::GET => 0,
        Method::POST => 1,
        Method::PUT => 2,
        Method::DELETE => 3,
        _ => 4,
    }
}

/// Running latency sum and count, reset on each snapshot.
#[derive(Debug, Default)]
struct LatencyWindow {
    total_micros: AtomicU64,
    count: AtomicU64,
}

impl LatencyWindow {
    fn observe(&self, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.total_micros.fetch_add(micros, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Average latency in milliseconds since the last take, if any samples.
    fn take_average_ms(&self) -> Option<f64> {
        let count = self.count.swap(0, Ordering::Relaxed);
        let total = self.total_micros.swap(0, Ordering::Relaxed);
        if count == 0 {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        Some(total as f64 / count as f64 / 1000.0)
    }
}

/// Aggregated service metrics.
#[derive(Debug, Default)]
pub struct Metrics {
    http_requests: [AtomicU64; METHODS.len()],
    auth_success: AtomicU64,
    auth_failure: AtomicU64,
    active_sessions: AtomicI64,
    pizzas_sold: AtomicU64,
    fulfillment_failures: AtomicU64,
    revenue: Mutex<Decimal>,
    logs_dropped: AtomicU64,
    service_latency: LatencyWindow,
    factory_latency: LatencyWindow,
}

impl Metrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self, method: &Method) {
        self.http_requests[method_slot(method)].fetch_add(1, Ordering::Relaxed);
    }

    /// Record a login or registration attempt.
    pub fn record_auth(&self, success: bool) {
        if success {
            self.auth_success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.auth_failure.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn session_opened(&self) {
        self.active_sessions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_closed(&self) {
        self.active_sessions.fetch_sub(1, Ordering::Relaxed);
    }

    /// Record a fulfilled order.
    pub fn record_sale(&self, pizzas: usize, revenue: Price) {
        self.pizzas_sold
            .fetch_add(u64::try_from(pizzas).unwrap_or(u64::MAX), Ordering::Relaxed);
        let mut total = self
            .revenue
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *total = total.saturating_add(revenue.amount());
    }

    pub fn record_fulfillment_failure(&self) {
        self.fulfillment_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_log_dropped(&self) {
        self.logs_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn observe_service_latency(&self, elapsed: Duration) {
        self.service_latency.observe(elapsed);
    }

    pub fn observe_factory_latency(&self, elapsed: Duration) {
        self.factory_latency.observe(elapsed);
    }

    /// Read all counters and drain the latency windows.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let revenue = *self
            .revenue
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        MetricsSnapshot {
            http_requests: METHODS
                .iter()
                .zip(&self.http_requests)
                .map(|(method, count)| (*method, count.load(Ordering::Relaxed)))
                .collect(),
            auth_success: self.auth_success.load(Ordering::Relaxed),
            auth_failure: self.auth_failure.load(Ordering::Relaxed),
            active_sessions: self.active_sessions.load(Ordering::Relaxed).max(0),
            pizzas_sold: self.pizzas_sold.load(Ordering::Relaxed),
            fulfillment_failures: self.fulfillment_failures.load(Ordering::Relaxed),
            revenue,
            logs_dropped: self.logs_dropped.load(Ordering::Relaxed),
            service_latency_ms: self.service_latency.take_average_ms(),
            factory_latency_ms: self.factory_latency.take_average_ms(),
        }
    }
}

/// Point-in-time view of [`Metrics`].
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSnapshot {
    pub http_requests: Vec<(&'static str, u64)>,
    pub auth_success: u64,
    pub auth_failure: u64,
    pub active_sessions: i64,
    pub pizzas_sold: u64,
    pub fulfillment_failures: u64,
    pub revenue: Decimal,
    pub logs_dropped: u64,
    pub service_latency_ms: Option<f64>,
    pub factory_latency_ms: Option<f64>,
}

/// A single named measurement, as pushed to the metrics endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSample {
    pub name: &'static str,
    pub value: f64,
    pub unit: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<&'static str>,
}

impl MetricSample {
    const fn new(name: &'static str, value: f64, unit: &'static str) -> Self {
        Self {
            name,
            value,
            unit,
            method: None,
        }
    }
}

impl MetricsSnapshot {
    /// Flatten into samples. Latency samples are omitted for empty windows.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn samples(&self) -> Vec<MetricSample> {
        let mut samples: Vec<MetricSample> = self
            .http_requests
            .iter()
            .map(|(method, count)| MetricSample {
                method: Some(*method),
                ..MetricSample::new("http_requests", *count as f64, "1")
            })
            .collect();

        let total: u64 = self.http_requests.iter().map(|(_, c)| c).sum();
        samples.extend([
            MetricSample::new("http_requests_total", total as f64, "1"),
            MetricSample::new("auth_success", self.auth_success as f64, "1"),
            MetricSample::new("auth_failure", self.auth_failure as f64, "1"),
            MetricSample::new("active_sessions", self.active_sessions as f64, "1"),
            MetricSample::new("pizzas_sold", self.pizzas_sold as f64, "1"),
            MetricSample::new("pizza_failures", self.fulfillment_failures as f64, "1"),
            MetricSample::new("revenue", self.revenue.to_f64().unwrap_or_default(), "btc"),
            MetricSample::new("logs_dropped", self.logs_dropped as f64, "1"),
        ]);

        if let Some(ms) = self.service_latency_ms {
            samples.push(MetricSample::new("service_latency", ms, "ms"));
        }
        if let Some(ms) = self.factory_latency_ms {
            samples.push(MetricSample::new("pizza_creation_latency", ms, "ms"));
        }

        samples
    }
}
