//! Structured log events and their non-blocking shipper.
//!
//! Request handlers hand events to a [`LogSender`], which never waits: the
//! queue is bounded and, once full, newly submitted events are dropped and
//! counted in [`Metrics`]. A background task drains the queue in batches
//! and pushes them to the configured [`TelemetrySink`].

use std::sync::{Arc, LazyLock};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::metrics::Metrics;
use super::sink::TelemetrySink;

/// Maximum events pushed in one sink call.
const BATCH_SIZE: usize = 64;

/// Replacement for redacted values.
const REDACTED: &str = "*****";

/// Object keys whose values are always redacted.
const SENSITIVE_KEYS: &[&str] = &["password", "token", "jwt", "authorization", "api_key", "apiKey"];

static BEARER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)bearer\s+[A-Za-z0-9._~+/=-]+").expect("Invalid regex")
});

static PASSWORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)"password"\s*:\s*"[^"]*""#).expect("Invalid regex")
});

/// Event severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl LogLevel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Level for an HTTP response status.
    #[must_use]
    pub const fn for_status(status: u16) -> Self {
        match status {
            500.. => Self::Error,
            400..=499 => Self::Warn,
            _ => Self::Info,
        }
    }
}

/// A structured, already-redacted log event.
#[derive(Debug, Clone)]
pub struct LogEvent {
    /// Event category (`http`, `factory`, ...).
    pub kind: &'static str,
    pub level: LogLevel,
    pub timestamp: DateTime<Utc>,
    pub fields: Value,
}

impl LogEvent {
    /// Create an event, redacting credentials from `fields`.
    #[must_use]
    pub fn new(kind: &'static str, level: LogLevel, mut fields: Value) -> Self {
        redact(&mut fields);
        Self {
            kind,
            level,
            timestamp: Utc::now(),
            fields,
        }
    }
}

/// Strip passwords and bearer tokens from a JSON value, in place.
pub fn redact(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, field) in map.iter_mut() {
                if SENSITIVE_KEYS.iter().any(|k| k.eq_ignore_ascii_case(key)) {
                    *field = Value::String(REDACTED.to_string());
                } else {
                    redact(field);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact),
        Value::String(s) => {
            if BEARER_RE.is_match(s.as_str()) || PASSWORD_RE.is_match(s.as_str()) {
                let cleaned = BEARER_RE.replace_all(s.as_str(), format!("Bearer {REDACTED}"));
                let cleaned = PASSWORD_RE
                    .replace_all(&cleaned, format!(r#""password": "{REDACTED}""#))
                    .into_owned();
                *s = cleaned;
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

/// Cheap handle for submitting events.
#[derive(Debug, Clone)]
pub struct LogSender {
    tx: mpsc::Sender<LogEvent>,
    metrics: Arc<Metrics>,
}

impl LogSender {
    /// Queue an event without waiting.
    ///
    /// Returns `false` if the event was dropped because the queue is full or
    /// the shipper has stopped.
    pub fn submit(&self, event: LogEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_) | mpsc::error::TrySendError::Closed(_)) => {
                self.metrics.record_log_dropped();
                false
            }
        }
    }
}

/// Background task that drains the log queue into a sink.
#[derive(Debug)]
pub struct LogShipper {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl LogShipper {
    /// Spawn the shipper with a queue bounded at `capacity` events.
    pub fn start(
        sink: Arc<dyn TelemetrySink>,
        capacity: usize,
        metrics: Arc<Metrics>,
    ) -> (Self, LogSender) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(rx, sink, cancel.clone()));

        (Self { cancel, handle }, LogSender { tx, metrics })
    }

    /// Stop accepting events, push whatever is queued, and wait for the task.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            warn!(error = %e, "Log shipper task failed");
        }
    }
}

async fn run(
    mut rx: mpsc::Receiver<LogEvent>,
    sink: Arc<dyn TelemetrySink>,
    cancel: CancellationToken,
) {
    let mut batch = Vec::with_capacity(BATCH_SIZE);

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            received = rx.recv_many(&mut batch, BATCH_SIZE) => {
                if received == 0 {
                    // Every sender is gone.
                    return;
                }
                push(sink.as_ref(), &mut batch).await;
            }
        }
    }

    rx.close();
    while rx.recv_many(&mut batch, BATCH_SIZE).await > 0 {
        push(sink.as_ref(), &mut batch).await;
    }
    debug!("Log shipper stopped");
}

async fn push(sink: &dyn TelemetrySink, batch: &mut Vec<LogEvent>) {
    if let Err(e) = sink.push_logs(batch).await {
        warn!(error = %e, events = batch.len(), "Failed to ship log events");
    }
    batch.clear();
}
