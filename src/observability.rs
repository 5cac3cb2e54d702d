//! Observability (tracing setup, reconcile counters)

use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, TelemetryConfig};

/// Install the global tracing subscriber. `RUST_LOG` overrides the configured filter.
pub fn init_tracing(config: &TelemetryConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = match config.log_format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };

    if let Err(e) = result {
        tracing::warn!(error = %e, "Tracing subscriber already installed");
    }
}

/// Counters across every reconciliation pass of this process
#[derive(Debug, Default)]
pub struct Metrics {
    windows_checked: AtomicU64,
    jobs_dispatched: AtomicU64,
    restarts: AtomicU64,
    skipped: AtomicU64,
    failures: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn window_checked(&self) {
        self.windows_checked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn job_dispatched(&self) {
        self.jobs_dispatched.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(counter = "jobs_dispatched", "Metric incremented");
    }

    pub fn restart(&self) {
        self.restarts.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(counter = "restarts", "Metric incremented");
    }

    pub fn skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(counter = "skipped", "Metric incremented");
    }

    pub fn failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(counter = "failures", "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            windows_checked: self.windows_checked.load(Ordering::Relaxed),
            jobs_dispatched: self.jobs_dispatched.load(Ordering::Relaxed),
            restarts: self.restarts.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct MetricsSnapshot {
    pub windows_checked: u64,
    pub jobs_dispatched: u64,
    pub restarts: u64,
    pub skipped: u64,
    pub failures: u64,
}
