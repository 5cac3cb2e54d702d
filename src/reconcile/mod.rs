//! Reconciliation of scheduled windows against their progress markers
//!
//! One pass: plan every (stream, window) unit that should be recording, read
//! each unit's latest marker, classify it with [`decide`], and dispatch a job
//! when the unit has never started, stalled during startup, or lost its
//! heartbeat. Units are independent; a failure in one is logged and counted
//! without affecting the others.

pub mod decision;

pub use decision::{Action, Graces, StartKind, WaitKind, decide};

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{Level, debug, error, info, warn};

use crate::config::Config;
use crate::dispatch::{DispatchError, Dispatcher, JobTemplate, format_job};
use crate::observability::Metrics;
use crate::progress::{ProgressError, ProgressRecord, ProgressStore, audio_format};
use crate::schedule::{Buffers, RecordingWindow, plan};
use crate::streams::{ConfigCache, FetchError, StreamConfig, StreamSource};

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Progress error: {0}")]
    Progress(#[from] ProgressError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Reconcile task aborted: {0}")]
    Aborted(String),
}

/// Timing knobs for a pass
#[derive(Debug, Clone, Copy)]
pub struct ReconcileSettings {
    pub buffers: Buffers,
    pub graces: Graces,
    pub max_concurrency: usize,
}

impl ReconcileSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            buffers: Buffers::from(&config.schedule),
            graces: Graces {
                startup: config.schedule.startup_grace.as_time_delta(),
                heartbeat: config.schedule.heartbeat_grace.as_time_delta(),
            },
            max_concurrency: config.server.max_concurrency.max(1),
        }
    }
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            buffers: Buffers::none(),
            graces: Graces {
                startup: TimeDelta::seconds(120),
                heartbeat: TimeDelta::seconds(60),
            },
            max_concurrency: 16,
        }
    }
}

/// What happened to one unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum Outcome {
    /// A job went out and a pending marker was written
    Dispatched {
        kind: StartKind,
        attempt: u32,
        channel: usize,
        job_id: String,
    },
    /// The unit needed a job but there was nothing left to record
    Skipped { kind: StartKind },
    /// Nothing to do this pass
    Waiting { kind: WaitKind },
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Dispatched { kind, .. } | Outcome::Skipped { kind } => kind.label(),
            Outcome::Waiting { kind } => kind.label(),
        }
    }
}

/// Result of one (stream, window) unit
#[derive(Debug, Clone, Serialize)]
pub struct UnitReport {
    pub stream: String,
    pub hour_start: DateTime<Utc>,
    #[serde(flatten)]
    pub outcome: Option<Outcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Everything one pass did, in plan order
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileReport {
    pub units: Vec<UnitReport>,
}

impl ReconcileReport {
    pub fn dispatched(&self) -> usize {
        self.units
            .iter()
            .filter(|u| matches!(u.outcome, Some(Outcome::Dispatched { .. })))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.units.iter().filter(|u| u.error.is_some()).count()
    }
}

/// Drives windows toward a running recording
#[derive(Clone)]
pub struct Reconciler {
    progress: ProgressStore,
    dispatcher: Dispatcher,
    template: JobTemplate,
    default_format: String,
    settings: ReconcileSettings,
    metrics: Arc<Metrics>,
}

impl Reconciler {
    pub fn new(
        progress: ProgressStore,
        dispatcher: Dispatcher,
        template: JobTemplate,
        default_format: impl Into<String>,
        settings: ReconcileSettings,
    ) -> Self {
        Self {
            progress,
            dispatcher,
            template,
            default_format: default_format.into(),
            settings,
            metrics: Arc::new(Metrics::new()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Fetch the stream list, then reconcile it at the current instant.
    ///
    /// Only a config fetch with no cache to fall back on fails the pass.
    pub async fn run(
        &self,
        source: &StreamSource,
        cache: &ConfigCache,
    ) -> Result<ReconcileReport, FetchError> {
        let streams = source.fetch(cache).await?;
        Ok(self.reconcile(&streams, Utc::now()).await)
    }

    /// Reconcile every unit scheduled at `now`, at most
    /// `max_concurrency` at a time
    pub async fn reconcile(&self, streams: &[StreamConfig], now: DateTime<Utc>) -> ReconcileReport {
        let units: Vec<(StreamConfig, RecordingWindow)> = plan(streams, now, self.settings.buffers)
            .into_iter()
            .map(|(stream, window)| (stream.clone(), window))
            .collect();

        debug!(
            streams = streams.len(),
            units = units.len(),
            %now,
            "Reconcile pass planned"
        );

        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for (index, (stream, window)) in units.iter().cloned().enumerate() {
            let this = self.clone();
            let semaphore = semaphore.clone();
            tasks.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => this.reconcile_window(&stream, &window, now).await,
                    Err(e) => Err(ReconcileError::Aborted(e.to_string())),
                };
                (index, result)
            });
        }

        let mut results: Vec<Option<Result<Outcome, ReconcileError>>> =
            (0..units.len()).map(|_| None).collect();

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(e) => error!(error = %e, "Reconcile task panicked"),
            }
        }

        let units = units
            .into_iter()
            .zip(results)
            .map(|((stream, window), result)| {
                let result = result
                    .unwrap_or_else(|| Err(ReconcileError::Aborted("task did not complete".into())));
                self.report_unit(&stream, &window, result)
            })
            .collect();

        ReconcileReport { units }
    }

    fn report_unit(
        &self,
        stream: &StreamConfig,
        window: &RecordingWindow,
        result: Result<Outcome, ReconcileError>,
    ) -> UnitReport {
        let (outcome, error) = match result {
            Ok(outcome) => (Some(outcome), None),
            Err(e) => {
                self.metrics.failure();
                error!(
                    stream = %stream.label(),
                    url = stream.url.as_deref().unwrap_or_default(),
                    hour = %window.hour_start,
                    error = %e,
                    "Recording error"
                );
                (None, Some(e.to_string()))
            }
        };

        UnitReport {
            stream: stream.label(),
            hour_start: window.hour_start,
            outcome,
            error,
        }
    }

    /// Reconcile a single unit
    pub async fn reconcile_window(
        &self,
        stream: &StreamConfig,
        window: &RecordingWindow,
        now: DateTime<Utc>,
    ) -> Result<Outcome, ReconcileError> {
        self.metrics.window_checked();

        let layout = self.progress.layout();
        let prefix = layout.window_prefix(stream, window.hour_start);
        let record = self.progress.read(&prefix).await?;

        let (kind, attempt) = match decide(record.as_ref(), window, now, self.settings.graces) {
            Action::Wait(kind) => {
                info!(
                    stream = %stream.label(),
                    hour = %window.hour_start,
                    prefix = %prefix,
                    "Recording {}",
                    kind.label()
                );
                return Ok(Outcome::Waiting { kind });
            }
            Action::Dispatch { kind, attempt } => (kind, attempt),
        };

        log_start(stream, window, kind, attempt, &prefix);
        if kind == StartKind::Restart {
            self.metrics.restart();
        }

        let format = stream
            .url
            .as_deref()
            .map(|url| audio_format(url, &self.default_format))
            .unwrap_or_else(|| self.default_format.clone());
        let artifact = layout.new_artifact(stream, window.hour_start, &format);
        let job = format_job(&self.template, stream, window, &artifact, now);

        let Some(channel) = self.dispatcher.send(job.as_ref(), attempt).await? else {
            debug!(
                stream = %stream.label(),
                hour = %window.hour_start,
                has_url = stream.url.is_some(),
                "Nothing to record, skipping dispatch"
            );
            self.metrics.skipped();
            return Ok(Outcome::Skipped { kind });
        };

        self.progress
            .write(&artifact, &ProgressRecord::dispatched(now, attempt))
            .await?;
        self.metrics.job_dispatched();

        let job_id = job.map(|job| job.job.id).unwrap_or_default();
        debug!(
            stream = %stream.label(),
            job_id = %job_id,
            attempt,
            channel,
            marker = %artifact.marker_key(),
            "Recording dispatched"
        );

        Ok(Outcome::Dispatched {
            kind,
            attempt,
            channel,
            job_id,
        })
    }
}

fn log_start(
    stream: &StreamConfig,
    window: &RecordingWindow,
    kind: StartKind,
    attempt: u32,
    prefix: &str,
) {
    let stream = stream.label();
    let hour = window.hour_start;
    let level = kind.level();
    if level == Level::ERROR {
        error!(%stream, %hour, attempt, prefix, "Recording {}", kind.label())
    } else if level == Level::WARN {
        warn!(%stream, %hour, attempt, prefix, "Recording {}", kind.label())
    } else {
        info!(%stream, %hour, attempt, prefix, "Recording {}", kind.label())
    }
}
