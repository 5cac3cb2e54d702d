//! Lifecycle classification of a single window

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tracing::Level;

use crate::progress::ProgressRecord;
use crate::schedule::RecordingWindow;

/// Why a job is being dispatched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StartKind {
    /// First attempt before the hour begins
    Start,
    /// First attempt after the hour has begun
    Partial,
    /// Startup stalled, hour not yet begun
    Delayed,
    /// Startup stalled after the hour began
    Lapsed,
    /// Heartbeat lost
    Restart,
}

impl StartKind {
    pub fn label(&self) -> &'static str {
        match self {
            StartKind::Start => "start",
            StartKind::Partial => "partial",
            StartKind::Delayed => "delayed",
            StartKind::Lapsed => "lapsed",
            StartKind::Restart => "restart",
        }
    }

    /// Log severity: a stall before the hour warns, anything losing audio errors
    pub fn level(&self) -> Level {
        match self {
            StartKind::Start | StartKind::Partial => Level::INFO,
            StartKind::Delayed => Level::WARN,
            StartKind::Lapsed | StartKind::Restart => Level::ERROR,
        }
    }
}

/// Why nothing is done
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitKind {
    /// Dispatched, worker presumed still booting
    Pending,
    /// Worker heartbeat is fresh
    Running,
}

impl WaitKind {
    pub fn label(&self) -> &'static str {
        match self {
            WaitKind::Pending => "pending",
            WaitKind::Running => "running",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Dispatch { kind: StartKind, attempt: u32 },
    Wait(WaitKind),
}

/// Grace periods before a window is considered stuck
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Graces {
    pub startup: TimeDelta,
    pub heartbeat: TimeDelta,
}

/// Decide what to do with `window` given its latest progress marker.
///
/// A fresh heartbeat means the worker is capturing and wins over everything.
/// Otherwise a set `pending` is judged against the startup grace, so a stall
/// keeps advancing the attempt. A stale heartbeat without `pending`, or a
/// marker with neither field, is a lost worker and restarts at attempt 0.
pub fn decide(
    record: Option<&ProgressRecord>,
    window: &RecordingWindow,
    now: DateTime<Utc>,
    graces: Graces,
) -> Action {
    let Some(record) = record else {
        let kind = if window.has_started(now) {
            StartKind::Partial
        } else {
            StartKind::Start
        };
        return Action::Dispatch { kind, attempt: 0 };
    };

    let heartbeat_fresh = record
        .heartbeat_at()
        .is_some_and(|at| now - at < graces.heartbeat);
    if heartbeat_fresh {
        return Action::Wait(WaitKind::Running);
    }

    if record.pending.is_some() {
        let booting = record
            .pending_at()
            .is_some_and(|at| now - at < graces.startup);
        if booting {
            return Action::Wait(WaitKind::Pending);
        }

        let kind = if window.has_started(now) {
            StartKind::Lapsed
        } else {
            StartKind::Delayed
        };
        return Action::Dispatch {
            kind,
            attempt: record.next_attempt(),
        };
    }

    if let Some(heartbeat) = record.heartbeat {
        tracing::trace!(heartbeat, "Heartbeat is stale");
    }
    restart()
}

fn restart() -> Action {
    Action::Dispatch {
        kind: StartKind::Restart,
        attempt: 0,
    }
}
