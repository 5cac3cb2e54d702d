//! Hourly recording windows

use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use serde::Serialize;

use crate::config::ScheduleConfig;

/// Start/end padding applied around every hour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Buffers {
    pub start: TimeDelta,
    pub end: TimeDelta,
}

impl Buffers {
    pub fn new(start: TimeDelta, end: TimeDelta) -> Self {
        Self { start, end }
    }

    pub fn none() -> Self {
        Self::default()
    }
}

impl From<&ScheduleConfig> for Buffers {
    fn from(config: &ScheduleConfig) -> Self {
        Self::new(
            config.buffer_start.as_time_delta(),
            config.buffer_end.as_time_delta(),
        )
    }
}

/// One hour-aligned recording interval, padded by [`Buffers`].
///
/// Derived fresh on every pass and never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RecordingWindow {
    pub hour_start: DateTime<Utc>,
    pub window_start: DateTime<Utc>,
    pub window_stop: DateTime<Utc>,
}

impl RecordingWindow {
    pub fn new(hour_start: DateTime<Utc>, buffers: Buffers) -> Self {
        Self {
            hour_start,
            window_start: hour_start - buffers.start,
            window_stop: hour_start + TimeDelta::hours(1) + buffers.end,
        }
    }

    /// Unbuffered end of the hour
    pub fn hour_end(&self) -> DateTime<Utc> {
        self.hour_start + TimeDelta::hours(1)
    }

    /// The nominal hour has already begun at `now`
    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        self.hour_start < now
    }

    /// Nothing is left to record at `now`
    pub fn has_elapsed(&self, now: DateTime<Utc>) -> bool {
        self.window_stop <= now
    }
}

/// Truncate to the top of the UTC hour
pub fn truncate_to_hour(instant: DateTime<Utc>) -> DateTime<Utc> {
    // Rounding only fails for instants at the edge of the representable range
    instant
        .duration_trunc(TimeDelta::hours(1))
        .unwrap_or(instant)
}

/// Windows whose buffered span contains `now`, earliest first.
///
/// The candidate hour is taken from `now - buffers.end`, so an hour whose end
/// buffer is still draining stays in scope after the clock rolls over. The
/// following hour joins once its start buffer has opened. With buffers summing
/// to less than an hour this yields one or two windows; with zero buffers it
/// is exactly the current hour.
pub fn active_windows(now: DateTime<Utc>, buffers: Buffers) -> Vec<RecordingWindow> {
    let h1 = truncate_to_hour(now - buffers.end);
    let h2 = h1 + TimeDelta::hours(1);

    let mut windows = Vec::with_capacity(2);

    let current = RecordingWindow::new(h1, buffers);
    if current.window_stop > now {
        windows.push(current);
    }

    let next = RecordingWindow::new(h2, buffers);
    if next.window_start <= now {
        windows.push(next);
    }

    windows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn hours(now: &str, buffers: Buffers) -> Vec<DateTime<Utc>> {
        active_windows(at(now), buffers)
            .into_iter()
            .map(|w| w.hour_start)
            .collect()
    }

    fn secs(start: i64, end: i64) -> Buffers {
        Buffers::new(TimeDelta::seconds(start), TimeDelta::seconds(end))
    }

    #[test]
    fn test_no_buffers_returns_current_hour() {
        let h1 = at("2025-12-09T21:00:00Z");
        let h2 = at("2025-12-09T22:00:00Z");

        assert_eq!(hours("2025-12-09T21:00:00Z", Buffers::none()), vec![h1]);
        assert_eq!(hours("2025-12-09T21:59:59.999Z", Buffers::none()), vec![h1]);
        assert_eq!(hours("2025-12-09T22:00:00Z", Buffers::none()), vec![h2]);
        assert_eq!(hours("2025-12-09T22:12:34.567Z", Buffers::none()), vec![h2]);
    }

    #[test]
    fn test_start_buffer_overlap() {
        let h1 = at("2025-12-09T21:00:00Z");
        let h2 = at("2025-12-09T22:00:00Z");
        let buffers = secs(120, 0);

        assert_eq!(hours("2025-12-09T21:00:00Z", buffers), vec![h1]);
        assert_eq!(hours("2025-12-09T21:57:59.999Z", buffers), vec![h1]);
        assert_eq!(hours("2025-12-09T21:58:00Z", buffers), vec![h1, h2]);
        assert_eq!(hours("2025-12-09T21:59:59.999Z", buffers), vec![h1, h2]);
        assert_eq!(hours("2025-12-09T22:00:00Z", buffers), vec![h2]);
    }

    #[test]
    fn test_end_buffer_keeps_previous_hour() {
        let h1 = at("2025-12-09T21:00:00Z");
        let h2 = at("2025-12-09T22:00:00Z");
        let buffers = secs(0, 60);

        assert_eq!(hours("2025-12-09T21:59:59Z", buffers), vec![h1]);
        assert_eq!(hours("2025-12-09T22:00:00Z", buffers), vec![h1, h2]);
        assert_eq!(hours("2025-12-09T22:00:59.999Z", buffers), vec![h1, h2]);
        assert_eq!(hours("2025-12-09T22:01:00Z", buffers), vec![h2]);
    }

    #[test]
    fn test_window_bounds() {
        let windows = active_windows(at("2025-12-09T21:58:00Z"), secs(120, 5));
        assert_eq!(windows.len(), 2);

        assert_eq!(windows[0].hour_start, at("2025-12-09T21:00:00Z"));
        assert_eq!(windows[0].window_start, at("2025-12-09T20:58:00Z"));
        assert_eq!(windows[0].window_stop, at("2025-12-09T22:00:05Z"));

        assert_eq!(windows[1].hour_start, at("2025-12-09T22:00:00Z"));
        assert_eq!(windows[1].window_start, at("2025-12-09T21:58:00Z"));
        assert_eq!(windows[1].window_stop, at("2025-12-09T23:00:05Z"));
        assert_eq!(windows[1].hour_end(), at("2025-12-09T23:00:00Z"));
    }

    #[test]
    fn test_started_and_elapsed() {
        let window = RecordingWindow::new(at("2025-12-09T22:00:00Z"), secs(120, 60));

        assert!(!window.has_started(at("2025-12-09T21:59:00Z")));
        assert!(!window.has_started(at("2025-12-09T22:00:00Z")));
        assert!(window.has_started(at("2025-12-09T22:00:00.001Z")));

        assert!(!window.has_elapsed(at("2025-12-09T23:00:59.999Z")));
        assert!(window.has_elapsed(at("2025-12-09T23:01:00Z")));
    }
}
