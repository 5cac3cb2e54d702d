//! Per-stream schedule constraints

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeDelta, Timelike, Utc};

use crate::streams::StreamConfig;

/// Midnight UTC at the start of `date`
fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Whether `stream` wants the hour beginning at `hour_start` recorded.
///
/// Constraints are independent and all must hold; an absent constraint never
/// excludes. They apply to the unbuffered hour, so buffers may legitimately
/// spill a recording slightly past the configured date range.
pub fn is_scheduled(stream: &StreamConfig, hour_start: DateTime<Utc>) -> bool {
    if let Some(start_date) = stream.start_date {
        if hour_start < start_of_day(start_date) {
            return false;
        }
    }

    // End date is inclusive: stop at midnight of the following day
    if let Some(end_date) = stream.end_date {
        if hour_start >= start_of_day(end_date) + TimeDelta::days(1) {
            return false;
        }
    }

    if !stream.record_days.is_empty() {
        let weekday = hour_start.weekday().num_days_from_sunday();
        if !stream.record_days.iter().any(|&d| u32::from(d) == weekday) {
            return false;
        }
    }

    if !stream.record_hours.is_empty() {
        let hour = hour_start.hour();
        if !stream.record_hours.iter().any(|&h| u32::from(h) == hour) {
            return false;
        }
    }

    true
}
