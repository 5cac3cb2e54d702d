//! Which hours should be recording right now
//!
//! Pure time arithmetic: [`active_windows`] turns the current instant into the
//! hourly windows whose buffered span contains it, and [`is_scheduled`] checks
//! a stream's own date, weekday and hour-of-day constraints against each one.

pub mod filter;
pub mod window;

pub use filter::is_scheduled;
pub use window::{Buffers, RecordingWindow, active_windows, truncate_to_hour};

use chrono::{DateTime, Utc};

use crate::streams::StreamConfig;

/// Every (stream, window) pair that should be recording at `now`
pub fn plan(
    streams: &[StreamConfig],
    now: DateTime<Utc>,
    buffers: Buffers,
) -> Vec<(&StreamConfig, RecordingWindow)> {
    let windows = active_windows(now, buffers);

    streams
        .iter()
        .flat_map(|stream| {
            windows
                .iter()
                .filter(move |window| is_scheduled(stream, window.hour_start))
                .map(move |window| (stream, *window))
        })
        .collect()
}
