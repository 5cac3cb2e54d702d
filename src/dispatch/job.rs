//! Job descriptors understood by the recording worker

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::progress::ArtifactKey;
use crate::schedule::RecordingWindow;
use crate::streams::StreamConfig;

/// Static parts of every job, taken from configuration
#[derive(Debug, Clone)]
pub struct JobTemplate {
    pub bucket: String,
    pub destination_mode: String,
    pub callback_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDescriptor {
    #[serde(rename = "Job")]
    pub job: Job,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Job {
    pub id: String,
    pub tasks: Vec<Task>,
    pub callbacks: Vec<Callback>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(rename = "FFmpeg")]
    pub ffmpeg: FfmpegTask,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FfmpegTask {
    pub inputs: String,
    pub outputs: Vec<Output>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Output {
    pub format: String,
    pub destination: Destination,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Destination {
    pub mode: String,
    pub bucket_name: String,
    pub object_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Callback {
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(rename = "Queue")]
    pub queue: String,
}

impl JobDescriptor {
    pub fn id(&self) -> &str {
        &self.job.id
    }

    /// Recording length requested from the worker, in seconds
    pub fn duration_secs(&self) -> Option<i64> {
        let inputs = &self.job.tasks.first()?.ffmpeg.inputs;
        inputs
            .strip_prefix("-t ")?
            .split_whitespace()
            .next()?
            .parse()
            .ok()
    }
}

/// Whole seconds left until `window_stop`, rounded half away from zero
pub fn remaining_secs(window_stop: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let millis = (window_stop - now).num_milliseconds();
    (millis as f64 / 1000.0).round() as i64
}

/// Describe a recording of `stream` from `now` until the window closes.
///
/// Returns `None` when there is nothing to record: the window has already
/// fully elapsed, or the stream has no source URL.
pub fn format_job(
    template: &JobTemplate,
    stream: &StreamConfig,
    window: &RecordingWindow,
    artifact: &ArtifactKey,
    now: DateTime<Utc>,
) -> Option<JobDescriptor> {
    let url = stream.url.as_deref().filter(|url| !url.is_empty())?;
    if window.has_elapsed(now) {
        return None;
    }

    let duration = remaining_secs(window.window_stop, now);

    let callbacks = stream
        .callback
        .iter()
        .filter(|queue| !queue.is_empty())
        .map(|queue| Callback {
            kind: template.callback_type.clone(),
            queue: queue.clone(),
        })
        .collect();

    Some(JobDescriptor {
        job: Job {
            id: stream
                .global_id
                .clone()
                .unwrap_or_else(|| artifact.name.clone()),
            tasks: vec![Task {
                kind: "FFmpeg".to_string(),
                ffmpeg: FfmpegTask {
                    inputs: format!("-t {} -i \"{}\"", duration, url),
                    outputs: vec![Output {
                        format: artifact.format().to_string(),
                        destination: Destination {
                            mode: template.destination_mode.clone(),
                            bucket_name: template.bucket.clone(),
                            object_key: artifact.object_key(),
                        },
                    }],
                },
            }],
            callbacks,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::KeyLayout;
    use crate::schedule::Buffers;
    use chrono::TimeDelta;
    use serde_json::json;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn template() -> JobTemplate {
        JobTemplate {
            bucket: "my-bucket".to_string(),
            destination_mode: "AWS/S3".to_string(),
            callback_type: "AWS/SQS".to_string(),
        }
    }

    fn stream() -> StreamConfig {
        StreamConfig {
            group_id: Some("123".to_string()),
            stream_id: Some("456".to_string()),
            global_id: Some("gid://feeder/StreamRecording/456".to_string()),
            url: Some("http://some.where/my-stream.mp3".to_string()),
            callback: Some("https://sqs.us-east-1.amazonaws.com/1234/my_callback".to_string()),
            ..Default::default()
        }
    }

    fn window() -> RecordingWindow {
        // 20:55 -> 22:05
        RecordingWindow::new(
            at("2025-12-09T21:00:00Z"),
            Buffers::new(TimeDelta::minutes(5), TimeDelta::minutes(5)),
        )
    }

    fn artifact() -> ArtifactKey {
        KeyLayout::new(None, ".progress").new_artifact(&stream(), window().hour_start, "mp3")
    }

    #[test]
    fn test_format_job() {
        let artifact = artifact();
        let job = format_job(&template(), &stream(), &window(), &artifact, window().window_start)
            .unwrap();

        assert_eq!(job.id(), "gid://feeder/StreamRecording/456");
        assert_eq!(job.duration_secs(), Some(4200));

        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(
            value,
            json!({
                "Job": {
                    "Id": "gid://feeder/StreamRecording/456",
                    "Tasks": [{
                        "Type": "FFmpeg",
                        "FFmpeg": {
                            "Inputs": "-t 4200 -i \"http://some.where/my-stream.mp3\"",
                            "Outputs": [{
                                "Format": "mp3",
                                "Destination": {
                                    "Mode": "AWS/S3",
                                    "BucketName": "my-bucket",
                                    "ObjectKey": artifact.object_key(),
                                }
                            }]
                        }
                    }],
                    "Callbacks": [{
                        "Type": "AWS/SQS",
                        "Queue": "https://sqs.us-east-1.amazonaws.com/1234/my_callback",
                    }]
                }
            })
        );
    }

    #[test]
    fn test_duration_is_relative_to_now() {
        let now = at("2025-12-09T21:30:00.400Z");
        let job = format_job(&template(), &stream(), &window(), &artifact(), now).unwrap();
        // 35 minutes minus 0.4s rounds to the nearest second
        assert_eq!(job.duration_secs(), Some(2100));

        let now = at("2025-12-09T21:30:00.500Z");
        let job = format_job(&template(), &stream(), &window(), &artifact(), now).unwrap();
        assert_eq!(job.duration_secs(), Some(2100));

        let now = at("2025-12-09T21:30:00.501Z");
        let job = format_job(&template(), &stream(), &window(), &artifact(), now).unwrap();
        assert_eq!(job.duration_secs(), Some(2099));
    }

    #[test]
    fn test_no_job_once_window_elapsed() {
        let stop = window().window_stop;

        assert!(format_job(&template(), &stream(), &window(), &artifact(), stop).is_none());
        assert!(
            format_job(
                &template(),
                &stream(),
                &window(),
                &artifact(),
                stop + TimeDelta::milliseconds(1)
            )
            .is_none()
        );

        let job = format_job(
            &template(),
            &stream(),
            &window(),
            &artifact(),
            stop - TimeDelta::milliseconds(1),
        )
        .unwrap();
        assert_eq!(job.duration_secs(), Some(0));
    }

    #[test]
    fn test_no_job_without_url() {
        let mut stream = stream();
        stream.url = None;
        let now = window().window_start;
        assert!(format_job(&template(), &stream, &window(), &artifact(), now).is_none());
    }

    #[test]
    fn test_fallback_id_and_no_callbacks() {
        let mut stream = stream();
        stream.global_id = None;
        stream.callback = None;
        let artifact = artifact();

        let job = format_job(&template(), &stream, &window(), &artifact, window().window_start)
            .unwrap();
        assert_eq!(job.id(), artifact.name);
        assert!(job.job.callbacks.is_empty());
    }
}
