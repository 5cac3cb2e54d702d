//! Config fetching against a mock HTTP server

use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tapedeck::streams::{ConfigCache, FetchError, StreamSource};

fn source(server: &MockServer, attempts: usize) -> StreamSource {
    StreamSource::new(
        format!("{}/streams.json", server.uri()),
        vec![Duration::from_millis(500); attempts],
    )
    .unwrap()
}

fn payload() -> serde_json::Value {
    json!([
        {
            "id": 456,
            "podcast_id": 123,
            "gid": "gid://feeder/StreamRecording/456",
            "url": "http://some.where/stream.mp3",
            "callback": "my-queue",
            "record_days": null,
            "record_hours": [22],
            "created_at": "2025-01-01T00:00:00Z"
        },
        {"id": "bad", "record_hours": "all"}
    ])
}

#[tokio::test]
async fn test_fetch_parses_and_caches() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/streams.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(payload()))
        .expect(1)
        .mount(&server)
        .await;

    let cache = ConfigCache::new();
    let streams = source(&server, 3).fetch(&cache).await.unwrap();

    assert_eq!(streams.len(), 1);
    let stream = &streams[0];
    assert_eq!(stream.stream_id.as_deref(), Some("456"));
    assert_eq!(stream.group_id.as_deref(), Some("123"));
    assert_eq!(stream.record_hours, vec![22]);
    assert!(stream.record_days.is_empty());
    assert!(stream.unknown.contains_key("created_at"));

    assert_eq!(cache.get().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_fetch_retries_after_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(payload()))
        .mount(&server)
        .await;

    let streams = source(&server, 2).fetch(&ConfigCache::new()).await.unwrap();
    assert_eq!(streams.len(), 1);
}

#[tokio::test]
async fn test_fetch_retries_after_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(payload())
                .set_delay(Duration::from_secs(2)),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let streams = source(&server, 2).fetch(&ConfigCache::new()).await.unwrap();
    assert!(streams.is_empty());
}

#[tokio::test]
async fn test_non_array_payload_is_an_attempt_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"streams": []})))
        .expect(3)
        .mount(&server)
        .await;

    let result = source(&server, 3).fetch(&ConfigCache::new()).await;
    match result {
        Err(FetchError::Exhausted { attempts, .. }) => assert_eq!(attempts, 3),
        other => panic!("expected exhausted, got {:?}", other.map(|s| s.len())),
    }
}

#[tokio::test]
async fn test_falls_back_to_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(payload()))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let cache = ConfigCache::new();
    let source = source(&server, 2);
    let first = source.fetch(&cache).await.unwrap();
    let second = source.fetch(&cache).await.unwrap();
    assert_eq!(first, second);

    cache.clear().await;
    assert!(matches!(
        source.fetch(&cache).await,
        Err(FetchError::Exhausted { attempts: 2, .. })
    ));
}
