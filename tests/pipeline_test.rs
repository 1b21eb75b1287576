//! Tests for the digest-and-persist pipeline and its sinks.

use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use eventq::error::ProcessingError;
use eventq::model::Event;
use eventq::pipeline::{
    EventProcessor, FileSink, MemorySink, PersistenceSink, ProcessingPipeline, digest_hex,
};
use eventq::queue::EventQueue;
use uuid::Uuid;

struct FailingSink;

#[async_trait]
impl PersistenceSink for FailingSink {
    async fn append(&self, _: &[u8]) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))
    }
}

fn instant_pipeline(sink: Arc<dyn PersistenceSink>) -> ProcessingPipeline {
    ProcessingPipeline::new(sink).with_latency(Duration::ZERO, Duration::ZERO)
}

/// Push an event through a queue so it carries an admission timestamp.
fn admitted(event: Event) -> Event {
    let queue = EventQueue::new(1).unwrap();
    queue.enqueue(event).unwrap();
    queue.try_dequeue().unwrap()
}

// ---------------------------------------------------------------------------
// Digest
// ---------------------------------------------------------------------------

#[test]
fn digest_is_lowercase_hex_sha256() {
    assert_eq!(
        digest_hex(b"abc"),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
}

#[tokio::test]
async fn outcome_digests_the_canonical_metadata() {
    let sink = Arc::new(MemorySink::new());
    let pipeline = instant_pipeline(sink.clone());
    let mut event = admitted(Event::log(Uuid::new_v4(), "warn", "disk almost full"));

    let expected = serde_json::to_vec(&event.metadata()).unwrap();
    let outcome = pipeline.process(&mut event).await.unwrap();

    assert_eq!(outcome.digest, digest_hex(&expected));
    assert_eq!(outcome.length, expected.len());
    assert_eq!(outcome.event.id(), event.id());
}

#[tokio::test]
async fn digest_is_stable_across_attempts() {
    let sink = Arc::new(MemorySink::new());
    let pipeline = instant_pipeline(sink.clone());
    let mut event = admitted(Event::metric(Uuid::new_v4(), 0.25));

    let first = pipeline.process(&mut event).await.unwrap();
    let thread_id = event.thread_id().map(str::to_string);
    assert!(thread_id.is_some(), "processing stamps the thread id");

    let second = pipeline.process(&mut event).await.unwrap();
    assert_eq!(first.digest, second.digest);
    assert_eq!(event.thread_id().map(str::to_string), thread_id);
}

#[tokio::test]
async fn pipeline_keeps_a_thread_id_stamped_by_an_earlier_processor() {
    let mut event = admitted(Event::log(Uuid::new_v4(), "info", "stamped"));
    event.assign_thread("custom-worker-7");
    event.assign_thread("ignored");
    assert_eq!(event.thread_id(), Some("custom-worker-7"));

    let pipeline = instant_pipeline(Arc::new(MemorySink::new()));
    let outcome = pipeline.process(&mut event).await.unwrap();
    assert_eq!(outcome.event.thread_id(), Some("custom-worker-7"));
    // The thread id never feeds the digest.
    assert!(!event.metadata().contains_key("thread_id"));
}

#[test]
fn metadata_carries_type_specific_keys() {
    let log = Event::log(Uuid::new_v4(), "info", "hi");
    let keys: Vec<String> = log.metadata().into_keys().collect();
    assert_eq!(
        keys,
        ["created_at", "enqueued_at", "event_id", "event_type", "level", "message"]
    );

    let metric = Event::metric(Uuid::new_v4(), 3.0);
    let meta = metric.metadata();
    assert_eq!(meta["event_type"], "metric");
    assert_eq!(meta["value"], 3.0);
    assert!(meta["enqueued_at"].is_null());
    assert!(!meta.contains_key("level"));
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

#[tokio::test]
async fn record_is_one_json_line() {
    let sink = Arc::new(MemorySink::new());
    let pipeline = instant_pipeline(sink.clone());
    let mut event = admitted(Event::log(Uuid::new_v4(), "error", "oops"));

    pipeline.process(&mut event).await.unwrap();

    let records = sink.records().await;
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.last(), Some(&b'\n'));
    assert_eq!(record.iter().filter(|b| **b == b'\n').count(), 1);

    let value: serde_json::Value = serde_json::from_slice(record).unwrap();
    assert_eq!(value["event"]["id"], event.id().to_string());
    assert_eq!(value["event"]["event_type"], "log");
    assert_eq!(value["event"]["level"], "error");
    assert_eq!(value["digest"].as_str().unwrap().len(), 64);
    assert!(value["processing_time"].as_str().unwrap().contains('.'));
}

#[tokio::test]
async fn sink_failure_is_a_persist_error() {
    let pipeline = instant_pipeline(Arc::new(FailingSink));
    let mut event = admitted(Event::metric(Uuid::new_v4(), 1.0));

    let err = pipeline.process(&mut event).await.unwrap_err();
    assert!(matches!(err, ProcessingError::Persist(ref e) if e.kind() == io::ErrorKind::PermissionDenied));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn file_sink_appends_whole_records_under_concurrency() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.json");
    let sink = Arc::new(FileSink::new(&path));
    assert_eq!(sink.path(), path.as_path());
    let pipeline = Arc::new(instant_pipeline(sink));

    let mut handles = Vec::new();
    for i in 0..25 {
        let pipeline = Arc::clone(&pipeline);
        handles.push(tokio::spawn(async move {
            let mut event = admitted(Event::log(Uuid::new_v4(), "info", format!("line {i}")));
            pipeline.process(&mut event).await.map(|_| ())
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let content = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 25);
    for line in lines {
        let value: serde_json::Value = serde_json::from_str(line).unwrap();
        assert!(value["event"]["message"].as_str().unwrap().starts_with("line "));
    }
}

#[tokio::test]
async fn file_sink_appends_to_an_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.json");
    std::fs::write(&path, "existing\n").unwrap();

    let sink = FileSink::new(&path);
    sink.append(b"next\n").await.unwrap();

    assert_eq!(std::fs::read_to_string(&path).unwrap(), "existing\nnext\n");
}

// ---------------------------------------------------------------------------
// Latency
// ---------------------------------------------------------------------------

#[tokio::test]
async fn simulated_latency_stays_within_bounds() {
    let sink = Arc::new(MemorySink::new());
    // Reversed bounds are normalised.
    let pipeline = ProcessingPipeline::new(sink)
        .with_latency(Duration::from_millis(40), Duration::from_millis(20));

    let mut event = admitted(Event::metric(Uuid::new_v4(), 9.0));
    let started = Instant::now();
    pipeline.process(&mut event).await.unwrap();
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(20), "took {elapsed:?}");
    assert!(elapsed < Duration::from_secs(2), "took {elapsed:?}");
}
