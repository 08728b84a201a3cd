//! Pipeline tests driving the shipper against a scripted mock sink.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use logship::config::FlushConfig;
use logship::queue::{RecordSender, record_queue};
use logship::record::{HttpLogRecord, RequestSnapshot};
use logship::shipper::Shipper;
use logship::sink::{BulkOutcome, RecordFailure, Sink, SinkError};

/// One scripted response; the mock answers `Success` once the script runs out.
enum Step {
    Success,
    Partial(usize),
    Transient,
    Fatal,
}

#[derive(Clone, Default)]
struct MockSink {
    /// Request paths of every record per bulk call, in call order.
    calls: Arc<Mutex<Vec<Vec<String>>>>,
    script: Arc<Mutex<VecDeque<Step>>>,
}

impl MockSink {
    fn scripted(steps: Vec<Step>) -> Self {
        Self {
            calls: Arc::default(),
            script: Arc::new(Mutex::new(steps.into())),
        }
    }

    fn call_sizes(&self) -> Vec<usize> {
        self.calls.lock().unwrap().iter().map(Vec::len).collect()
    }

    fn shipped_paths(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().flatten().cloned().collect()
    }
}

#[async_trait]
impl Sink for MockSink {
    async fn bulk_write(&self, batch: &[HttpLogRecord]) -> Result<BulkOutcome, SinkError> {
        self.calls
            .lock()
            .unwrap()
            .push(batch.iter().map(|r| r.request_path.clone()).collect());
        match self.script.lock().unwrap().pop_front() {
            None | Some(Step::Success) => Ok(BulkOutcome::Success),
            Some(Step::Partial(n)) => Ok(BulkOutcome::Partial {
                failures: (0..n)
                    .map(|index| RecordFailure {
                        index,
                        status: 400,
                        reason: "mapper_parsing_exception: failed to parse".into(),
                    })
                    .collect(),
            }),
            Some(Step::Transient) => Err(SinkError::Transient("connection reset by peer".into())),
            Some(Step::Fatal) => Err(SinkError::Fatal(
                "request cannot be executed, reactor stopped".into(),
            )),
        }
    }
}

fn flush_config(max_batch: usize) -> FlushConfig {
    FlushConfig {
        max_batch,
        max_retries: 5,
        retry_backoff_ms: 0,
        initial_delay_ms: 10,
        flush_interval_ms: 10,
    }
}

fn enqueue(sender: &RecordSender, path: &str) {
    sender.enqueue(HttpLogRecord::from_snapshot(RequestSnapshot {
        remote_addr: "198.51.100.7".parse().unwrap(),
        forwarded_for: None,
        remote_user: None,
        server_addr: "10.0.0.10".parse().unwrap(),
        method: "GET".into(),
        scheme: "https".into(),
        host: "shop.example.com".into(),
        path: path.into(),
        query: None,
        protocol: "HTTP/1.1".into(),
        status: 200,
        bytes: 1024,
        referrer: None,
        agent: None,
    }));
}

#[tokio::test]
async fn drains_in_bounded_sequential_batches() {
    let (sender, queue) = record_queue();
    let mock = MockSink::default();
    let mut shipper = Shipper::new(queue, Box::new(mock.clone()), &flush_config(2));

    for path in ["/a", "/b", "/c"] {
        enqueue(&sender, path);
    }
    shipper.flush_pending().await;

    assert_eq!(mock.call_sizes(), vec![2, 1]);
    assert_eq!(mock.shipped_paths(), vec!["/a", "/b", "/c"]);
}

#[tokio::test]
async fn transient_failures_retry_until_success() {
    let (sender, queue) = record_queue();
    let mock = MockSink::scripted(vec![Step::Transient, Step::Transient, Step::Success]);
    let mut shipper = Shipper::new(queue, Box::new(mock.clone()), &flush_config(50));

    enqueue(&sender, "/orders");
    shipper.flush_pending().await;

    // two failures then success: exactly three attempts for the one batch
    assert_eq!(mock.call_sizes(), vec![1, 1, 1]);
    assert!(!shipper.is_disabled());
}

#[tokio::test]
async fn batch_is_dropped_at_the_attempt_ceiling() {
    let (sender, queue) = record_queue();
    let mock = MockSink::scripted(vec![
        Step::Transient,
        Step::Transient,
        Step::Transient,
        Step::Transient,
        Step::Transient,
        Step::Transient,
    ]);
    let mut shipper = Shipper::new(queue, Box::new(mock.clone()), &flush_config(50));

    enqueue(&sender, "/doomed");
    shipper.flush_pending().await;
    assert_eq!(mock.call_sizes().len(), 5);

    // the dropped batch must not regrow the queue
    shipper.flush_pending().await;
    assert_eq!(mock.call_sizes().len(), 5);
    assert!(!shipper.is_disabled());
}

#[tokio::test]
async fn partial_failure_consumes_the_batch_without_retry() {
    let (sender, queue) = record_queue();
    let mock = MockSink::scripted(vec![Step::Partial(2)]);
    let mut shipper = Shipper::new(queue, Box::new(mock.clone()), &flush_config(50));

    for path in ["/a", "/b", "/c"] {
        enqueue(&sender, path);
    }
    shipper.flush_pending().await;

    assert_eq!(mock.call_sizes(), vec![3]);
    shipper.flush_pending().await;
    assert_eq!(mock.call_sizes(), vec![3]);
}

#[tokio::test]
async fn fatal_failure_disables_the_shipper_permanently() {
    let (sender, queue) = record_queue();
    let mock = MockSink::scripted(vec![Step::Fatal]);
    let mut shipper = Shipper::new(queue, Box::new(mock.clone()), &flush_config(50));

    enqueue(&sender, "/first");
    shipper.flush_pending().await;

    // no retries after a fatal error
    assert_eq!(mock.call_sizes(), vec![1]);
    assert!(shipper.is_disabled());

    // later ticks drain and discard without touching the sink
    for path in ["/second", "/third"] {
        enqueue(&sender, path);
    }
    shipper.flush_pending().await;
    assert_eq!(mock.call_sizes(), vec![1]);
}

#[tokio::test]
async fn concurrent_producers_ship_every_record_exactly_once() {
    let (sender, queue) = record_queue();
    let mock = MockSink::default();
    let mut shipper = Shipper::new(queue, Box::new(mock.clone()), &flush_config(50));

    let mut producers = Vec::new();
    for p in 0..8 {
        let sender = sender.clone();
        producers.push(tokio::spawn(async move {
            for i in 0..50 {
                enqueue(&sender, &format!("/p{p}/{i}"));
            }
        }));
    }
    for producer in producers {
        producer.await.unwrap();
    }
    shipper.flush_pending().await;

    let shipped = mock.shipped_paths();
    assert_eq!(shipped.len(), 400);
    let unique: std::collections::HashSet<_> = shipped.iter().collect();
    assert_eq!(unique.len(), 400);
    for size in mock.call_sizes() {
        assert!(size <= 50);
    }
}

#[tokio::test]
async fn periodic_run_flushes_and_exits_when_producers_are_gone() {
    let (sender, queue) = record_queue();
    let mock = MockSink::default();
    let shipper = Shipper::new(queue, Box::new(mock.clone()), &flush_config(50));
    let task = tokio::spawn(shipper.run());

    for path in ["/a", "/b"] {
        enqueue(&sender, path);
    }
    drop(sender);

    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("shipper exits after the queue drains")
        .unwrap();
    assert_eq!(mock.shipped_paths(), vec!["/a", "/b"]);
}
