use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, warn};

use crate::config::FlushConfig;
use crate::queue::RecordQueue;
use crate::record::HttpLogRecord;
use crate::sink::{BulkOutcome, RecordFailure, Sink, SinkError};

/// Background task that periodically drains the record queue and bulk-writes
/// it to the sink in bounded batches.
///
/// The drain loop is owned by this single task and each tick is awaited to
/// completion before the next one fires, so a flush can never overlap
/// itself. Producers only ever touch the sender half of the queue.
pub struct Shipper {
    queue: RecordQueue,
    sink: Box<dyn Sink>,
    max_batch: usize,
    max_retries: u32,
    retry_backoff: Duration,
    initial_delay: Duration,
    flush_interval: Duration,
    disabled: Arc<AtomicBool>,
}

impl Shipper {
    pub fn new(queue: RecordQueue, sink: Box<dyn Sink>, config: &FlushConfig) -> Self {
        Self {
            queue,
            sink,
            max_batch: config.max_batch,
            max_retries: config.max_retries,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            flush_interval: Duration::from_millis(config.flush_interval_ms),
            disabled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// True once a fatal transport failure has tripped the breaker. The flag
    /// never resets within a process lifetime.
    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Relaxed)
    }

    /// Runs until every sender is gone and the queue is empty. The first
    /// flush happens after `initial_delay`, then once per `flush_interval`.
    pub async fn run(mut self) {
        let mut ticks = time::interval_at(
            Instant::now() + self.initial_delay,
            self.flush_interval,
        );
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticks.tick().await;
            self.flush_pending().await;
            if self.queue.is_closed() && self.queue.is_empty() {
                debug!("all producers gone and queue drained, shipper exiting");
                break;
            }
        }
    }

    /// Drains everything currently queued, one bounded batch at a time.
    /// Called once per tick; also the hook shutdown paths and tests use.
    pub async fn flush_pending(&mut self) {
        while !self.queue.is_empty() {
            let batch = self.queue.drain(self.max_batch);
            if self.disabled.load(Ordering::Relaxed) {
                // Breaker is open for the rest of the process lifetime:
                // drained records are discarded without a network call so
                // the queue cannot grow without bound.
                debug!("shipper disabled, discarding {} queued records", batch.len());
                continue;
            }
            self.ship(batch).await;
        }
    }

    /// Ships one batch with a hard per-batch attempt ceiling. Whatever the
    /// outcome, the batch is consumed — failed records are never re-enqueued.
    async fn ship(&self, batch: Vec<HttpLogRecord>) {
        if batch.is_empty() {
            return;
        }
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.sink.bulk_write(&batch).await {
                Ok(BulkOutcome::Success) => {
                    debug!("indexed batch of {} records", batch.len());
                    return;
                }
                Ok(BulkOutcome::Partial { failures }) => {
                    warn!(
                        "backend rejected {}/{} records, dropping them: {}",
                        failures.len(),
                        batch.len(),
                        summarize_failures(&failures),
                    );
                    return;
                }
                Err(SinkError::Fatal(message)) => {
                    error!(
                        "fatal transport failure, request log shipping disabled for the rest of \
                         this process: {message}"
                    );
                    self.disabled.store(true, Ordering::Relaxed);
                    return;
                }
                Err(err) => {
                    if attempt >= self.max_retries {
                        error!(
                            "dropping batch of {} records after {attempt} failed attempts: {err}",
                            batch.len(),
                        );
                        return;
                    }
                    warn!(
                        "bulk write attempt {attempt}/{} failed, retrying: {err}",
                        self.max_retries,
                    );
                    let delay = self.backoff_delay(attempt);
                    if !delay.is_zero() {
                        time::sleep(delay).await;
                    }
                }
            }
        }
    }

    // Doubling delay with a capped exponent; the attempt ceiling stays hard
    // regardless of the backoff setting.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        self.retry_backoff * 2u32.saturating_pow(attempt.min(5) - 1)
    }
}

fn summarize_failures(failures: &[RecordFailure]) -> String {
    let mut detail = failures
        .iter()
        .take(3)
        .map(|f| format!("#{} [{}] {}", f.index, f.status, f.reason))
        .collect::<Vec<_>>()
        .join("; ");
    if failures.len() > 3 {
        detail.push_str(", ...");
    }
    detail
}
