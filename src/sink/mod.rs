use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::record::HttpLogRecord;

pub mod elasticsearch;

/// A bulk-indexing backend for access-log records.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Submits the whole batch in one call. A completed call that rejected
    /// individual records reports them through [`BulkOutcome::Partial`];
    /// errors describe the call itself failing.
    async fn bulk_write(&self, batch: &[HttpLogRecord]) -> Result<BulkOutcome, SinkError>;
}

/// Result of a bulk call that reached the backend.
#[derive(Debug)]
pub enum BulkOutcome {
    Success,
    /// The call completed but the backend rejected some records.
    Partial { failures: Vec<RecordFailure> },
}

/// One rejected record within an otherwise completed bulk call.
#[derive(Debug)]
pub struct RecordFailure {
    /// Position of the record within the submitted batch.
    pub index: usize,
    pub status: u16,
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum SinkError {
    /// Index or schema setup failed at startup; shipping never activates.
    #[error("index provisioning failed: {0}")]
    Provisioning(String),
    /// The transport to the backend is permanently gone. The shipper trips
    /// its breaker and never issues another call.
    #[error("transport to the search backend is gone: {0}")]
    Fatal(String),
    /// Anything else; retried up to the attempt ceiling.
    #[error("bulk write failed: {0}")]
    Transient(String),
}

/// Prints one access-log line per record via `tracing`. Useful for running
/// the pipeline without a search backend, and it is the default sink.
pub struct StdoutSink;

#[async_trait]
impl Sink for StdoutSink {
    async fn bulk_write(&self, batch: &[HttpLogRecord]) -> Result<BulkOutcome, SinkError> {
        for record in batch {
            info!(
                "{} {} {}://{}{}{} -> {} {}b",
                record.remote_ip,
                record.request_method,
                record.request_scheme,
                record.request_host,
                record.request_path,
                record
                    .request_query
                    .as_deref()
                    .map(|q| format!("?{q}"))
                    .unwrap_or_default(),
                record.response,
                record.bytes,
            );
        }
        Ok(BulkOutcome::Success)
    }
}
