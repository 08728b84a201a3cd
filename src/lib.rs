//! Background shipping of HTTP access-log records into Elasticsearch.
//!
//! Request handlers hand a [`record::RequestSnapshot`] to the
//! [`filter::RequestLogFilter`]; a single background [`shipper::Shipper`]
//! task drains the queue in bounded batches and bulk-indexes them, retrying
//! transient failures up to a hard ceiling and disabling itself permanently
//! when the transport to the backend dies. No failure in this pipeline ever
//! reaches the request path.

pub mod config;
pub mod filter;
pub mod queue;
pub mod record;
pub mod shipper;
pub mod sink;
pub mod traffic;
