use crate::queue::RecordSender;
use crate::record::{HttpLogRecord, RequestSnapshot};

/// Producer-facing entry point, called once per completed request/response
/// cycle. Cheap to clone into every handler; recording never blocks and
/// never surfaces an error to the request path.
#[derive(Clone)]
pub struct RequestLogFilter {
    sender: Option<RecordSender>,
}

impl RequestLogFilter {
    pub fn new(sender: RecordSender) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    /// Built when sink provisioning failed at startup. Every call is a
    /// no-op; records are never enqueued and no flush task exists.
    pub fn disabled() -> Self {
        Self { sender: None }
    }

    pub fn record_request(&self, snapshot: RequestSnapshot) {
        let Some(sender) = &self.sender else {
            return;
        };
        sender.enqueue(HttpLogRecord::from_snapshot(snapshot));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::record_queue;

    fn snapshot() -> RequestSnapshot {
        RequestSnapshot {
            remote_addr: "198.51.100.7".parse().unwrap(),
            forwarded_for: None,
            remote_user: Some("aiden".into()),
            server_addr: "10.0.0.10".parse().unwrap(),
            method: "POST".into(),
            scheme: "https".into(),
            host: "api.example.com".into(),
            path: "/v1/orders".into(),
            query: Some("dryRun=false".into()),
            protocol: "HTTP/1.1".into(),
            status: 201,
            bytes: 942,
            referrer: None,
            agent: Some("okhttp/4.12".into()),
        }
    }

    #[tokio::test]
    async fn recorded_requests_land_in_the_queue() {
        let (sender, mut queue) = record_queue();
        let filter = RequestLogFilter::new(sender);

        filter.record_request(snapshot());

        let record = queue.try_dequeue().expect("record enqueued");
        assert_eq!(record.request_path, "/v1/orders");
        assert_eq!(record.response, 201);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn disabled_filter_records_nothing() {
        // must be callable without panicking even though nothing backs it
        let filter = RequestLogFilter::disabled();
        filter.record_request(snapshot());
    }
}
