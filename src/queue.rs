use tokio::sync::mpsc;

use crate::record::HttpLogRecord;

/// Creates the unbounded record queue: a cloneable sender for the many
/// producer call sites and the single consumer half owned by the shipper.
pub fn record_queue() -> (RecordSender, RecordQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (RecordSender { tx }, RecordQueue { rx })
}

/// Producer handle. Cheap to clone; enqueueing never blocks the request
/// path. The queue is bounded only by memory — there is no back-pressure
/// toward producers.
#[derive(Clone)]
pub struct RecordSender {
    tx: mpsc::UnboundedSender<HttpLogRecord>,
}

impl RecordSender {
    /// Appends a record. A send after the shipper has shut down is dropped
    /// silently; producers never see an error from this subsystem.
    pub fn enqueue(&self, record: HttpLogRecord) {
        let _ = self.tx.send(record);
    }
}

/// Consumer half. Ownership of the receiver keeps the drain side
/// single-threaded without any locking.
pub struct RecordQueue {
    rx: mpsc::UnboundedReceiver<HttpLogRecord>,
}

impl RecordQueue {
    /// Removes and returns the head record, if any. Never blocks.
    pub fn try_dequeue(&mut self) -> Option<HttpLogRecord> {
        self.rx.try_recv().ok()
    }

    /// Approximate queue length, used only to decide whether the flush loop
    /// should keep draining.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// True once every sender has been dropped.
    pub fn is_closed(&self) -> bool {
        self.rx.is_closed()
    }

    /// Removes up to `max` records FIFO.
    pub fn drain(&mut self, max: usize) -> Vec<HttpLogRecord> {
        let mut batch = Vec::with_capacity(max.min(self.len()).max(1));
        while batch.len() < max {
            match self.try_dequeue() {
                Some(record) => batch.push(record),
                None => break,
            }
        }
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{HttpLogRecord, RequestSnapshot};

    fn record(path: &str) -> HttpLogRecord {
        HttpLogRecord::from_snapshot(RequestSnapshot {
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
            bytes: 512,
            referrer: None,
            agent: None,
        })
    }

    #[tokio::test]
    async fn drains_in_insertion_order() {
        let (sender, mut queue) = record_queue();
        for path in ["/a", "/b", "/c"] {
            sender.enqueue(record(path));
        }

        assert_eq!(queue.len(), 3);
        let batch = queue.drain(2);
        assert_eq!(batch[0].request_path, "/a");
        assert_eq!(batch[1].request_path, "/b");
        assert_eq!(queue.drain(2).len(), 1);
        assert!(queue.is_empty());
        assert!(queue.try_dequeue().is_none());
    }

    #[tokio::test]
    async fn enqueue_after_consumer_dropped_is_a_noop() {
        let (sender, queue) = record_queue();
        drop(queue);
        // must not panic or block
        sender.enqueue(record("/late"));
    }

    #[tokio::test]
    async fn concurrent_producers_lose_nothing() {
        let (sender, mut queue) = record_queue();
        let mut tasks = Vec::new();
        for producer in 0..8 {
            let sender = sender.clone();
            tasks.push(tokio::spawn(async move {
                for i in 0..50 {
                    sender.enqueue(record(&format!("/p{producer}/{i}")));
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        drop(sender);

        let mut seen = std::collections::HashSet::new();
        while let Some(record) = queue.try_dequeue() {
            assert!(seen.insert(record.request_path.clone()));
        }
        assert_eq!(seen.len(), 400);
    }
}
