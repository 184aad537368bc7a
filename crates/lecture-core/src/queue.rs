use lecture_models::{DownloadRequest, RequestId};
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
#[error("download queue is closed; request {} was not queued", .0.id)]
pub struct QueueClosed(pub DownloadRequest);

/// Producer side of the download queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct DownloadQueue {
    sender: mpsc::UnboundedSender<DownloadRequest>,
}

/// Consumer side, owned by the worker
#[derive(Debug)]
pub struct DownloadReceiver {
    receiver: mpsc::UnboundedReceiver<DownloadRequest>,
}

/// Unbounded FIFO between whoever triggers downloads and the worker
pub fn download_queue() -> (DownloadQueue, DownloadReceiver) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (DownloadQueue { sender }, DownloadReceiver { receiver })
}

impl DownloadQueue {
    /// Never blocks. Fails only once the worker is gone.
    pub fn enqueue(&self, request: DownloadRequest) -> Result<(), QueueClosed> {
        self.sender.send(request).map_err(|e| QueueClosed(e.0))
    }

    /// Build a request for the on-page item and queue it
    pub fn submit(&self, item_index: usize, title: &str) -> Result<RequestId, QueueClosed> {
        let request = DownloadRequest::new(item_index, title);
        let id = request.id.clone();
        self.enqueue(request)?;
        tracing::debug!(request_id = %id, item_index, "Queued download");
        Ok(id)
    }
}

impl DownloadReceiver {
    /// Wait for the next request; `None` once every producer has been dropped
    /// and the queue is drained
    pub async fn dequeue(&mut self) -> Option<DownloadRequest> {
        self.receiver.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fifo_order() {
        let (queue, mut receiver) = download_queue();
        let first = queue.submit(2, "first").unwrap();
        let second = queue.submit(0, "second").unwrap();

        assert_eq!(receiver.dequeue().await.unwrap().id, first);
        assert_eq!(receiver.dequeue().await.unwrap().id, second);
    }

    #[tokio::test]
    async fn test_same_item_twice_is_two_requests() {
        let (queue, mut receiver) = download_queue();
        queue.submit(1, "Lesson").unwrap();
        queue.submit(1, "Lesson").unwrap();

        let a = receiver.dequeue().await.unwrap();
        let b = receiver.dequeue().await.unwrap();
        assert_eq!(a.item_index, b.item_index);
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn test_dequeue_ends_after_senders_drop() {
        let (queue, mut receiver) = download_queue();
        queue.submit(0, "last").unwrap();
        drop(queue);

        assert!(receiver.dequeue().await.is_some());
        assert!(receiver.dequeue().await.is_none());
    }

    #[test]
    fn test_enqueue_after_receiver_dropped_returns_request() {
        let (queue, receiver) = download_queue();
        drop(receiver);
        let err = queue.enqueue(DownloadRequest::new(4, "orphan")).unwrap_err();
        assert_eq!(err.0.item_index, 4);
    }
}
