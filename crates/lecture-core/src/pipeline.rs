use crate::browser::{BrowserHandle, SharedBrowser};
use crate::matcher::matcher_for;
use crate::monitor::{FileMonitor, MonitorSettings};
use crate::queue::{download_queue, DownloadQueue, QueueClosed};
use crate::registry::CorrelationRegistry;
use crate::relocator::Relocator;
use crate::status::StatusBoard;
use crate::worker::{DownloadWorker, WorkerSettings};
use lecture_config::DownloadConfig;
use lecture_models::{DownloadRequest, RequestId};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Worker and monitor running side by side over one registry
pub struct DownloadPipeline {
    queue: DownloadQueue,
    registry: CorrelationRegistry,
    board: StatusBoard,
    shutdown: watch::Sender<bool>,
    worker: JoinHandle<()>,
    monitor: JoinHandle<()>,
}

impl DownloadPipeline {
    pub fn start<B: BrowserHandle>(browser: SharedBrowser<B>, config: &DownloadConfig, board: StatusBoard) -> Self {
        let registry = CorrelationRegistry::new();
        let (queue, receiver) = download_queue();
        let (shutdown, shutdown_rx) = watch::channel(false);

        let worker = DownloadWorker::new(browser, registry.clone(), board.clone(), WorkerSettings::from(config))
            .spawn(receiver);
        let monitor = FileMonitor::new(
            MonitorSettings::from(config),
            registry.clone(),
            board.clone(),
            Relocator::from_config(config),
        )
        .with_matcher(matcher_for(config.match_mode))
        .spawn(shutdown_rx);

        info!(operation = "download_pipeline", "Download pipeline started");
        Self {
            queue,
            registry,
            board,
            shutdown,
            worker,
            monitor,
        }
    }

    pub fn submit(&self, item_index: usize, title: &str) -> Result<RequestId, QueueClosed> {
        self.queue.submit(item_index, title)
    }

    /// Queue a request the caller already built, e.g. after labelling its id
    pub fn enqueue(&self, request: DownloadRequest) -> Result<RequestId, QueueClosed> {
        let id = request.id.clone();
        self.queue.enqueue(request)?;
        Ok(id)
    }

    /// Extra producer handle. Clones must be dropped before [`shutdown`](Self::shutdown)
    /// can finish draining the queue.
    pub fn queue(&self) -> DownloadQueue {
        self.queue.clone()
    }

    pub fn board(&self) -> &StatusBoard {
        &self.board
    }

    pub fn registry(&self) -> &CorrelationRegistry {
        &self.registry
    }

    /// Let the worker drain the queue, then stop the monitor
    pub async fn shutdown(self) {
        let Self {
            queue,
            board,
            shutdown,
            worker,
            monitor,
            ..
        } = self;

        drop(queue);
        if let Err(e) = worker.await {
            warn!("Download worker ended abnormally: {}", e);
        }
        let _ = shutdown.send(true);
        if let Err(e) = monitor.await {
            warn!("File monitor ended abnormally: {}", e);
        }
        board.log_summary();
    }
}
