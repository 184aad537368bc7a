use crate::browser::{BrowserHandle, SharedBrowser};
use crate::error::{BrowserError, DownloadError};
use crate::naming::expected_filename;
use crate::queue::DownloadReceiver;
use crate::registry::{CorrelationRegistry, Registration};
use crate::selectors::SiteSelectors;
use crate::status::StatusBoard;
use lecture_config::DownloadConfig;
use lecture_models::{DownloadRequest, DownloadStatus};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// How long to wait for the optional "choose format" prompt
    pub format_prompt_timeout: Duration,
    /// Pause after clicking so the browser registers the download before
    /// anything else drives the page
    pub settle_delay: Duration,
}

impl From<&DownloadConfig> for WorkerSettings {
    fn from(config: &DownloadConfig) -> Self {
        Self {
            format_prompt_timeout: config.format_prompt_timeout(),
            settle_delay: config.settle_delay(),
        }
    }
}

/// Single consumer of the download queue. Drives the browser to start each
/// download and records the scraped identifier for the monitor.
pub struct DownloadWorker<B: BrowserHandle> {
    browser: SharedBrowser<B>,
    registry: CorrelationRegistry,
    board: StatusBoard,
    selectors: SiteSelectors,
    settings: WorkerSettings,
}

impl<B: BrowserHandle> DownloadWorker<B> {
    pub fn new(
        browser: SharedBrowser<B>,
        registry: CorrelationRegistry,
        board: StatusBoard,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            browser,
            registry,
            board,
            selectors: SiteSelectors::default(),
            settings,
        }
    }

    pub fn with_selectors(mut self, selectors: SiteSelectors) -> Self {
        self.selectors = selectors;
        self
    }

    pub fn spawn(self, receiver: DownloadReceiver) -> JoinHandle<()> {
        tokio::spawn(self.run(receiver))
    }

    /// Process requests in queue order until every producer is gone
    pub async fn run(self, mut receiver: DownloadReceiver) {
        info!(operation = "download_worker", "Download worker started");
        while let Some(request) = receiver.dequeue().await {
            self.process(&request).await;
        }
        info!(operation = "download_worker", "Download queue closed, worker exiting");
    }

    /// Handle one request. Failures are reported, never propagated.
    pub async fn process(&self, request: &DownloadRequest) {
        self.board.report(&request.id, DownloadStatus::Starting);
        self.board.message(&format!("Starting download: {}", request.title));

        match self.trigger(request).await {
            Ok(Some(identifier)) => {
                debug!(request_id = %request.id, identifier = %identifier, "Download triggered");
            }
            Ok(None) => {
                self.board.mark_untracked(&request.id);
                warn!(
                    request_id = %request.id,
                    "No identifier for '{}'; the file will be moved but its progress cannot be tracked",
                    request.title
                );
            }
            Err(e) => {
                self.registry.remove_request(&request.id);
                error!(request_id = %request.id, item_index = request.item_index, "Download failed: {}", e);
                self.board.fail(&request.id, &e);
                self.board.message(&format!("Download failed: {} ({})", request.title, e));
            }
        }
    }

    async fn trigger(&self, request: &DownloadRequest) -> Result<Option<String>, DownloadError> {
        let browser = self.browser.lock().await;

        let items = browser.find_elements(self.selectors.lesson_item).await?;
        let item = items.get(request.item_index).ok_or(DownloadError::StaleIndex {
            index: request.item_index,
            available: items.len(),
        })?;

        let identifier = self.read_identifier(&*browser, item).await;
        if let Some(identifier) = &identifier {
            match self.registry.register(identifier, request.id.clone()) {
                Registration::Replaced(displaced) => warn!(
                    request_id = %request.id,
                    displaced = %displaced,
                    identifier = %identifier,
                    "Identifier already registered; the earlier request will not receive updates"
                ),
                Registration::Registered | Registration::Ignored => {}
            }
            debug!(
                request_id = %request.id,
                "Expecting file '{}'",
                expected_filename(&request.title, identifier)
            );
        }

        let button = browser
            .find_within(item, self.selectors.download_button)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BrowserError::Interaction("download button not found".to_string()))?;
        browser.click(&button).await?;

        match browser
            .wait_until_visible(self.selectors.format_option, self.settings.format_prompt_timeout)
            .await
        {
            Ok(option) => browser.click(&option).await?,
            Err(BrowserError::Timeout { .. }) => debug!("No format prompt, item downloads directly"),
            Err(e) => return Err(e.into()),
        }

        tokio::time::sleep(self.settings.settle_delay).await;
        Ok(identifier)
    }

    /// Best effort; a missing or blank identifier is not an error
    async fn read_identifier(&self, browser: &B, item: &B::Element) -> Option<String> {
        let button = match browser.find_within(item, self.selectors.lesson_identifier).await {
            Ok(found) => found.into_iter().next()?,
            Err(e) => {
                debug!("Identifier lookup failed: {}", e);
                return None;
            }
        };
        let text = browser.element_text(&button).await.ok()?;
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}
