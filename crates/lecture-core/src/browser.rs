use crate::error::BrowserError;
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Interval used by the element waits below
pub const ELEMENT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Narrow page-interaction surface the download pipeline and session drive.
///
/// A handle is not safe to drive from two places at once; share it through
/// [`SharedBrowser`] and hold the lock for the whole interaction.
#[async_trait]
pub trait BrowserHandle: Send + Sync + 'static {
    type Element: Clone + Send + Sync;

    async fn navigate(&self, url: &str) -> Result<(), BrowserError>;

    async fn reload(&self) -> Result<(), BrowserError>;

    async fn find_elements(&self, selector: &str) -> Result<Vec<Self::Element>, BrowserError>;

    async fn find_within(
        &self,
        parent: &Self::Element,
        selector: &str,
    ) -> Result<Vec<Self::Element>, BrowserError>;

    async fn element_text(&self, element: &Self::Element) -> Result<String, BrowserError>;

    /// Run a script body; positional `args` are readable as `arguments[i]`
    async fn execute_script(&self, script: &str, args: Vec<Value>) -> Result<Value, BrowserError>;

    /// Script-level click, which survives overlays that swallow pointer events
    async fn click(&self, element: &Self::Element) -> Result<(), BrowserError>;

    async fn is_visible(&self, _element: &Self::Element) -> Result<bool, BrowserError> {
        Ok(true)
    }

    async fn close(&self) -> Result<(), BrowserError>;

    /// Wait for the first visible element matching `selector`
    async fn wait_until_visible(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<Self::Element, BrowserError> {
        let start = Instant::now();
        loop {
            if let Ok(elements) = self.find_elements(selector).await {
                for element in elements {
                    if self.is_visible(&element).await.unwrap_or(false) {
                        return Ok(element);
                    }
                }
            }
            if start.elapsed() >= timeout {
                return Err(BrowserError::timeout(selector, timeout));
            }
            tokio::time::sleep(ELEMENT_POLL_INTERVAL).await;
        }
    }

    /// Wait until any element matches `selector`, visible or not
    async fn wait_for_presence(&self, selector: &str, timeout: Duration) -> Result<(), BrowserError> {
        let found = wait_until(timeout, ELEMENT_POLL_INTERVAL, || async move {
            self.find_elements(selector)
                .await
                .map(|elements| !elements.is_empty())
                .unwrap_or(false)
        })
        .await;
        if found {
            Ok(())
        } else {
            Err(BrowserError::timeout(selector, timeout))
        }
    }
}

pub type SharedBrowser<B> = Arc<Mutex<B>>;

pub fn shared<B: BrowserHandle>(browser: B) -> SharedBrowser<B> {
    Arc::new(Mutex::new(browser))
}

/// Poll `condition` every `poll` until it holds or `timeout` elapses.
///
/// The condition is always evaluated at least once. Returns whether it held.
pub async fn wait_until<F, Fut>(timeout: Duration, poll: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = Instant::now();
    loop {
        if condition().await {
            return true;
        }
        if start.elapsed() >= timeout {
            return false;
        }
        tokio::time::sleep(poll).await;
    }
}
