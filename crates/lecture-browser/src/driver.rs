use crate::diagnostics::{DebugConfig, Diagnostics};
use crate::discovery::{is_docker, resolve_executable};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::browser::{SetDownloadBehaviorBehavior, SetDownloadBehaviorParams};
use chromiumoxide::element::Element;
use chromiumoxide::{Browser, BrowserConfig as ChromeConfig, Page};
use futures::StreamExt;
use lecture_config::{Config, PathManager};
use lecture_core::{BrowserError, BrowserHandle};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const MAX_HANDLER_ERRORS: usize = 10;

const CLICK_FN: &str = "function() { this.click(); }";
const VISIBLE_FN: &str = r#"function() {
    const rect = this.getBoundingClientRect();
    const style = window.getComputedStyle(this);
    return rect.width > 0 && rect.height > 0 && style.visibility !== 'hidden' && style.display !== 'none';
}"#;

/// Everything needed to start the browser
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub headless: bool,
    pub chrome_executable: Option<PathBuf>,
    pub window_size: (u32, u32),
    pub user_data_dir: PathBuf,
    pub download_dir: PathBuf,
    pub fetcher_dir: PathBuf,
    pub debug: DebugConfig,
}

impl LaunchOptions {
    pub fn from_config(config: &Config, paths: &PathManager) -> Self {
        Self {
            headless: config.browser.headless,
            chrome_executable: config.browser.chrome_executable.clone(),
            window_size: config.browser.window_size,
            user_data_dir: config
                .browser
                .user_data_dir
                .clone()
                .unwrap_or_else(|| paths.browser_profile_dir()),
            download_dir: config.downloads.temp_dir.clone(),
            fetcher_dir: paths.chromium_download_dir(),
            debug: DebugConfig::from_env(&paths.diagnostics_dir()),
        }
    }
}

/// Element handle; chromiumoxide elements are not `Clone`
#[derive(Debug, Clone)]
pub struct ChromeElement(Arc<Element>);

impl ChromeElement {
    pub fn inner(&self) -> &Element {
        &self.0
    }
}

/// Chromium-backed [`BrowserHandle`] driving a single tab
pub struct ChromeDriver {
    browser: Mutex<Option<Browser>>,
    page: Page,
    handler_task: Mutex<Option<JoinHandle<()>>>,
    diagnostics: Diagnostics,
}

impl ChromeDriver {
    pub async fn launch(options: LaunchOptions) -> Result<Self> {
        let executable = resolve_executable(options.chrome_executable.as_deref(), &options.fetcher_dir).await?;
        std::fs::create_dir_all(&options.user_data_dir)
            .with_context(|| format!("Failed to create browser profile dir {:?}", options.user_data_dir))?;
        std::fs::create_dir_all(&options.download_dir)
            .with_context(|| format!("Failed to create download dir {:?}", options.download_dir))?;

        let config = build_browser_config(&executable, &options)?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| anyhow!("Failed to launch browser: {}", e))?;

        let handler_task = tokio::spawn(async move {
            let mut error_count = 0;
            while let Some(event) = handler.next().await {
                match event {
                    Ok(_) => error_count = 0,
                    Err(e) => {
                        error_count += 1;
                        warn!(
                            "Browser handler error (count: {}/{}): {:?}",
                            error_count, MAX_HANDLER_ERRORS, e
                        );
                        if error_count >= MAX_HANDLER_ERRORS {
                            error!(
                                "Browser handler received {} consecutive errors. Browser process may have crashed.",
                                error_count
                            );
                            break;
                        }
                    }
                }
            }
            info!("Browser handler task ended");
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| anyhow!("Failed to open browser tab: {}", e))?;
        configure_downloads(&page, &options.download_dir).await?;

        info!(operation = "browser_launch", headless = options.headless, "Browser ready");
        Ok(Self {
            browser: Mutex::new(Some(browser)),
            page,
            handler_task: Mutex::new(Some(handler_task)),
            diagnostics: Diagnostics::new(options.debug),
        })
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Save a screenshot and the page HTML when diagnostics are enabled
    pub async fn capture_diagnostics(&self, label: &str) {
        if !self.diagnostics.is_enabled() {
            return;
        }
        if let Err(e) = self.diagnostics.capture(&self.page, label).await {
            warn!("Failed to capture diagnostics: {}", e);
        }
    }

    pub async fn type_into(&self, element: &ChromeElement, text: &str) -> Result<(), BrowserError> {
        element.0.click().await.map_err(interaction)?;
        element.0.type_str(text).await.map_err(interaction)?;
        Ok(())
    }

    pub async fn press_enter(&self, element: &ChromeElement) -> Result<(), BrowserError> {
        element.0.press_key("Enter").await.map_err(interaction)?;
        Ok(())
    }
}

fn interaction(e: impl std::fmt::Display) -> BrowserError {
    BrowserError::Interaction(e.to_string())
}

fn build_browser_config(executable: &Path, options: &LaunchOptions) -> Result<ChromeConfig> {
    let mut builder = ChromeConfig::builder().chrome_executable(executable);

    if options.headless {
        builder = builder.arg("--headless=new");
    } else {
        builder = builder.with_head();
    }

    if is_docker() || !cfg!(target_os = "macos") {
        builder = builder.arg("--no-sandbox").arg("--disable-dev-shm-usage");
    }

    let (width, height) = options.window_size;
    builder = builder
        .arg("--disable-gpu")
        .arg("--disable-notifications")
        .arg("--disable-extensions")
        .arg("--log-level=3")
        .arg("--disable-features=RendererCodeIntegrity")
        .arg(format!("--window-size={},{}", width, height))
        .arg(format!("--user-data-dir={}", options.user_data_dir.display()));

    builder
        .build()
        .map_err(|e| anyhow!("Failed to build browser config: {}", e))
}

/// Let the tab save downloads into `download_dir` without prompting
async fn configure_downloads(page: &Page, download_dir: &Path) -> Result<()> {
    let params = SetDownloadBehaviorParams {
        behavior: SetDownloadBehaviorBehavior::Allow,
        download_path: Some(download_dir.to_string_lossy().to_string()),
        browser_context_id: None,
        events_enabled: None,
    };
    page.execute(params)
        .await
        .map_err(|e| anyhow!("Failed to configure download behavior: {}", e))?;
    info!("Download directory configured: {:?}", download_dir);
    Ok(())
}

/// Wrap a script body so positional arguments are visible as `arguments[i]`
fn wrap_script(script: &str, args: &[Value]) -> String {
    let args = Value::Array(args.to_vec());
    format!("(function() {{\n{}\n}}).apply(null, {})", script, args)
}

#[async_trait]
impl BrowserHandle for ChromeDriver {
    type Element = ChromeElement;

    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        self.page.goto(url).await.map_err(interaction)?;
        Ok(())
    }

    async fn reload(&self) -> Result<(), BrowserError> {
        self.page.reload().await.map_err(interaction)?;
        Ok(())
    }

    async fn find_elements(&self, selector: &str) -> Result<Vec<ChromeElement>, BrowserError> {
        let elements = self.page.find_elements(selector).await.map_err(interaction)?;
        Ok(elements.into_iter().map(|e| ChromeElement(Arc::new(e))).collect())
    }

    async fn find_within(&self, parent: &ChromeElement, selector: &str) -> Result<Vec<ChromeElement>, BrowserError> {
        let elements = parent.0.find_elements(selector).await.map_err(interaction)?;
        Ok(elements.into_iter().map(|e| ChromeElement(Arc::new(e))).collect())
    }

    async fn element_text(&self, element: &ChromeElement) -> Result<String, BrowserError> {
        let text = element.0.inner_text().await.map_err(interaction)?;
        Ok(text.unwrap_or_default())
    }

    async fn execute_script(&self, script: &str, args: Vec<Value>) -> Result<Value, BrowserError> {
        let result = self
            .page
            .evaluate(wrap_script(script, &args))
            .await
            .map_err(|e| BrowserError::Script(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn click(&self, element: &ChromeElement) -> Result<(), BrowserError> {
        element.0.call_js_fn(CLICK_FN, false).await.map_err(interaction)?;
        Ok(())
    }

    async fn is_visible(&self, element: &ChromeElement) -> Result<bool, BrowserError> {
        let returns = element.0.call_js_fn(VISIBLE_FN, false).await.map_err(interaction)?;
        Ok(returns
            .result
            .value
            .as_ref()
            .and_then(Value::as_bool)
            .unwrap_or(false))
    }

    async fn close(&self) -> Result<(), BrowserError> {
        let Some(mut browser) = self.browser.lock().await.take() else {
            return Ok(());
        };
        info!("Shutting down browser instance");
        if let Err(e) = browser.close().await {
            warn!("Browser close command failed: {}", e);
        }
        if let Err(e) = browser.wait().await {
            debug!("Waiting for browser process failed: {}", e);
        }
        if let Some(handler_task) = self.handler_task.lock().await.take() {
            let _ = tokio::time::timeout(Duration::from_secs(2), handler_task).await;
        }
        info!("Browser instance shut down");
        Ok(())
    }
}

impl Drop for ChromeDriver {
    fn drop(&mut self) {
        if let Some(task) = self.handler_task.get_mut().take() {
            task.abort();
        }
    }
}
