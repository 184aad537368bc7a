use anyhow::{Context, Result};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{info, warn};

/// Failure capture settings. Enabled with `LECTUREFETCH_DEBUG`;
/// `LECTUREFETCH_DEBUG_DIR` overrides the output directory.
#[derive(Debug, Clone)]
pub struct DebugConfig {
    pub enabled: bool,
    pub output_dir: PathBuf,
    pub capture_screenshots: bool,
    pub capture_html: bool,
}

impl DebugConfig {
    pub fn from_env(default_dir: &Path) -> Self {
        Self {
            enabled: env::var("LECTUREFETCH_DEBUG")
                .map(|v| !v.is_empty() && v != "0")
                .unwrap_or(false),
            output_dir: env::var("LECTUREFETCH_DEBUG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_dir.to_path_buf()),
            capture_screenshots: true,
            capture_html: true,
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            output_dir: PathBuf::from("./diagnostics"),
            capture_screenshots: false,
            capture_html: false,
        }
    }
}

/// Saves screenshots and page HTML when something goes wrong
pub struct Diagnostics {
    config: DebugConfig,
    counter: AtomicU32,
}

impl Diagnostics {
    pub fn new(config: DebugConfig) -> Self {
        Self {
            config,
            counter: AtomicU32::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn next_stem(&self, label: &str) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{:03}_{}", n, sanitize_label(label))
    }

    /// Capture whatever is enabled; returns the written files
    pub async fn capture(&self, page: &Page, label: &str) -> Result<Vec<PathBuf>> {
        if !self.config.enabled {
            return Ok(Vec::new());
        }
        std::fs::create_dir_all(&self.config.output_dir).with_context(|| {
            format!("Failed to create diagnostics directory: {:?}", self.config.output_dir)
        })?;

        let stem = self.next_stem(label);
        let mut written = Vec::new();

        if self.config.capture_screenshots {
            let path = self.config.output_dir.join(format!("{}.png", stem));
            let params = ScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Png)
                .build();
            match page.screenshot(params).await {
                Ok(data) => {
                    std::fs::write(&path, data)
                        .with_context(|| format!("Failed to write screenshot to {:?}", path))?;
                    info!("Screenshot saved: {:?}", path);
                    written.push(path);
                }
                Err(e) => warn!("Failed to capture screenshot: {}", e),
            }
        }

        if self.config.capture_html {
            let path = self.config.output_dir.join(format!("{}.html", stem));
            match page.content().await {
                Ok(html) => {
                    std::fs::write(&path, html)
                        .with_context(|| format!("Failed to write HTML to {:?}", path))?;
                    info!("Page HTML saved: {:?}", path);
                    written.push(path);
                }
                Err(e) => warn!("Failed to read page HTML: {}", e),
            }
        }

        Ok(written)
    }
}

fn sanitize_label(label: &str) -> String {
    label
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_label() {
        assert_eq!(sanitize_label("login failed: timeout"), "login_failed__timeout");
    }

    #[test]
    fn test_stems_are_numbered() {
        let diagnostics = Diagnostics::new(DebugConfig::disabled());
        assert_eq!(diagnostics.next_stem("a"), "001_a");
        assert_eq!(diagnostics.next_stem("b"), "002_b");
        assert!(!diagnostics.is_enabled());
    }
}
