use std::path::PathBuf;
use thiserror::Error;

/// Failures raised by a browser handle while driving the page
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("browser interaction failed: {0}")]
    Interaction(String),

    #[error("timed out after {timeout_secs:.1}s waiting for {what}")]
    Timeout { what: String, timeout_secs: f64 },

    #[error("script evaluation failed: {0}")]
    Script(String),
}

impl BrowserError {
    pub fn timeout(what: impl Into<String>, timeout: std::time::Duration) -> Self {
        BrowserError::Timeout {
            what: what.into(),
            timeout_secs: timeout.as_secs_f64(),
        }
    }
}

/// Per-request failures in the download pipeline.
///
/// None of these stop the worker or monitor loops; they are turned into a
/// `failed` report for the affected request.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("item {index} is no longer on the page ({available} items listed)")]
    StaleIndex { index: usize, available: usize },

    #[error(transparent)]
    DriverInteraction(#[from] BrowserError),

    #[error("file {} never became readable", .0.display())]
    FileNeverReady(PathBuf),

    #[error("could not move {} after {attempts} attempts", .path.display())]
    RelocationRetriesExhausted { path: PathBuf, attempts: u32 },

    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),
}

impl DownloadError {
    /// Short category used for failure counters
    pub fn category(&self) -> &'static str {
        match self {
            DownloadError::StaleIndex { .. } => "stale_index",
            DownloadError::DriverInteraction(_) => "driver_interaction",
            DownloadError::FileNeverReady(_) => "file_never_ready",
            DownloadError::RelocationRetriesExhausted { .. } => "relocation_retries_exhausted",
            DownloadError::Io(_) => "io",
        }
    }
}
