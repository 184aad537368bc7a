pub mod browser;
pub mod catalog;
pub mod error;
pub mod events;
pub mod matcher;
pub mod monitor;
pub mod naming;
pub mod pipeline;
pub mod prober;
pub mod queue;
pub mod registry;
pub mod relocator;
pub mod selectors;
pub mod session;
pub mod status;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use browser::{shared, wait_until, BrowserHandle, SharedBrowser};
pub use catalog::load_topics;
pub use error::{BrowserError, DownloadError};
pub use events::{LogSink, ProgressSink, StatusSink, UiEvent};
pub use matcher::{matcher_for, FileMatcher, SubstringMatcher, TokenMatcher};
pub use monitor::{FileMonitor, MonitorSettings, ScanOutcome};
pub use naming::{expected_filename, sanitize_filename};
pub use pipeline::DownloadPipeline;
pub use queue::{download_queue, DownloadQueue, DownloadReceiver, QueueClosed};
pub use registry::{CorrelationRegistry, Registration};
pub use relocator::{unique_destination, FileOps, Relocator, TokioFs};
pub use selectors::SiteSelectors;
pub use session::{search_hash, search_route, ArchiveSession, SessionSettings};
pub use status::{StatusBoard, StatusSummary};
pub use worker::{DownloadWorker, WorkerSettings};
