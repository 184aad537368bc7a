use crate::matcher::{matcher_for, FileMatcher};
use crate::registry::CorrelationRegistry;
use crate::relocator::Relocator;
use crate::status::StatusBoard;
use lecture_config::DownloadConfig;
use lecture_models::{DownloadStatus, RequestId};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub temp_dir: PathBuf,
    pub final_dir: PathBuf,
    pub poll_interval: Duration,
    /// Suffixes the browser uses for in-progress downloads
    pub partial_suffixes: Vec<String>,
    /// The processed set is cleared once it grows past this
    pub processed_limit: usize,
}

impl From<&DownloadConfig> for MonitorSettings {
    fn from(config: &DownloadConfig) -> Self {
        Self {
            temp_dir: config.temp_dir.clone(),
            final_dir: config.final_download_dir(),
            poll_interval: config.poll_interval(),
            partial_suffixes: config.partial_suffixes.clone(),
            processed_limit: config.processed_set_limit,
        }
    }
}

/// What happened to one finished file during a scan
#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    Relocated {
        file_name: String,
        destination: PathBuf,
        request: Option<RequestId>,
    },
    Failed {
        file_name: String,
        request: Option<RequestId>,
        reason: String,
    },
}

/// Polls the temp directory, correlates finished files with requests and
/// moves them to the final directory
pub struct FileMonitor {
    settings: MonitorSettings,
    registry: CorrelationRegistry,
    board: StatusBoard,
    relocator: Relocator,
    matcher: Box<dyn FileMatcher>,
    processed: HashSet<String>,
}

impl FileMonitor {
    pub fn new(
        settings: MonitorSettings,
        registry: CorrelationRegistry,
        board: StatusBoard,
        relocator: Relocator,
    ) -> Self {
        Self {
            settings,
            registry,
            board,
            relocator,
            matcher: matcher_for(Default::default()),
            processed: HashSet::new(),
        }
    }

    pub fn with_matcher(mut self, matcher: Box<dyn FileMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// Scan every poll interval until `shutdown` flips to true or its sender drops
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            operation = "file_monitor",
            "Watching {:?}, moving finished files to {:?}",
            self.settings.temp_dir,
            self.settings.final_dir
        );
        loop {
            if *shutdown.borrow() {
                break;
            }
            self.scan_once().await;

            tokio::select! {
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        info!(operation = "file_monitor", "File monitor stopped");
    }

    fn is_candidate(&self, file_name: &str) -> bool {
        !file_name.starts_with('.')
            && !self
                .settings
                .partial_suffixes
                .iter()
                .any(|suffix| !suffix.is_empty() && file_name.ends_with(suffix.as_str()))
            && !self.processed.contains(file_name)
    }

    async fn list_temp_dir(&self) -> Option<HashSet<String>> {
        let mut entries = match tokio::fs::read_dir(&self.settings.temp_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Cannot list {:?}: {}", self.settings.temp_dir, e);
                return None;
            }
        };
        let mut names = HashSet::new();
        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    names.insert(entry.file_name().to_string_lossy().to_string());
                }
                Ok(None) => break,
                Err(e) => {
                    debug!("Listing {:?} stopped early: {}", self.settings.temp_dir, e);
                    break;
                }
            }
        }
        Some(names)
    }

    /// One pass over the temp directory
    pub async fn scan_once(&mut self) -> Vec<ScanOutcome> {
        let Some(listed) = self.list_temp_dir().await else {
            return Vec::new();
        };

        // A name that left the directory may be reused by a later download
        self.processed.retain(|name| listed.contains(name));

        let mut finished: Vec<String> = listed.into_iter().filter(|name| self.is_candidate(name)).collect();
        finished.sort();

        let mut outcomes = Vec::with_capacity(finished.len());
        for file_name in finished {
            // Marked before relocating so a broken file is not retried forever
            self.processed.insert(file_name.clone());
            let outcome = self.handle_file(file_name).await;
            if let ScanOutcome::Relocated { file_name, .. } = &outcome {
                self.processed.remove(file_name);
            }
            outcomes.push(outcome);
        }

        if self.processed.len() > self.settings.processed_limit {
            debug!("Processed set reached {} entries, clearing", self.processed.len());
            self.processed.clear();
        }
        outcomes
    }

    async fn handle_file(&self, file_name: String) -> ScanOutcome {
        let matched = self.registry.find_match(&file_name, self.matcher.as_ref());
        let request = matched.as_ref().map(|(_, request)| request.clone());
        match &matched {
            Some((identifier, request)) => {
                info!(request_id = %request, identifier = %identifier, "Finished download: {}", file_name);
                self.board.report(request, DownloadStatus::Moving);
            }
            None => info!("Finished download with no matching request: {}", file_name),
        }

        let source = self.settings.temp_dir.join(&file_name);
        let result = self.relocator.relocate(&source, &self.settings.final_dir).await;

        if let Some((identifier, _)) = &matched {
            self.registry.remove(identifier);
        }

        match result {
            Ok(destination) => {
                if let Some(request) = &request {
                    self.board.report(request, DownloadStatus::Completed);
                }
                self.board.message(&format!("Download complete: {}", file_name));
                ScanOutcome::Relocated {
                    file_name,
                    destination,
                    request,
                }
            }
            Err(e) => {
                error!(operation = "file_monitor", "Could not move {}: {}", file_name, e);
                if let Some(request) = &request {
                    self.board.fail(request, &e);
                }
                self.board.message(&format!("Could not move {}: {}", file_name, e));
                ScanOutcome::Failed {
                    file_name,
                    request,
                    reason: e.to_string(),
                }
            }
        }
    }

    pub fn processed_len(&self) -> usize {
        self.processed.len()
    }
}

impl Drop for FileMonitor {
    fn drop(&mut self) {
        if !self.registry.is_empty() {
            warn!(
                "File monitor stopped with {} unmatched identifier(s) still registered",
                self.registry.len()
            );
        }
    }
}
