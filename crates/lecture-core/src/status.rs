use crate::error::DownloadError;
use crate::events::{ProgressSink, StatusSink};
use lecture_models::{DownloadStatus, RequestId};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusSummary {
    pub started: usize,
    pub completed: usize,
    pub failed: usize,
    /// Requests still expected to reach a terminal status
    pub pending: usize,
    /// Started without an identifier; their files are moved but never reported
    pub untracked: usize,
    pub error_counts: HashMap<String, usize>,
}

struct BoardState {
    statuses: HashMap<RequestId, DownloadStatus>,
    untracked: HashSet<RequestId>,
    completed: usize,
    failed: usize,
    error_counts: HashMap<String, usize>,
    start_time: Instant,
}

/// Gatekeeper in front of the progress sink.
///
/// Statuses only move forward (starting, moving, then completed or failed)
/// and a request is reported terminal at most once. Anything else is dropped.
#[derive(Clone)]
pub struct StatusBoard {
    state: Arc<Mutex<BoardState>>,
    progress: Arc<dyn ProgressSink>,
    status: Arc<dyn StatusSink>,
}

impl StatusBoard {
    pub fn new(progress: Arc<dyn ProgressSink>, status: Arc<dyn StatusSink>) -> Self {
        Self {
            state: Arc::new(Mutex::new(BoardState {
                statuses: HashMap::new(),
                untracked: HashSet::new(),
                completed: 0,
                failed: 0,
                error_counts: HashMap::new(),
                start_time: Instant::now(),
            })),
            progress,
            status,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BoardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Forward a status for `request`. Returns false when the transition was dropped.
    pub fn report(&self, request: &RequestId, status: DownloadStatus) -> bool {
        {
            let mut state = self.lock();
            if let Some(current) = state.statuses.get(request) {
                if !current.can_advance_to(status) {
                    debug!(request_id = %request, from = %current, to = %status, "Dropping out-of-order status");
                    return false;
                }
            }
            state.statuses.insert(request.clone(), status);
            match status {
                DownloadStatus::Completed => state.completed += 1,
                DownloadStatus::Failed => state.failed += 1,
                _ => {}
            }
        }

        self.progress.progress(request, status.progress_value(), status);
        true
    }

    /// Report `failed` and count the error category
    pub fn fail(&self, request: &RequestId, error: &DownloadError) -> bool {
        if !self.report(request, DownloadStatus::Failed) {
            return false;
        }
        *self
            .lock()
            .error_counts
            .entry(error.category().to_string())
            .or_insert(0) += 1;
        true
    }

    /// The request stays at its current status for good; keep it out of `pending`
    pub fn mark_untracked(&self, request: &RequestId) {
        self.lock().untracked.insert(request.clone());
    }

    pub fn is_untracked(&self, request: &RequestId) -> bool {
        self.lock().untracked.contains(request)
    }

    /// Terminal, or untracked and so never going to change
    pub fn is_settled(&self, request: &RequestId) -> bool {
        let state = self.lock();
        state.untracked.contains(request) || state.statuses.get(request).is_some_and(|s| s.is_terminal())
    }

    pub fn message(&self, message: &str) {
        self.status.status(message);
    }

    pub fn status_of(&self, request: &RequestId) -> Option<DownloadStatus> {
        self.lock().statuses.get(request).copied()
    }

    pub fn summary(&self) -> StatusSummary {
        let state = self.lock();
        StatusSummary {
            started: state.statuses.len(),
            completed: state.completed,
            failed: state.failed,
            pending: state
                .statuses
                .iter()
                .filter(|(id, s)| !s.is_terminal() && !state.untracked.contains(*id))
                .count(),
            untracked: state.untracked.len(),
            error_counts: state.error_counts.clone(),
        }
    }

    pub fn log_summary(&self) {
        let summary = self.summary();
        let elapsed = self.lock().start_time.elapsed();
        if summary.started == 0 {
            return;
        }

        if summary.failed > 0 {
            warn!(
                "Downloads finished in {:.1}s | Requested: {} | Completed: {} | Failed: {} | Pending: {} | Untracked: {}",
                elapsed.as_secs_f64(),
                summary.started,
                summary.completed,
                summary.failed,
                summary.pending,
                summary.untracked
            );
            let mut categories: Vec<_> = summary.error_counts.iter().collect();
            categories.sort_by(|a, b| b.1.cmp(a.1));
            for (category, count) in categories {
                warn!("  {}: {}", category, count);
            }
        } else {
            info!(
                "Downloads finished in {:.1}s | Requested: {} | Completed: {} | Pending: {} | Untracked: {}",
                elapsed.as_secs_f64(),
                summary.started,
                summary.completed,
                summary.pending,
                summary.untracked
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::UiEvent;
    use tokio::sync::mpsc;

    fn board() -> (StatusBoard, mpsc::UnboundedReceiver<UiEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (StatusBoard::new(Arc::new(tx.clone()), Arc::new(tx)), rx)
    }

    fn progress_events(rx: &mut mpsc::UnboundedReceiver<UiEvent>) -> Vec<DownloadStatus> {
        let mut statuses = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let UiEvent::Progress { status, .. } = event {
                statuses.push(status);
            }
        }
        statuses
    }

    #[test]
    fn test_forward_sequence_is_forwarded() {
        let (board, mut rx) = board();
        let id = RequestId::from("0_1");
        assert!(board.report(&id, DownloadStatus::Starting));
        assert!(board.report(&id, DownloadStatus::Moving));
        assert!(board.report(&id, DownloadStatus::Completed));
        assert_eq!(
            progress_events(&mut rx),
            vec![DownloadStatus::Starting, DownloadStatus::Moving, DownloadStatus::Completed]
        );
    }

    #[test]
    fn test_terminal_status_reported_at_most_once() {
        let (board, mut rx) = board();
        let id = RequestId::from("0_1");
        board.report(&id, DownloadStatus::Starting);
        assert!(board.report(&id, DownloadStatus::Failed));
        assert!(!board.report(&id, DownloadStatus::Completed));
        assert!(!board.report(&id, DownloadStatus::Failed));

        assert_eq!(
            progress_events(&mut rx),
            vec![DownloadStatus::Starting, DownloadStatus::Failed]
        );
        assert_eq!(board.status_of(&id), Some(DownloadStatus::Failed));
    }

    #[test]
    fn test_summary_counts_pending_and_errors() {
        let (board, _rx) = board();
        let done = RequestId::from("0_1");
        let broken = RequestId::from("1_1");
        let waiting = RequestId::from("2_1");
        for id in [&done, &broken, &waiting] {
            board.report(id, DownloadStatus::Starting);
        }
        board.report(&done, DownloadStatus::Completed);
        board.fail(&broken, &DownloadError::StaleIndex { index: 1, available: 0 });

        let summary = board.summary();
        assert_eq!(summary.started, 3);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.pending, 1);
        assert_eq!(summary.error_counts.get("stale_index"), Some(&1));
    }

    #[test]
    fn test_untracked_request_is_not_pending() {
        let (board, _rx) = board();
        let tracked = RequestId::from("0_1");
        let untracked = RequestId::from("1_1");
        board.report(&tracked, DownloadStatus::Starting);
        board.report(&untracked, DownloadStatus::Starting);
        board.mark_untracked(&untracked);

        let summary = board.summary();
        assert_eq!(summary.pending, 1);
        assert_eq!(summary.untracked, 1);
        assert!(board.is_settled(&untracked));
        assert!(!board.is_settled(&tracked));
        assert_eq!(board.status_of(&untracked), Some(DownloadStatus::Starting));

        board.report(&tracked, DownloadStatus::Completed);
        assert!(board.is_settled(&tracked));
        assert_eq!(board.summary().pending, 0);
    }
}
