use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a single download request as seen by the front-end
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    /// Request dequeued, browser download being triggered
    Starting,
    /// Completed file detected in the temp directory, relocation in progress
    Moving,
    /// File relocated to the final download directory
    Completed,
    /// Request or relocation failed
    Failed,
}

impl DownloadStatus {
    /// Completed and Failed end a request's lifecycle
    pub fn is_terminal(&self) -> bool {
        matches!(self, DownloadStatus::Completed | DownloadStatus::Failed)
    }

    /// Position in the forward-only ordering. Completed and Failed share a rank.
    pub fn rank(&self) -> u8 {
        match self {
            DownloadStatus::Starting => 0,
            DownloadStatus::Moving => 1,
            DownloadStatus::Completed | DownloadStatus::Failed => 2,
        }
    }

    /// Whether a request currently in `self` may be reported as `next`
    pub fn can_advance_to(&self, next: DownloadStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }

    /// Default progress value shown alongside the status
    pub fn progress_value(&self) -> f32 {
        match self {
            DownloadStatus::Starting | DownloadStatus::Failed => 0.0,
            DownloadStatus::Moving | DownloadStatus::Completed => 1.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadStatus::Starting => "starting",
            DownloadStatus::Moving => "moving",
            DownloadStatus::Completed => "completed",
            DownloadStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        assert!(DownloadStatus::Starting.can_advance_to(DownloadStatus::Moving));
        assert!(DownloadStatus::Starting.can_advance_to(DownloadStatus::Failed));
        assert!(DownloadStatus::Moving.can_advance_to(DownloadStatus::Completed));
        assert!(!DownloadStatus::Moving.can_advance_to(DownloadStatus::Starting));
        assert!(!DownloadStatus::Starting.can_advance_to(DownloadStatus::Starting));
    }

    #[test]
    fn test_terminal_statuses_do_not_advance() {
        assert!(!DownloadStatus::Completed.can_advance_to(DownloadStatus::Failed));
        assert!(!DownloadStatus::Failed.can_advance_to(DownloadStatus::Completed));
        assert!(DownloadStatus::Completed.is_terminal());
        assert!(!DownloadStatus::Moving.is_terminal());
    }

    #[test]
    fn test_serde_uses_lowercase_names() {
        let json = serde_json::to_string(&DownloadStatus::Moving).unwrap();
        assert_eq!(json, "\"moving\"");
        assert_eq!(DownloadStatus::Failed.to_string(), "failed");
    }
}
