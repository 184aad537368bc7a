use lecture_models::{DownloadStatus, RequestId};
use tokio::sync::mpsc::UnboundedSender;

/// Receives human-readable status lines. Fire-and-forget.
pub trait StatusSink: Send + Sync {
    fn status(&self, message: &str);
}

/// Receives per-request progress updates
pub trait ProgressSink: Send + Sync {
    fn progress(&self, request: &RequestId, value: f32, status: DownloadStatus);
}

/// Everything the background tasks tell the front-end.
///
/// Events travel over one channel so a single task owns all rendering.
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    Status(String),
    Progress {
        request: RequestId,
        value: f32,
        status: DownloadStatus,
    },
}

impl StatusSink for UnboundedSender<UiEvent> {
    fn status(&self, message: &str) {
        if self.send(UiEvent::Status(message.to_string())).is_err() {
            tracing::trace!("UI channel closed, dropping status: {}", message);
        }
    }
}

impl ProgressSink for UnboundedSender<UiEvent> {
    fn progress(&self, request: &RequestId, value: f32, status: DownloadStatus) {
        let event = UiEvent::Progress {
            request: request.clone(),
            value,
            status,
        };
        if self.send(event).is_err() {
            tracing::trace!(request_id = %request, "UI channel closed, dropping progress");
        }
    }
}

/// Sink that only logs; used by non-interactive commands
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl StatusSink for LogSink {
    fn status(&self, message: &str) {
        tracing::info!("{}", message);
    }
}

impl ProgressSink for LogSink {
    fn progress(&self, request: &RequestId, value: f32, status: DownloadStatus) {
        tracing::info!(request_id = %request, progress = value, status = %status, "Download progress");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_channel_sink_forwards_events() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.status("searching");
        tx.progress(&RequestId::from("0_1"), 0.0, DownloadStatus::Starting);

        assert_eq!(rx.try_recv().unwrap(), UiEvent::Status("searching".to_string()));
        assert_eq!(
            rx.try_recv().unwrap(),
            UiEvent::Progress {
                request: RequestId::from("0_1"),
                value: 0.0,
                status: DownloadStatus::Starting,
            }
        );
    }

    #[test]
    fn test_closed_channel_does_not_panic() {
        let (tx, rx) = mpsc::unbounded_channel::<UiEvent>();
        drop(rx);
        tx.status("nobody listening");
    }
}
