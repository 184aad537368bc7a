use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use lecture_core::UiEvent;
use lecture_models::{DownloadStatus, RequestId};
use std::collections::HashMap;
use std::io::IsTerminal;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

type Labels = Arc<Mutex<HashMap<RequestId, String>>>;

/// Renders status lines and per-download bars.
///
/// Background tasks never touch the terminal; they send [`UiEvent`]s and the
/// single task spawned here applies them.
pub struct DownloadUi {
    labels: Labels,
    renderer: JoinHandle<()>,
}

impl DownloadUi {
    pub fn spawn(events: UnboundedReceiver<UiEvent>) -> Self {
        let labels: Labels = Arc::default();
        let renderer = tokio::spawn(render(events, labels.clone(), is_interactive()));
        Self { labels, renderer }
    }

    /// Title shown next to a request's bar
    pub fn label(&self, request: &RequestId, title: &str) {
        self.labels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(request.clone(), title.to_string());
    }

    /// Wait for the renderer to drain; every sender must be dropped first
    pub async fn finish(self) {
        if let Err(e) = self.renderer.await {
            tracing::warn!("UI renderer ended abnormally: {}", e);
        }
    }
}

async fn render(mut events: UnboundedReceiver<UiEvent>, labels: Labels, interactive: bool) {
    let mut renderer = Renderer::new(labels, interactive);
    while let Some(event) = events.recv().await {
        renderer.apply(event);
    }
    renderer.finish();
}

struct Renderer {
    multi: MultiProgress,
    bars: HashMap<RequestId, ProgressBar>,
    labels: Labels,
    interactive: bool,
}

impl Renderer {
    fn new(labels: Labels, interactive: bool) -> Self {
        if !interactive {
            tracing::info!(
                operation = "ui_init",
                mode = "non_interactive",
                "Running in non-interactive mode - progress bars disabled, using structured logging"
            );
        }
        Self {
            multi: MultiProgress::new(),
            bars: HashMap::new(),
            labels,
            interactive,
        }
    }

    fn label_for(&self, request: &RequestId) -> String {
        self.labels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(request)
            .cloned()
            .unwrap_or_else(|| request.to_string())
    }

    fn apply(&mut self, event: UiEvent) {
        match event {
            UiEvent::Status(message) => {
                if self.interactive {
                    let _ = self.multi.println(&message);
                } else {
                    tracing::info!(operation = "status", message = %message, "Status update");
                }
            }
            UiEvent::Progress { request, value, status } => {
                if self.interactive {
                    self.update_bar(&request, value, status);
                } else {
                    tracing::info!(
                        operation = "progress",
                        request_id = %request,
                        percent = (value * 100.0) as u8,
                        status = %status,
                        "Download progress"
                    );
                }
            }
        }
    }

    fn update_bar(&mut self, request: &RequestId, value: f32, status: DownloadStatus) {
        let label = self.label_for(request);
        let bar = match self.bars.get(request) {
            Some(bar) => bar.clone(),
            None => {
                let bar = self.multi.add(ProgressBar::new(100));
                bar.set_style(bar_style());
                self.bars.insert(request.clone(), bar.clone());
                bar
            }
        };

        bar.set_position((value.clamp(0.0, 1.0) * 100.0) as u64);
        let message = format!("{}: {}", label, status);
        if status.is_terminal() {
            bar.finish_with_message(message);
        } else {
            bar.set_message(message);
        }
    }

    fn finish(&self) {
        for bar in self.bars.values() {
            if !bar.is_finished() {
                bar.abandon();
            }
        }
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("  {spinner:.yellow} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {percent:>3}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
}

pub fn is_interactive() -> bool {
    std::io::stdout().is_terminal() && std::io::stderr().is_terminal()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_falls_back_to_request_id() {
        let labels: Labels = Arc::default();
        let renderer = Renderer::new(labels.clone(), false);
        let request = RequestId::from("3_1700000000000");
        assert_eq!(renderer.label_for(&request), "3_1700000000000");

        labels.lock().unwrap().insert(request.clone(), "Parashat Noach".to_string());
        assert_eq!(renderer.label_for(&request), "Parashat Noach");
    }

    #[test]
    fn test_terminal_progress_finishes_bar() {
        let mut renderer = Renderer::new(Arc::default(), true);
        renderer.multi.set_draw_target(indicatif::ProgressDrawTarget::hidden());
        let request = RequestId::from("0_1");

        renderer.apply(UiEvent::Progress {
            request: request.clone(),
            value: 0.5,
            status: DownloadStatus::Moving,
        });
        assert!(!renderer.bars[&request].is_finished());
        assert_eq!(renderer.bars[&request].position(), 50);

        renderer.apply(UiEvent::Progress {
            request: request.clone(),
            value: 1.0,
            status: DownloadStatus::Completed,
        });
        assert!(renderer.bars[&request].is_finished());
    }

    #[test]
    fn test_label_set_before_first_event_names_the_bar() {
        let labels: Labels = Arc::default();
        let mut renderer = Renderer::new(labels.clone(), true);
        renderer.multi.set_draw_target(indicatif::ProgressDrawTarget::hidden());
        let request = RequestId::from("1_1700000000000");
        labels.lock().unwrap().insert(request.clone(), "Daf Yomi".to_string());

        renderer.apply(UiEvent::Progress {
            request: request.clone(),
            value: 0.0,
            status: DownloadStatus::Starting,
        });
        assert_eq!(renderer.bars[&request].message(), "Daf Yomi: starting");
    }
}
