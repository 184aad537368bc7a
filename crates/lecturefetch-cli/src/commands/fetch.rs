use super::ui::DownloadUi;
use super::{load_config, path_manager, start_session};
use crate::output::Output;
use color_eyre::Result;
use lecture_core::{shared, wait_until, ArchiveSession, DownloadPipeline, StatusBoard, UiEvent};
use lecture_models::{DownloadRequest, Lesson, PageResult, RequestId};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const COMPLETION_POLL: Duration = Duration::from_millis(500);

/// Pick the requested positions out of the listed lessons
fn select_lessons<'a>(lessons: &'a [Lesson], items: &[usize]) -> (Vec<&'a Lesson>, Vec<usize>) {
    let mut chosen = Vec::new();
    let mut missing = Vec::new();
    for &index in items {
        match lessons.get(index) {
            Some(lesson) => chosen.push(lesson),
            None => missing.push(index),
        }
    }
    (chosen, missing)
}

pub async fn run_fetch(query: &str, items: &[usize], wait_secs: u64, output: &Output) -> Result<()> {
    let paths = path_manager();
    let config = load_config(&paths)?;

    let (events, events_rx) = mpsc::unbounded_channel::<UiEvent>();
    let ui = DownloadUi::spawn(events_rx);
    let board = StatusBoard::new(Arc::new(events.clone()), Arc::new(events.clone()));

    let driver = start_session(&config, &paths, &events).await?;
    let browser = shared(driver);
    let session = ArchiveSession::new(browser.clone(), Arc::new(events.clone()));
    let pipeline = DownloadPipeline::start(browser, &config.downloads, board.clone());

    let mut requested: Vec<RequestId> = Vec::new();
    let outcome = match session.perform_search(query).await {
        PageResult::Lessons { lessons, .. } => {
            let (chosen, missing) = select_lessons(&lessons, items);
            for index in missing {
                output.warn(format!("No result at position {} ({} listed)", index, lessons.len()));
            }
            for lesson in chosen {
                let request = DownloadRequest::new(lesson.id, &lesson.title);
                ui.label(&request.id, &lesson.title);
                match pipeline.enqueue(request) {
                    Ok(request) => requested.push(request),
                    Err(e) => tracing::error!("Could not queue '{}': {}", lesson.title, e),
                }
            }
            Ok(())
        }
        PageResult::RavSelection { ravs } => Err(color_eyre::eyre::eyre!(
            "The query matched {} rabbis; use 'lecturefetch browse' to pick one",
            ravs.len()
        )),
        PageResult::Error { message } => Err(color_eyre::eyre::eyre!("Search failed: {}", message)),
    };

    if !requested.is_empty() {
        let finished = wait_until(Duration::from_secs(wait_secs), COMPLETION_POLL, || {
            let done = requested.iter().all(|r| board.is_settled(r));
            async move { done }
        })
        .await;
        if !finished {
            output.warn("Timed out waiting for downloads; unfinished ones stay in the browser's temp folder");
        }
    }

    pipeline.shutdown().await;
    session.close().await;
    let summary = board.summary();
    drop(session);
    drop(board);
    drop(events);
    ui.finish().await;

    outcome?;

    output.json(&json!({
        "type": "fetch",
        "query": query,
        "requested": summary.started,
        "completed": summary.completed,
        "failed": summary.failed,
        "pending": summary.pending,
        "untracked": summary.untracked,
    }));
    if summary.untracked > 0 {
        output.info(format!(
            "{} downloads had no identifier and were not tracked; check the browser's temp folder for their files",
            summary.untracked
        ));
    }
    if summary.failed > 0 || summary.pending > 0 {
        output.warn(format!(
            "Completed {} of {} downloads ({} failed, {} unfinished)",
            summary.completed, summary.started, summary.failed, summary.pending
        ));
    } else {
        output.success(format!("Completed {} downloads", summary.completed));
    }
    Ok(())
}
