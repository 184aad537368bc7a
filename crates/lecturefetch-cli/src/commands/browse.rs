use super::prompts;
use super::ui::DownloadUi;
use super::{load_config, path_manager, start_session};
use crate::output::Output;
use color_eyre::Result;
use lecture_browser::ChromeDriver;
use lecture_config::{storage_locations, Config, PathManager};
use lecture_core::{
    load_topics, shared, ArchiveSession, DownloadPipeline, SharedBrowser, StatusBoard, UiEvent,
};
use lecture_models::{DownloadRequest, FilterCategory, Lesson, PageResult, Rav};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::info;

const MAIN_MENU: [&str; 4] = ["Search", "Browse topics", "Storage location", "Quit"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResultsAction {
    Download,
    Filter,
    NextPage,
    RefreshPage,
    ReloadResults,
    Back,
}

impl ResultsAction {
    const ALL: [ResultsAction; 6] = [
        ResultsAction::Download,
        ResultsAction::Filter,
        ResultsAction::NextPage,
        ResultsAction::RefreshPage,
        ResultsAction::ReloadResults,
        ResultsAction::Back,
    ];

    fn label(self) -> &'static str {
        match self {
            ResultsAction::Download => "Download lessons",
            ResultsAction::Filter => "Filter",
            ResultsAction::NextPage => "Next page",
            ResultsAction::RefreshPage => "Reload page",
            ResultsAction::ReloadResults => "Re-read results",
            ResultsAction::Back => "Back",
        }
    }
}

fn lesson_label(lesson: &Lesson) -> String {
    let mut label = lesson.title.clone();
    for extra in [&lesson.rav, &lesson.date] {
        if !extra.is_empty() {
            label.push_str(" | ");
            label.push_str(extra);
        }
    }
    label
}

fn rav_label(rav: &Rav) -> String {
    if rav.count.is_empty() {
        rav.name.clone()
    } else {
        format!("{} ({})", rav.name, rav.count)
    }
}

fn filter_labels(filters: &[FilterCategory]) -> Vec<String> {
    filters
        .iter()
        .map(|c| format!("{} ({})", c.category_name, c.filters.len()))
        .collect()
}

/// Everything one interactive run owns
struct Browser<'a> {
    output: &'a Output,
    paths: PathManager,
    config: Config,
    browser: SharedBrowser<ChromeDriver>,
    session: ArchiveSession<ChromeDriver>,
    pipeline: DownloadPipeline,
    board: StatusBoard,
    events: UnboundedSender<UiEvent>,
    ui: DownloadUi,
}

pub async fn run_browse(output: &Output) -> Result<()> {
    let paths = path_manager();
    let config = load_config(&paths)?;

    let (events, events_rx) = mpsc::unbounded_channel::<UiEvent>();
    let ui = DownloadUi::spawn(events_rx);
    let board = StatusBoard::new(Arc::new(events.clone()), Arc::new(events.clone()));

    let driver = match start_session(&config, &paths, &events).await {
        Ok(driver) => driver,
        Err(e) => {
            drop(board);
            drop(events);
            ui.finish().await;
            return Err(e);
        }
    };
    let browser = shared(driver);
    let session = ArchiveSession::new(browser.clone(), Arc::new(events.clone()));
    let pipeline = DownloadPipeline::start(browser.clone(), &config.downloads, board.clone());

    let mut state = Browser {
        output,
        paths,
        config,
        browser,
        session,
        pipeline,
        board,
        events,
        ui,
    };
    let result = state.main_loop().await;
    state.shutdown().await;
    result
}

impl<'a> Browser<'a> {
    async fn main_loop(&mut self) -> Result<()> {
        loop {
            let Some(choice) = prompts::select("What next?", &MAIN_MENU)? else {
                return Ok(());
            };
            match choice {
                0 => {
                    let query = prompts::prompt_string("Search", None)?;
                    let query = query.trim();
                    if query.is_empty() {
                        continue;
                    }
                    let page = self.session.perform_search(query).await;
                    self.results_loop(page).await?;
                }
                1 => {
                    if let Some(page) = self.pick_topic().await? {
                        self.results_loop(page).await?;
                    }
                }
                2 => self.change_location().await?,
                _ => {
                    let pending = self.board.summary().pending;
                    if pending == 0
                        || prompts::prompt_yes_no(
                            &format!("{} downloads are still running. Quit anyway?", pending),
                            false,
                        )?
                    {
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn pick_topic(&self) -> Result<Option<PageResult>> {
        let topics_file = &self.config.topics.file;
        let catalog = load_topics(topics_file)
            .map_err(|e| color_eyre::eyre::eyre!("Failed to read topics from {}: {}", topics_file.display(), e))?;
        let Some(catalog) = catalog.filter(|c| !c.is_empty()) else {
            self.output.warn(format!("No topic catalog at {}", topics_file.display()));
            return Ok(None);
        };

        let categories = catalog.category_names();
        let Some(category) = prompts::select("Category", &categories)? else {
            return Ok(None);
        };
        let topics = catalog.topics(categories[category]);
        let names: Vec<&str> = topics.iter().map(|t| t.name.as_str()).collect();
        let Some(topic) = prompts::select("Topic", &names)? else {
            return Ok(None);
        };
        Ok(Some(self.session.navigate_to_topic(&topics[topic].href).await))
    }

    /// Drive one listing until the user backs out
    async fn results_loop(&self, mut page: PageResult) -> Result<()> {
        loop {
            page = match page {
                PageResult::Error { message } => {
                    self.output.error(message);
                    return Ok(());
                }
                PageResult::RavSelection { ravs } => {
                    let labels: Vec<String> = ravs.iter().map(rav_label).collect();
                    match prompts::select("Choose a rav", &labels)? {
                        Some(index) => self.session.select_rav(ravs[index].id).await,
                        None => return Ok(()),
                    }
                }
                PageResult::Lessons { lessons, filters } => {
                    self.output.info(format!("{} lessons on this page", lessons.len()));
                    let labels: Vec<&str> = ResultsAction::ALL.iter().map(|a| a.label()).collect();
                    let action = prompts::select("Results", &labels)?
                        .map(|i| ResultsAction::ALL[i])
                        .unwrap_or(ResultsAction::Back);

                    match action {
                        ResultsAction::Download => {
                            self.queue_downloads(&lessons)?;
                            PageResult::Lessons { lessons, filters }
                        }
                        ResultsAction::Filter => match self.pick_filter(&filters)? {
                            Some(name) => self.session.apply_filter(&name).await,
                            None => PageResult::Lessons { lessons, filters },
                        },
                        ResultsAction::NextPage => match self.session.next_page().await {
                            Some(next) => next,
                            None => PageResult::Lessons { lessons, filters },
                        },
                        ResultsAction::RefreshPage => self.session.refresh_browser_page().await,
                        ResultsAction::ReloadResults => self.session.refresh_content().await,
                        ResultsAction::Back => return Ok(()),
                    }
                }
            };
        }
    }

    fn pick_filter(&self, filters: &[FilterCategory]) -> Result<Option<String>> {
        if filters.is_empty() {
            self.output.warn("No filters on this page");
            return Ok(None);
        }
        let Some(category) = prompts::select("Filter by", &filter_labels(filters))? else {
            return Ok(None);
        };
        let options = &filters[category].filters;
        Ok(prompts::select(&filters[category].category_name, options)?.map(|i| options[i].clone()))
    }

    fn queue_downloads(&self, lessons: &[Lesson]) -> Result<()> {
        let labels: Vec<String> = lessons.iter().map(lesson_label).collect();
        let chosen = prompts::multi_select("Select lessons (space to mark, enter to confirm)", &labels)?;
        for index in chosen {
            let lesson = &lessons[index];
            let request = DownloadRequest::new(lesson.id, &lesson.title);
            self.ui.label(&request.id, &lesson.title);
            match self.pipeline.enqueue(request) {
                Ok(request) => info!(request_id = %request, "Queued '{}'", lesson.title),
                Err(e) => self.output.error(format!("Could not queue '{}': {}", lesson.title, e)),
            }
        }
        Ok(())
    }

    /// Move the library folder. The monitor is restarted so it picks up the
    /// new destination, which is only safe once nothing is in flight.
    async fn change_location(&mut self) -> Result<()> {
        if self.board.summary().pending > 0 {
            self.output.warn("Downloads are still in progress; change the location once they finish");
            return Ok(());
        }
        let locations = storage_locations();
        let labels: Vec<String> = locations
            .iter()
            .map(|l| format!("{} ({})", l.label, l.path.display()))
            .collect();
        let Some(index) = prompts::select("Save downloads under", &labels)? else {
            return Ok(());
        };

        self.config.downloads.destination_root = locations[index].path.clone();
        let config_file = self.paths.config_file();
        if let Err(e) = self.config.save_to_file(&config_file) {
            self.output.warn(format!("Could not save {}: {}", config_file.display(), e));
        }

        let restarted = DownloadPipeline::start(self.browser.clone(), &self.config.downloads, self.board.clone());
        let previous = std::mem::replace(&mut self.pipeline, restarted);
        previous.shutdown().await;

        self.output.success(format!(
            "Downloads will be saved to {}",
            self.config.downloads.final_download_dir().display()
        ));
        Ok(())
    }

    async fn shutdown(self) {
        let Browser {
            output,
            session,
            pipeline,
            board,
            events,
            ui,
            browser,
            ..
        } = self;

        output.info("Finishing queued downloads...");
        pipeline.shutdown().await;
        session.close().await;
        let summary = board.summary();
        drop(session);
        drop(browser);
        drop(board);
        drop(events);
        ui.finish().await;

        if summary.started > 0 {
            output.info(format!(
                "Downloads: {} completed, {} failed, {} unfinished, {} untracked",
                summary.completed, summary.failed, summary.pending, summary.untracked
            ));
        }
    }
}
