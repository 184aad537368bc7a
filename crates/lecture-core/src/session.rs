use crate::browser::{wait_until, BrowserHandle, SharedBrowser, ELEMENT_POLL_INTERVAL};
use crate::error::BrowserError;
use crate::events::StatusSink;
use crate::selectors::SiteSelectors;
use lecture_models::{FilterCategory, Lesson, PageResult, Rav};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Hebrew prefix ("the rabbi") that routes a query to the rav search
const RAV_QUERY_PREFIX: &str = "הרב";
/// Label of the "show more" toggle in filter groups
const SHOW_MORE_LABEL: &str = "הצג עוד";
const MAX_SHOW_MORE_CLICKS: usize = 20;

pub(crate) const EXTRACT_LESSONS_SCRIPT: &str = r#"
const shiurim = [];
document.querySelectorAll(arguments[0]).forEach((el, i) => {
    const title = el.querySelector('.shiurim-title')?.textContent.trim() || '';
    const rav = el.querySelector('.shiurim-rav-name')?.textContent.trim() || '';
    const date = el.querySelector('.shiurim-start-time')?.textContent.trim() || '';
    shiurim.push({ id: i, title: title, rav: rav, date: date });
});
return shiurim;
"#;

pub(crate) const EXTRACT_RAVS_SCRIPT: &str = r#"
const ravs = [];
document.querySelectorAll(arguments[0]).forEach((el, i) => {
    const name = el.querySelector('.rav-name')?.textContent.trim() || '';
    const count = el.querySelector('.rav-shiurim-sum')?.textContent.trim() || '';
    ravs.push({ id: i, name: name, count: count });
});
return ravs;
"#;

pub(crate) const RAV_NAME_READY_SCRIPT: &str = r#"
const el = document.querySelector(arguments[0]);
return !!(el && el.textContent.trim());
"#;

pub(crate) const SET_HASH_SCRIPT: &str = "window.location.hash = arguments[0]; return true;";

pub(crate) const MARK_FIRST_LESSON_SCRIPT: &str = r#"
const el = document.querySelector(arguments[0]);
if (!el) { return false; }
el.setAttribute('data-lecturefetch-marker', '1');
return true;
"#;

pub(crate) const MARKER_GONE_SCRIPT: &str =
    "return document.querySelector('[data-lecturefetch-marker]') === null;";

pub(crate) const CLICK_FILTER_SCRIPT: &str = r#"
const wanted = arguments[0];
for (const cb of document.querySelectorAll('mat-checkbox.filter-option')) {
    const label = cb.querySelector('.mat-checkbox-label');
    if (label && label.textContent.trim().includes(wanted)) {
        const input = cb.querySelector('input');
        (input || cb).click();
        return true;
    }
}
return false;
"#;

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub results_timeout: Duration,
    pub results_attempts: u32,
    /// Pause after the results appear, and between attempts
    pub settle_delay: Duration,
    pub rav_name_timeout: Duration,
    pub navigation_timeout: Duration,
    pub filter_settle_delay: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            results_timeout: Duration::from_secs(10),
            results_attempts: 3,
            settle_delay: Duration::from_secs(2),
            rav_name_timeout: Duration::from_secs(10),
            navigation_timeout: Duration::from_secs(20),
            filter_settle_delay: Duration::from_secs(1),
        }
    }
}

/// Route for a free-text query
pub fn search_route(query: &str) -> &'static str {
    if query.trim().starts_with(RAV_QUERY_PREFIX) {
        "ravSearch"
    } else {
        "searchResults"
    }
}

/// Hash fragment the site's router expects for a search
pub fn search_hash(query: &str) -> String {
    format!("#/regularSite/{}/{}", search_route(query), urlencoding::encode(query))
}

/// Page-level operations on the archive site.
///
/// Every operation holds the browser lock for its whole duration, so it never
/// interleaves with the download worker.
pub struct ArchiveSession<B: BrowserHandle> {
    browser: SharedBrowser<B>,
    status: Arc<dyn StatusSink>,
    selectors: SiteSelectors,
    settings: SessionSettings,
}

impl<B: BrowserHandle> ArchiveSession<B> {
    pub fn new(browser: SharedBrowser<B>, status: Arc<dyn StatusSink>) -> Self {
        Self {
            browser,
            status,
            selectors: SiteSelectors::default(),
            settings: SessionSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: SessionSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_selectors(mut self, selectors: SiteSelectors) -> Self {
        self.selectors = selectors;
        self
    }

    pub fn browser(&self) -> SharedBrowser<B> {
        self.browser.clone()
    }

    fn failed(&self, operation: &str, err: BrowserError) -> PageResult {
        error!(operation = operation, "{}", err);
        self.status.status(&format!("Error: {} failed", operation));
        PageResult::error(format!("{} failed: {}", operation, err))
    }

    pub async fn perform_search(&self, query: &str) -> PageResult {
        self.status.status(&format!("Searching: '{}'", query));
        info!(operation = "search", "Searching for '{}'", query);
        let browser = self.browser.lock().await;
        if let Err(e) = browser
            .execute_script(SET_HASH_SCRIPT, vec![json!(search_hash(query))])
            .await
        {
            return self.failed("search", e);
        }
        self.results_page(&browser).await
    }

    pub async fn navigate_to_topic(&self, href: &str) -> PageResult {
        self.status.status("Opening category...");
        info!(operation = "navigate_topic", "Navigating to {}", href);
        let browser = self.browser.lock().await;
        if let Err(e) = browser.navigate(href).await {
            return self.failed("navigation", e);
        }
        self.results_page(&browser).await
    }

    pub async fn select_rav(&self, index: usize) -> PageResult {
        self.status.status("Selecting rav...");
        info!(operation = "select_rav", index, "Selecting rav");
        let browser = self.browser.lock().await;
        let ravs = match browser.find_elements(self.selectors.rav_item).await {
            Ok(ravs) => ravs,
            Err(e) => return self.failed("rav selection", e),
        };
        let Some(rav) = ravs.get(index) else {
            error!(index, available = ravs.len(), "Rav index out of range");
            self.status.status("Error: the selected rav is no longer listed. Try refreshing.");
            return PageResult::error("rav not found");
        };

        let result = async {
            let link = browser
                .find_within(rav, self.selectors.rav_link)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| BrowserError::Interaction("rav link not found".to_string()))?;
            browser.click(&link).await?;
            browser
                .wait_for_presence(self.selectors.lesson_item, self.settings.navigation_timeout)
                .await
        }
        .await;

        match result {
            Ok(()) => self.lessons_and_filters(&browser).await,
            Err(e) => self.failed("rav selection", e),
        }
    }

    pub async fn apply_filter(&self, name: &str) -> PageResult {
        self.status.status(&format!("Applying filter: {}", name));
        info!(operation = "apply_filter", "Applying filter '{}'", name);
        let browser = self.browser.lock().await;

        let marked = browser
            .execute_script(MARK_FIRST_LESSON_SCRIPT, vec![json!(self.selectors.lesson_item)])
            .await
            .map(|v| v.as_bool().unwrap_or(false))
            .unwrap_or(false);

        match browser.execute_script(CLICK_FILTER_SCRIPT, vec![json!(name)]).await {
            Ok(Value::Bool(true)) => {}
            Ok(_) => {
                warn!("No filter labelled '{}'", name);
                self.status.status(&format!("Error: filter not found: {}", name));
                return PageResult::error(format!("filter not found: {}", name));
            }
            Err(e) => return self.failed("filter", e),
        }

        if marked {
            // The old list must be replaced before the new one is read
            let browser_ref = &*browser;
            let replaced = wait_until(self.settings.navigation_timeout, ELEMENT_POLL_INTERVAL, || async move {
                browser_ref
                    .execute_script(MARKER_GONE_SCRIPT, Vec::new())
                    .await
                    .map(|v| v.as_bool().unwrap_or(false))
                    .unwrap_or(false)
            })
            .await;
            if !replaced {
                return self.failed(
                    "filter",
                    BrowserError::timeout("filtered results", self.settings.navigation_timeout),
                );
            }
        }

        if let Err(e) = browser
            .wait_for_presence(self.selectors.results_display, self.settings.navigation_timeout)
            .await
        {
            return self.failed("filter", e);
        }
        tokio::time::sleep(self.settings.filter_settle_delay).await;
        self.lessons_and_filters(&browser).await
    }

    /// `None` when there is no further page
    pub async fn next_page(&self) -> Option<PageResult> {
        self.status.status("Moving to the next page...");
        let browser = self.browser.lock().await;
        let next = browser
            .find_elements(self.selectors.next_page)
            .await
            .ok()
            .and_then(|found| found.into_iter().next());
        let Some(next) = next else {
            info!("No next page button");
            self.status.status("No next page.");
            return None;
        };
        if let Err(e) = browser.click(&next).await {
            return Some(self.failed("pagination", e));
        }
        Some(self.results_page(&browser).await)
    }

    /// Reload the browser tab, then read the results again
    pub async fn refresh_browser_page(&self) -> PageResult {
        self.status.status("Reloading page...");
        let browser = self.browser.lock().await;
        if let Err(e) = browser.reload().await {
            return self.failed("reload", e);
        }
        self.results_page(&browser).await
    }

    /// Re-read the current page without reloading
    pub async fn refresh_content(&self) -> PageResult {
        self.status.status("Refreshing results from the current page...");
        let browser = self.browser.lock().await;
        self.results_page(&browser).await
    }

    pub async fn handle_results_page(&self) -> PageResult {
        let browser = self.browser.lock().await;
        self.results_page(&browser).await
    }

    pub async fn close(&self) {
        info!("Closing browser");
        let browser = self.browser.lock().await;
        if let Err(e) = browser.close().await {
            warn!("Browser did not close cleanly: {}", e);
        }
    }

    async fn results_page(&self, browser: &B) -> PageResult {
        let any_results = self.selectors.any_results();
        for attempt in 1..=self.settings.results_attempts {
            if browser
                .wait_for_presence(&any_results, self.settings.results_timeout)
                .await
                .is_ok()
            {
                tokio::time::sleep(self.settings.settle_delay).await;

                if let Some(ravs) = self.rav_list(browser).await {
                    return PageResult::RavSelection { ravs };
                }
                let has_lessons = browser
                    .find_elements(self.selectors.lesson_item)
                    .await
                    .map(|found| !found.is_empty())
                    .unwrap_or(false);
                if has_lessons {
                    return self.lessons_and_filters(browser).await;
                }
            }

            debug!(attempt, "No results yet");
            if attempt < self.settings.results_attempts {
                self.status.status(&format!("Waiting for results (attempt {})...", attempt + 1));
                tokio::time::sleep(self.settings.settle_delay).await;
            }
        }

        warn!("No results after {} attempts", self.settings.results_attempts);
        self.status.status("No results found.");
        PageResult::error("no results after several attempts")
    }

    /// Rav list when the page shows one with a readable first name
    async fn rav_list(&self, browser: &B) -> Option<Vec<Rav>> {
        let containers = browser.find_elements(self.selectors.rav_item).await.ok()?;
        if containers.is_empty() {
            return None;
        }

        let name_selector = self.selectors.rav_name;
        let named = wait_until(self.settings.rav_name_timeout, ELEMENT_POLL_INTERVAL, || async move {
            browser
                .execute_script(RAV_NAME_READY_SCRIPT, vec![json!(name_selector)])
                .await
                .map(|v| v.as_bool().unwrap_or(false))
                .unwrap_or(false)
        })
        .await;
        if !named {
            warn!("Rav names did not render in time");
        }

        let value = match browser
            .execute_script(EXTRACT_RAVS_SCRIPT, vec![json!(self.selectors.rav_item)])
            .await
        {
            Ok(value) => value,
            Err(e) => {
                warn!("Could not read rav list: {}", e);
                return None;
            }
        };
        let ravs: Vec<Rav> = serde_json::from_value(value).unwrap_or_default();
        match ravs.first() {
            Some(first) if !first.name.is_empty() => {
                info!("Found {} ravs", ravs.len());
                Some(ravs)
            }
            _ => None,
        }
    }

    async fn lessons_and_filters(&self, browser: &B) -> PageResult {
        self.status.status("Loading lessons and filters...");
        let lessons = match self.extract_lessons(browser).await {
            Ok(lessons) => lessons,
            Err(e) => {
                warn!("Could not extract lessons: {}", e);
                self.status.status("Warning: could not read lesson details.");
                Vec::new()
            }
        };
        let filters = match self.extract_filters(browser).await {
            Ok(filters) => filters,
            Err(e) => {
                warn!("Could not extract filters: {}", e);
                self.status.status("Warning: could not load filters.");
                Vec::new()
            }
        };

        info!("Found {} lessons and {} filter categories", lessons.len(), filters.len());
        self.status.status(&format!(
            "Found {} lessons and {} filter categories.",
            lessons.len(),
            filters.len()
        ));
        PageResult::Lessons { lessons, filters }
    }

    async fn extract_lessons(&self, browser: &B) -> Result<Vec<Lesson>, BrowserError> {
        let value = browser
            .execute_script(EXTRACT_LESSONS_SCRIPT, vec![json!(self.selectors.lesson_item)])
            .await?;
        serde_json::from_value(value).map_err(|e| BrowserError::Script(e.to_string()))
    }

    async fn extract_filters(&self, browser: &B) -> Result<Vec<FilterCategory>, BrowserError> {
        let mut categories = Vec::new();
        for group in browser.find_elements(self.selectors.filter_group).await? {
            let Some(header) = browser
                .find_within(&group, self.selectors.filter_header)
                .await?
                .into_iter()
                .next()
            else {
                continue;
            };
            let category_name = normalize_label(&browser.element_text(&header).await?);
            if category_name.is_empty() {
                continue;
            }

            if !browser
                .find_within(&group, self.selectors.filter_collapsed)
                .await?
                .is_empty()
            {
                browser.click(&header).await?;
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
            self.expand_show_more(browser, &group).await?;

            let mut filters = Vec::new();
            for label in browser.find_within(&group, self.selectors.filter_label).await? {
                let text = normalize_label(&browser.element_text(&label).await?);
                if !text.is_empty() {
                    filters.push(text);
                }
            }
            if !filters.is_empty() {
                categories.push(FilterCategory {
                    category_name,
                    filters,
                });
            }
        }
        Ok(categories)
    }

    async fn expand_show_more(&self, browser: &B, group: &B::Element) -> Result<(), BrowserError> {
        for _ in 0..MAX_SHOW_MORE_CLICKS {
            let mut show_more = None;
            for candidate in browser.find_within(group, self.selectors.filter_show_more).await? {
                if browser.element_text(&candidate).await?.contains(SHOW_MORE_LABEL) {
                    show_more = Some(candidate);
                    break;
                }
            }
            match show_more {
                Some(button) => {
                    browser.click(&button).await?;
                    tokio::time::sleep(Duration::from_millis(500)).await;
                }
                None => return Ok(()),
            }
        }
        debug!("Stopped expanding filters after {} clicks", MAX_SHOW_MORE_CLICKS);
        Ok(())
    }
}

fn normalize_label(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::shared;
    use crate::testing::{FakeBrowser, FakeElement};
    use std::sync::atomic::Ordering;
    use tokio::sync::mpsc;

    fn quick_settings() -> SessionSettings {
        SessionSettings {
            results_timeout: Duration::from_millis(30),
            results_attempts: 2,
            settle_delay: Duration::from_millis(1),
            rav_name_timeout: Duration::from_millis(30),
            navigation_timeout: Duration::from_millis(50),
            filter_settle_delay: Duration::from_millis(1),
        }
    }

    fn session(fake: FakeBrowser) -> (ArchiveSession<FakeBrowser>, mpsc::UnboundedReceiver<crate::events::UiEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = ArchiveSession::new(shared(fake), Arc::new(tx)).with_settings(quick_settings());
        (session, rx)
    }

    fn lessons_page(fake: &FakeBrowser) {
        let selectors = SiteSelectors::default();
        fake.set_elements(&selectors.any_results(), vec![FakeElement::new("l0")]);
        fake.set_elements(selectors.lesson_item, vec![FakeElement::new("l0"), FakeElement::new("l1")]);
        fake.set_elements(
            selectors.filter_group,
            vec![FakeElement::new("group")
                .with_child(selectors.filter_header, FakeElement::new("header").with_text(" Topic "))
                .with_child(selectors.filter_collapsed, FakeElement::new("collapsed"))
                .with_child(selectors.filter_label, FakeElement::new("f1").with_text("Gemara\n  (12)"))
                .with_child(selectors.filter_label, FakeElement::new("f2").with_text("   "))],
        );
    }

    fn lesson_script_handler(script: &str, _args: &[Value]) -> Result<Value, BrowserError> {
        if script == EXTRACT_LESSONS_SCRIPT {
            Ok(json!([
                {"id": 0, "title": "Lesson A", "rav": "Rav X", "date": "2024"},
                {"id": 1, "title": "Lesson B", "rav": "", "date": ""}
            ]))
        } else if script == MARK_FIRST_LESSON_SCRIPT || script == MARKER_GONE_SCRIPT {
            Ok(json!(true))
        } else if script == CLICK_FILTER_SCRIPT {
            Ok(json!(true))
        } else {
            Ok(Value::Null)
        }
    }

    #[test]
    fn test_search_routes() {
        assert_eq!(search_route("הרב כהן"), "ravSearch");
        assert_eq!(search_route("  הרב"), "ravSearch");
        assert_eq!(search_route("שבת"), "searchResults");
        assert_eq!(search_hash("a b"), "#/regularSite/searchResults/a%20b");
    }

    #[tokio::test]
    async fn test_search_sets_hash_and_reads_lessons() {
        let fake = FakeBrowser::new();
        lessons_page(&fake);
        fake.on_script(lesson_script_handler);
        let (session, _rx) = session(fake);

        let result = session.perform_search("daf yomi").await;

        match result {
            PageResult::Lessons { lessons, filters } => {
                assert_eq!(lessons.len(), 2);
                assert_eq!(lessons[0].title, "Lesson A");
                assert_eq!(
                    filters,
                    vec![FilterCategory {
                        category_name: "Topic".to_string(),
                        filters: vec!["Gemara (12)".to_string()],
                    }]
                );
            }
            other => panic!("unexpected result: {:?}", other),
        }
        let browser = session.browser();
        let browser = browser.lock().await;
        let scripts = browser.scripts.lock().unwrap();
        assert_eq!(scripts[0].0, SET_HASH_SCRIPT);
        assert_eq!(scripts[0].1, vec![json!("#/regularSite/searchResults/daf%20yomi")]);
        assert_eq!(browser.clicked(), vec!["header"]);
    }

    #[tokio::test]
    async fn test_rav_results_are_detected() {
        let fake = FakeBrowser::new();
        let selectors = SiteSelectors::default();
        fake.set_elements(&selectors.any_results(), vec![FakeElement::new("r0")]);
        fake.set_elements(selectors.rav_item, vec![FakeElement::new("r0")]);
        fake.on_script(|script, _| {
            if script == RAV_NAME_READY_SCRIPT {
                Ok(json!(true))
            } else if script == EXTRACT_RAVS_SCRIPT {
                Ok(json!([{"id": 0, "name": "Rav Cohen", "count": "120"}]))
            } else {
                Ok(Value::Null)
            }
        });
        let (session, _rx) = session(fake);

        match session.perform_search("הרב כהן").await {
            PageResult::RavSelection { ravs } => {
                assert_eq!(ravs.len(), 1);
                assert_eq!(ravs[0].name, "Rav Cohen");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_page_gives_error_after_retries() {
        let (session, mut rx) = session(FakeBrowser::new());
        let result = session.refresh_content().await;
        assert!(result.is_error());

        let mut saw_retry = false;
        while let Ok(event) = rx.try_recv() {
            if let crate::events::UiEvent::Status(message) = event {
                saw_retry |= message.contains("attempt 2");
            }
        }
        assert!(saw_retry);
    }

    #[tokio::test]
    async fn test_select_rav_out_of_range() {
        let fake = FakeBrowser::new();
        fake.set_elements(SiteSelectors::default().rav_item, vec![FakeElement::new("r0")]);
        let (session, _rx) = session(fake);

        assert_eq!(session.select_rav(3).await, PageResult::error("rav not found"));
        assert!(session.browser().lock().await.clicked().is_empty());
    }

    #[tokio::test]
    async fn test_select_rav_clicks_link() {
        let fake = FakeBrowser::new();
        let selectors = SiteSelectors::default();
        fake.set_elements(
            selectors.rav_item,
            vec![FakeElement::new("r0").with_child(selectors.rav_link, FakeElement::new("r0-link"))],
        );
        fake.on_click("r0-link", selectors.lesson_item, vec![FakeElement::new("l0")]);
        fake.on_script(lesson_script_handler);
        let (session, _rx) = session(fake);

        let result = session.select_rav(0).await;
        assert_eq!(result.lessons().len(), 2);
        assert_eq!(session.browser().lock().await.clicked()[0], "r0-link");
    }

    #[tokio::test]
    async fn test_apply_filter_waits_for_new_results() {
        let fake = FakeBrowser::new();
        lessons_page(&fake);
        fake.set_elements(SiteSelectors::default().results_display, vec![FakeElement::new("display")]);
        fake.on_script(lesson_script_handler);
        let (session, _rx) = session(fake);

        let result = session.apply_filter("Gemara").await;
        assert_eq!(result.lessons().len(), 2);
    }

    #[tokio::test]
    async fn test_apply_unknown_filter_is_error() {
        let fake = FakeBrowser::new();
        fake.on_script(|script, _| {
            if script == CLICK_FILTER_SCRIPT {
                Ok(json!(false))
            } else {
                Ok(Value::Null)
            }
        });
        let (session, _rx) = session(fake);

        assert!(session.apply_filter("Nothing").await.is_error());
    }

    #[tokio::test]
    async fn test_next_page_absent_returns_none() {
        let (session, _rx) = session(FakeBrowser::new());
        assert!(session.next_page().await.is_none());
    }

    #[tokio::test]
    async fn test_next_page_clicks_and_reads_results() {
        let fake = FakeBrowser::new();
        lessons_page(&fake);
        fake.set_elements(SiteSelectors::default().next_page, vec![FakeElement::new("next")]);
        fake.on_script(lesson_script_handler);
        let (session, _rx) = session(fake);

        let result = session.next_page().await.unwrap();
        assert_eq!(result.lessons().len(), 2);
        assert_eq!(session.browser().lock().await.clicked()[0], "next");
    }

    #[tokio::test]
    async fn test_refresh_and_close() {
        let fake = FakeBrowser::new();
        lessons_page(&fake);
        fake.on_script(lesson_script_handler);
        let (session, _rx) = session(fake);

        assert!(!session.refresh_browser_page().await.is_error());
        session.close().await;

        let browser = session.browser();
        let browser = browser.lock().await;
        assert_eq!(browser.reloads.load(Ordering::SeqCst), 1);
        assert!(browser.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_navigate_to_topic_visits_href() {
        let fake = FakeBrowser::new();
        lessons_page(&fake);
        fake.on_script(lesson_script_handler);
        let (session, _rx) = session(fake);

        session.navigate_to_topic("https://example.org/#/topic/1").await;
        let browser = session.browser();
        let navigations = browser.lock().await.navigations.lock().unwrap().clone();
        assert_eq!(navigations, vec!["https://example.org/#/topic/1"]);
    }
}
