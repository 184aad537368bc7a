/// CSS selectors for the archive site's Angular markup
#[derive(Debug, Clone)]
pub struct SiteSelectors {
    pub lesson_item: &'static str,
    /// Button next to each lesson showing its phone/extension code
    pub lesson_identifier: &'static str,
    pub download_button: &'static str,
    /// Audio entry of the "choose format" prompt
    pub format_option: &'static str,
    pub results_display: &'static str,
    pub rav_item: &'static str,
    pub rav_name: &'static str,
    pub rav_link: &'static str,
    pub filter_group: &'static str,
    pub filter_header: &'static str,
    pub filter_collapsed: &'static str,
    pub filter_show_more: &'static str,
    pub filter_label: &'static str,
    pub next_page: &'static str,
    pub login_code: &'static str,
    pub login_password: &'static str,
    pub logged_in_marker: &'static str,
}

impl Default for SiteSelectors {
    fn default() -> Self {
        Self {
            lesson_item: "app-shiurim-display .shiur-container",
            lesson_identifier: "button.click-phone-button",
            download_button: "button:has(svg-icon[src*='download-i.svg'])",
            format_option: "div.download-option",
            results_display: "app-shiurim-display",
            rav_item: ".rav-container",
            rav_name: ".rav-name",
            rav_link: "a.rav-name",
            filter_group: "app-filter-container",
            filter_header: ".filter-header",
            filter_collapsed: ".filter-container:not(.opened)",
            filter_show_more: ".display-more",
            filter_label: "mat-checkbox.filter-option .mat-checkbox-label",
            next_page: "app-pagination-options .next:not(.disabled)",
            login_code: "input[formcontrolname='code']",
            login_password: "input[formcontrolname='password']",
            logged_in_marker: ".banner-search input, .banner-title input",
        }
    }
}

impl SiteSelectors {
    /// Either a lesson list or a rav list means the results page rendered
    pub fn any_results(&self) -> String {
        format!("{}, {}", self.lesson_item, self.rav_item)
    }
}
