use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub downloads: DownloadConfig,
    #[serde(default)]
    pub topics: TopicsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default = "default_login_url")]
    pub login_url: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default = "default_true")]
    pub headless: bool,
    /// Saved Chromium executable; discovered automatically when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chrome_executable: Option<PathBuf>,
    #[serde(default = "default_window_size")]
    pub window_size: (u32, u32),
    /// Profile directory; defaults to the data dir when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Directory the browser writes into
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,
    /// User-selected storage location
    #[serde(default = "default_destination_root")]
    pub destination_root: PathBuf,
    /// Fixed folder appended to `destination_root`
    #[serde(default = "default_subfolder")]
    pub subfolder: String,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_ready_timeout_secs")]
    pub ready_timeout_secs: u64,
    #[serde(default = "default_relocate_attempts")]
    pub relocate_attempts: u32,
    #[serde(default = "default_relocate_backoff_ms")]
    pub relocate_backoff_ms: u64,
    #[serde(default = "default_processed_set_limit")]
    pub processed_set_limit: usize,
    #[serde(default = "default_partial_suffixes")]
    pub partial_suffixes: Vec<String>,
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    #[serde(default = "default_format_prompt_timeout_secs")]
    pub format_prompt_timeout_secs: u64,
    /// How finished file names are correlated with scraped identifiers
    #[serde(default)]
    pub match_mode: MatchMode,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    #[default]
    Substring,
    Token,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicsConfig {
    #[serde(default = "default_topics_file")]
    pub file: PathBuf,
}

fn default_true() -> bool {
    true
}

fn default_login_url() -> String {
    "https://www2.kolhalashon.com/#/login/%2FregularSite%2Fnew".to_string()
}

fn default_base_url() -> String {
    "https://www2.kolhalashon.com/".to_string()
}

fn default_window_size() -> (u32, u32) {
    (1400, 900)
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

fn default_temp_dir() -> PathBuf {
    home_dir().join("Downloads").join("kol_halashon_temp")
}

fn default_destination_root() -> PathBuf {
    home_dir()
}

fn default_subfolder() -> String {
    "Kol Halashon".to_string()
}

fn default_poll_interval_secs() -> u64 {
    2
}

fn default_ready_timeout_secs() -> u64 {
    10
}

fn default_relocate_attempts() -> u32 {
    3
}

fn default_relocate_backoff_ms() -> u64 {
    1000
}

fn default_processed_set_limit() -> usize {
    100
}

fn default_partial_suffixes() -> Vec<String> {
    vec![".crdownload".to_string(), ".tmp".to_string()]
}

fn default_settle_delay_ms() -> u64 {
    1500
}

fn default_format_prompt_timeout_secs() -> u64 {
    5
}

fn default_topics_file() -> PathBuf {
    PathBuf::from("topics.json")
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            login_url: default_login_url(),
            base_url: default_base_url(),
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: default_true(),
            chrome_executable: None,
            window_size: default_window_size(),
            user_data_dir: None,
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            temp_dir: default_temp_dir(),
            destination_root: default_destination_root(),
            subfolder: default_subfolder(),
            poll_interval_secs: default_poll_interval_secs(),
            ready_timeout_secs: default_ready_timeout_secs(),
            relocate_attempts: default_relocate_attempts(),
            relocate_backoff_ms: default_relocate_backoff_ms(),
            processed_set_limit: default_processed_set_limit(),
            partial_suffixes: default_partial_suffixes(),
            settle_delay_ms: default_settle_delay_ms(),
            format_prompt_timeout_secs: default_format_prompt_timeout_secs(),
            match_mode: MatchMode::default(),
        }
    }
}

impl Default for TopicsConfig {
    fn default() -> Self {
        Self {
            file: default_topics_file(),
        }
    }
}

impl DownloadConfig {
    /// Where relocated files end up: the storage location plus the fixed subfolder
    pub fn final_download_dir(&self) -> PathBuf {
        self.destination_root.join(&self.subfolder)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }

    pub fn relocate_backoff(&self) -> Duration {
        Duration::from_millis(self.relocate_backoff_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn format_prompt_timeout(&self) -> Duration {
        Duration::from_secs(self.format_prompt_timeout_secs)
    }
}

impl Config {
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load the config file if present, otherwise fall back to defaults
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            tracing::debug!("No config file at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    pub fn save_to_file(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let downloads = &self.downloads;
        if downloads.poll_interval_secs == 0 {
            return Err(anyhow::anyhow!("downloads.poll_interval_secs must be greater than zero"));
        }
        if downloads.relocate_attempts == 0 {
            return Err(anyhow::anyhow!("downloads.relocate_attempts must be at least 1"));
        }
        if downloads.processed_set_limit == 0 {
            return Err(anyhow::anyhow!("downloads.processed_set_limit must be greater than zero"));
        }
        if downloads.partial_suffixes.iter().all(|s| s.trim().is_empty()) {
            return Err(anyhow::anyhow!("downloads.partial_suffixes must list at least one suffix"));
        }
        if downloads.subfolder.trim().is_empty() {
            return Err(anyhow::anyhow!("downloads.subfolder cannot be empty"));
        }
        if self.site.login_url.is_empty() {
            return Err(anyhow::anyhow!("site.login_url cannot be empty"));
        }
        Ok(())
    }
}
