pub mod config;
pub mod credentials;
pub mod paths;

pub use config::{BrowserConfig, Config, DownloadConfig, MatchMode, SiteConfig, TopicsConfig};
pub use credentials::{CredentialStore, Credentials};
pub use paths::{container_base_path, storage_locations, PathManager};
