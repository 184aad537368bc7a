pub mod browse;
pub mod catalog;
pub mod config;
pub mod fetch;
pub mod prompts;
pub mod ui;

use color_eyre::Result;
use lecture_browser::{login, ChromeDriver, LaunchOptions};
use lecture_config::{Config, CredentialStore, PathManager};
use lecture_core::{BrowserHandle, StatusSink};

pub fn path_manager() -> PathManager {
    PathManager::default()
}

/// Load and validate `config.toml`, defaults when it does not exist yet
pub fn load_config(paths: &PathManager) -> Result<Config> {
    let config_file = paths.config_file();
    let config = Config::load_or_default(&config_file)
        .map_err(|e| color_eyre::eyre::eyre!("Failed to load config from {}: {}", config_file.display(), e))?;
    config
        .validate()
        .map_err(|e| color_eyre::eyre::eyre!("Invalid configuration: {}", e))?;
    Ok(config)
}

/// Launch the browser and log in. The browser is closed again when login fails.
pub async fn start_session(config: &Config, paths: &PathManager, status: &dyn StatusSink) -> Result<ChromeDriver> {
    paths
        .ensure_directories()
        .map_err(|e| color_eyre::eyre::eyre!("Failed to create application directories: {}", e))?;

    let credentials_file = paths.credentials_file();
    let mut store = CredentialStore::new(credentials_file.clone());
    store
        .load()
        .map_err(|e| color_eyre::eyre::eyre!("Failed to load credentials from {}: {}", credentials_file.display(), e))?;
    let credentials = store.login().ok_or_else(|| {
        color_eyre::eyre::eyre!("No login stored. Run 'lecturefetch config credentials' first.")
    })?;

    status.status("Starting browser...");
    let driver = ChromeDriver::launch(LaunchOptions::from_config(config, paths))
        .await
        .map_err(|e| color_eyre::eyre::eyre!("Failed to start browser: {}", e))?;

    if let Err(e) = login(&driver, &credentials, &config.site, status).await {
        if let Err(close_err) = driver.close().await {
            tracing::warn!("Failed to close browser after login failure: {}", close_err);
        }
        return Err(color_eyre::eyre::eyre!("Login failed: {}", e));
    }
    Ok(driver)
}
