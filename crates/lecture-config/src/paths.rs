use anyhow::Result;
use lecture_models::StorageLocation;
use std::path::{Path, PathBuf};

/// Get the container base path from environment variable, defaulting to "/app"
pub fn container_base_path() -> PathBuf {
    std::env::var("LECTUREFETCH_BASE_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/app"))
}

pub struct PathManager {
    config_dir: PathBuf,
    data_dir: PathBuf,
    log_dir: PathBuf,
}

impl PathManager {
    pub fn new() -> Result<Self> {
        let base_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
            .join("lecturefetch");

        Ok(Self {
            config_dir: base_dir.clone(),
            data_dir: base_dir.join("data"),
            log_dir: base_dir.join("logs"),
        })
    }

    pub fn from_base(base: &Path) -> Self {
        Self {
            config_dir: base.to_path_buf(),
            data_dir: base.join("data"),
            log_dir: base.join("logs"),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    pub fn credentials_file(&self) -> PathBuf {
        self.config_dir.join("credentials.toml")
    }

    pub fn log_file(&self) -> PathBuf {
        self.log_dir.join("lecturefetch.log")
    }

    /// Persistent Chromium profile
    pub fn browser_profile_dir(&self) -> PathBuf {
        self.data_dir.join("browser")
    }

    /// Where the browser fetcher stores a downloaded Chromium
    pub fn chromium_download_dir(&self) -> PathBuf {
        self.data_dir.join("chromium_downloads")
    }

    /// Failure screenshots and page dumps
    pub fn diagnostics_dir(&self) -> PathBuf {
        self.data_dir.join("diagnostics")
    }

    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.config_dir)?;
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(&self.log_dir)?;
        Ok(())
    }
}

impl Default for PathManager {
    fn default() -> Self {
        // A pre-created container base directory wins over platform paths
        let base = container_base_path();
        if base.exists() {
            return Self::from_base(&base);
        }

        Self::new().unwrap_or_else(|_| Self::from_base(&base))
    }
}

/// Places the user can pick as the download destination.
///
/// The home directory always comes first; mounted volumes follow.
pub fn storage_locations() -> Vec<StorageLocation> {
    let mut locations = Vec::new();

    if let Some(home) = dirs::home_dir() {
        locations.push(StorageLocation {
            label: home.display().to_string(),
            path: home,
        });
    }

    locations.extend(platform_volumes());
    locations
}

#[cfg(target_os = "macos")]
fn platform_volumes() -> Vec<StorageLocation> {
    let mut volumes = Vec::new();
    let entries = match std::fs::read_dir("/Volumes") {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Could not list /Volumes: {}", e);
            return volumes;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let is_link = std::fs::symlink_metadata(&path)
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(true);
        if path.is_dir() && !is_link {
            volumes.push(StorageLocation {
                label: entry.file_name().to_string_lossy().to_string(),
                path,
            });
        }
    }
    volumes.sort_by(|a, b| a.label.cmp(&b.label));
    volumes
}

#[cfg(windows)]
fn platform_volumes() -> Vec<StorageLocation> {
    (b'A'..=b'Z')
        .map(|letter| format!("{}:\\", letter as char))
        .filter(|root| Path::new(root).exists())
        .map(|root| StorageLocation {
            label: root.clone(),
            path: PathBuf::from(root),
        })
        .collect()
}

#[cfg(not(any(target_os = "macos", windows)))]
fn platform_volumes() -> Vec<StorageLocation> {
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_base_layout() {
        let paths = PathManager::from_base(Path::new("/srv/lf"));
        assert_eq!(paths.config_file(), PathBuf::from("/srv/lf/config.toml"));
        assert_eq!(paths.credentials_file(), PathBuf::from("/srv/lf/credentials.toml"));
        assert_eq!(paths.log_file(), PathBuf::from("/srv/lf/logs/lecturefetch.log"));
        assert_eq!(paths.browser_profile_dir(), PathBuf::from("/srv/lf/data/browser"));
    }

    #[test]
    fn test_ensure_directories() {
        let dir = tempfile::tempdir().unwrap();
        let paths = PathManager::from_base(dir.path());
        paths.ensure_directories().unwrap();
        assert!(paths.data_dir().is_dir());
        assert!(paths.log_dir().is_dir());
    }

    #[test]
    fn test_home_is_first_storage_location() {
        let locations = storage_locations();
        if let Some(home) = dirs::home_dir() {
            assert_eq!(locations[0].path, home);
        }
    }
}
