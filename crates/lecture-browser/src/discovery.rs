use anyhow::{anyhow, Result};
use chromiumoxide::fetcher::{BrowserFetcher, BrowserFetcherOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use which::which;

/// Check if we're running in Docker
pub fn is_docker() -> bool {
    Path::new("/.dockerenv").exists()
        || std::fs::read_to_string("/proc/self/cgroup")
            .ok()
            .map(|s| s.contains("docker") || s.contains("containerd"))
            .unwrap_or(false)
}

/// Remove macOS quarantine attribute (Gatekeeper can block execution)
#[cfg(target_os = "macos")]
fn remove_macos_quarantine(path: &Path) {
    use std::process::Command;
    let _ = Command::new("xattr")
        .arg("-d")
        .arg("com.apple.quarantine")
        .arg(path)
        .output();
}

#[cfg(not(target_os = "macos"))]
fn remove_macos_quarantine(_path: &Path) {}

/// Locate a Chromium or Chrome binary on this machine
pub fn find_system_chromium() -> Option<PathBuf> {
    if is_docker() {
        for path in ["/usr/bin/chromium", "/usr/bin/chromium-browser"] {
            if Path::new(path).exists() {
                return Some(PathBuf::from(path));
            }
        }
    }

    if cfg!(target_os = "macos") {
        let macos_paths = [
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/opt/homebrew/bin/chromium",
            "/usr/local/bin/chromium",
        ];
        for path in macos_paths {
            let path_buf = PathBuf::from(path);
            if path_buf.exists() {
                remove_macos_quarantine(&path_buf);
                if let Some(app_bundle) = path_buf.parent().and_then(|p| p.parent()).and_then(|p| p.parent()) {
                    remove_macos_quarantine(app_bundle);
                }
                return Some(path_buf);
            }
        }
    }

    if cfg!(windows) {
        let program_dirs = [
            std::env::var("ProgramFiles").ok(),
            std::env::var("ProgramFiles(x86)").ok(),
            std::env::var("LOCALAPPDATA").ok(),
        ];
        for base in program_dirs.into_iter().flatten() {
            let candidate = Path::new(&base).join("Google/Chrome/Application/chrome.exe");
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    let system_paths = [
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/usr/bin/google-chrome",
        "/usr/local/bin/chromium",
        "/usr/local/bin/chromium-browser",
        "/opt/chromium/chromium",
    ];
    for path in system_paths {
        if Path::new(path).exists() {
            return Some(PathBuf::from(path));
        }
    }

    which("chromium")
        .or_else(|_| which("chromium-browser"))
        .or_else(|_| which("google-chrome"))
        .ok()
}

/// Resolve the executable to launch: the configured path, then the system,
/// then a fetched Chromium under `fetcher_dir`
pub async fn resolve_executable(configured: Option<&Path>, fetcher_dir: &Path) -> Result<PathBuf> {
    if let Some(path) = configured {
        if path.exists() {
            debug!("Using configured browser executable {:?}", path);
            return Ok(path.to_path_buf());
        }
        warn!("Configured browser executable {:?} does not exist, searching the system", path);
    }

    if let Some(path) = find_system_chromium() {
        info!("Found system browser at {:?}", path);
        return Ok(path);
    }

    info!("No system Chromium found, downloading via BrowserFetcher...");
    tokio::fs::create_dir_all(fetcher_dir).await?;
    let fetcher = BrowserFetcher::new(
        BrowserFetcherOptions::builder()
            .with_path(fetcher_dir)
            .build()
            .map_err(|e| anyhow!("Failed to create BrowserFetcherOptions: {}", e))?,
    );
    let fetched = fetcher
        .fetch()
        .await
        .map_err(|e| anyhow!("Failed to fetch Chromium: {}", e))?;

    let path = fetched.executable_path;
    remove_macos_quarantine(&path);
    info!("Chromium downloaded to: {:?}", path);
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_configured_executable_wins() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let resolved = resolve_executable(Some(file.path()), dir.path()).await.unwrap();
        assert_eq!(resolved, file.path());
    }
}
