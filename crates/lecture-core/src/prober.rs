use crate::browser::wait_until;
use std::fs::File;
use std::path::Path;
use std::time::Duration;

pub const PROBE_INTERVAL: Duration = Duration::from_millis(200);

/// Single readiness check: the path is a regular file that opens for reading.
/// Any IO error counts as "not yet".
pub fn is_ready_now(path: &Path) -> bool {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => File::open(path).is_ok(),
        _ => false,
    }
}

/// Poll until `path` is ready or `timeout` elapses
pub async fn is_ready(path: &Path, timeout: Duration) -> bool {
    wait_until(timeout, PROBE_INTERVAL, || async move { is_ready_now(path) }).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_existing_file_is_ready() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lesson.mp3");
        std::fs::write(&path, b"audio").unwrap();
        assert!(is_ready(&path, Duration::from_millis(100)).await);
    }

    #[tokio::test]
    async fn test_missing_file_times_out() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!is_ready(&dir.path().join("absent.mp3"), Duration::from_millis(250)).await);
    }

    #[tokio::test]
    async fn test_directory_is_never_ready() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!is_ready(dir.path(), Duration::from_millis(250)).await);
    }

    #[tokio::test]
    async fn test_file_appearing_during_wait_is_ready() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("late.mp3");
        let writer_path = path.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            std::fs::write(writer_path, b"audio").unwrap();
        });
        assert!(is_ready(&path, Duration::from_secs(2)).await);
    }
}
