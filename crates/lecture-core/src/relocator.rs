use crate::error::DownloadError;
use crate::prober;
use async_trait::async_trait;
use lecture_config::DownloadConfig;
use std::ffi::OsStr;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// The filesystem calls a move is made of
#[async_trait]
pub trait FileOps: Send + Sync {
    async fn rename(&self, source: &Path, destination: &Path) -> io::Result<()>;
    async fn copy(&self, source: &Path, destination: &Path) -> io::Result<u64>;
    async fn remove(&self, path: &Path) -> io::Result<()>;
}

/// `tokio::fs`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioFs;

#[async_trait]
impl FileOps for TokioFs {
    async fn rename(&self, source: &Path, destination: &Path) -> io::Result<()> {
        tokio::fs::rename(source, destination).await
    }

    async fn copy(&self, source: &Path, destination: &Path) -> io::Result<u64> {
        tokio::fs::copy(source, destination).await
    }

    async fn remove(&self, path: &Path) -> io::Result<()> {
        tokio::fs::remove_file(path).await
    }
}

/// Moves finished downloads into the destination directory
#[derive(Clone)]
pub struct Relocator {
    max_attempts: u32,
    ready_timeout: Duration,
    backoff: Duration,
    fs: Arc<dyn FileOps>,
}

impl fmt::Debug for Relocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relocator")
            .field("max_attempts", &self.max_attempts)
            .field("ready_timeout", &self.ready_timeout)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

impl Relocator {
    pub fn new(max_attempts: u32, ready_timeout: Duration, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ready_timeout,
            backoff,
            fs: Arc::new(TokioFs),
        }
    }

    pub fn with_file_ops(mut self, fs: Arc<dyn FileOps>) -> Self {
        self.fs = fs;
        self
    }

    pub fn from_config(config: &DownloadConfig) -> Self {
        Self::new(
            config.relocate_attempts,
            config.ready_timeout(),
            config.relocate_backoff(),
        )
    }

    /// Move `source` into `dest_dir`, returning where it landed.
    ///
    /// The file must pass the readiness probe first; that check is not retried.
    /// Name collisions get a ` (n)` suffix before the extension.
    pub async fn relocate(&self, source: &Path, dest_dir: &Path) -> Result<PathBuf, DownloadError> {
        if !prober::is_ready(source, self.ready_timeout).await {
            return Err(DownloadError::FileNeverReady(source.to_path_buf()));
        }

        let file_name = source.file_name().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, format!("{:?} has no file name", source))
        })?;
        tokio::fs::create_dir_all(dest_dir).await?;

        for attempt in 1..=self.max_attempts {
            // Recomputed every attempt; an earlier attempt may have taken the name
            let destination = unique_destination(dest_dir, file_name);
            match move_file(self.fs.as_ref(), source, &destination).await {
                Ok(()) => {
                    info!(
                        operation = "relocate",
                        "Moved {:?} to {:?}",
                        source.file_name().unwrap_or_default(),
                        destination
                    );
                    return Ok(destination);
                }
                Err(e) => {
                    warn!(
                        operation = "relocate",
                        attempt,
                        max_attempts = self.max_attempts,
                        "Move of {:?} failed: {}",
                        source,
                        e
                    );
                    if attempt < self.max_attempts {
                        tokio::time::sleep(self.backoff).await;
                    }
                }
            }
        }

        Err(DownloadError::RelocationRetriesExhausted {
            path: source.to_path_buf(),
            attempts: self.max_attempts,
        })
    }
}

/// First free name for `file_name` in `dir`: `a.mp3`, then `a (1).mp3`, `a (2).mp3`, ...
pub fn unique_destination(dir: &Path, file_name: &OsStr) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }

    let name = Path::new(file_name);
    let stem = name
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let extension = name.extension().map(|e| e.to_string_lossy().to_string());

    let mut n: u32 = 1;
    loop {
        let numbered = match &extension {
            Some(ext) => format!("{} ({}).{}", stem, n, ext),
            None => format!("{} ({})", stem, n),
        };
        let candidate = dir.join(numbered);
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

/// Rename, or copy then delete when rename cannot cross filesystems.
/// A failed copy never leaves a partial file at `destination`.
async fn move_file(fs: &dyn FileOps, source: &Path, destination: &Path) -> io::Result<()> {
    let rename_err = match fs.rename(source, destination).await {
        Ok(()) => return Ok(()),
        Err(e) => e,
    };
    debug!("rename failed ({}), falling back to copy", rename_err);

    if let Err(e) = fs.copy(source, destination).await {
        discard(fs, destination).await;
        return Err(e);
    }
    if let Err(e) = fs.remove(source).await {
        discard(fs, destination).await;
        return Err(e);
    }
    Ok(())
}

async fn discard(fs: &dyn FileOps, path: &Path) {
    if let Err(e) = fs.remove(path).await {
        if e.kind() != io::ErrorKind::NotFound {
            warn!("Could not remove incomplete copy {:?}: {}", path, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick_relocator() -> Relocator {
        Relocator::new(3, Duration::from_millis(300), Duration::from_millis(10))
    }

    /// Rename always fails, as it does across filesystems. Copies write a
    /// few bytes and then fail when `copy_fails` is set.
    #[derive(Default)]
    struct CrossDeviceFs {
        copy_fails: bool,
        renames: AtomicU32,
    }

    #[async_trait]
    impl FileOps for CrossDeviceFs {
        async fn rename(&self, _source: &Path, _destination: &Path) -> io::Result<()> {
            self.renames.fetch_add(1, Ordering::SeqCst);
            Err(io::Error::new(io::ErrorKind::Other, "cross-device link"))
        }

        async fn copy(&self, source: &Path, destination: &Path) -> io::Result<u64> {
            if self.copy_fails {
                tokio::fs::write(destination, b"tru").await?;
                return Err(io::Error::new(io::ErrorKind::Other, "no space left on device"));
            }
            tokio::fs::copy(source, destination).await
        }

        async fn remove(&self, path: &Path) -> io::Result<()> {
            tokio::fs::remove_file(path).await
        }
    }

    #[tokio::test]
    async fn test_relocate_moves_file_and_creates_destination() {
        let temp = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        let final_dir = dest.path().join("Kol Halashon");
        let source = temp.path().join("a.mp3");
        std::fs::write(&source, b"one").unwrap();

        let moved = quick_relocator().relocate(&source, &final_dir).await.unwrap();

        assert_eq!(moved, final_dir.join("a.mp3"));
        assert!(!source.exists());
        assert_eq!(std::fs::read(&moved).unwrap(), b"one");
    }

    #[tokio::test]
    async fn test_collisions_get_numbered_suffixes() {
        let temp = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        std::fs::write(dest.path().join("a.mp3"), b"existing").unwrap();
        let relocator = quick_relocator();

        let source = temp.path().join("a.mp3");
        std::fs::write(&source, b"second").unwrap();
        let second = relocator.relocate(&source, dest.path()).await.unwrap();
        assert_eq!(second, dest.path().join("a (1).mp3"));

        std::fs::write(&source, b"third").unwrap();
        let third = relocator.relocate(&source, dest.path()).await.unwrap();
        assert_eq!(third, dest.path().join("a (2).mp3"));

        assert_eq!(std::fs::read(dest.path().join("a.mp3")).unwrap(), b"existing");
    }

    #[tokio::test]
    async fn test_unready_source_fails_without_moving() {
        let temp = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        let stub = temp.path().join("stub.mp3");
        std::fs::create_dir(&stub).unwrap();

        let err = quick_relocator().relocate(&stub, dest.path()).await.unwrap_err();
        assert!(matches!(err, DownloadError::FileNeverReady(_)));
        assert!(stub.exists());
        assert!(!dest.path().join("stub.mp3").exists());
    }

    #[tokio::test]
    async fn test_cross_device_move_copies_then_removes_source() {
        let temp = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        let source = temp.path().join("a.mp3");
        std::fs::write(&source, b"audio").unwrap();

        let moved = quick_relocator()
            .with_file_ops(Arc::new(CrossDeviceFs::default()))
            .relocate(&source, dest.path())
            .await
            .unwrap();

        assert_eq!(moved, dest.path().join("a.mp3"));
        assert_eq!(std::fs::read(&moved).unwrap(), b"audio");
        assert!(!source.exists());
    }

    #[tokio::test]
    async fn test_failed_copies_leave_no_partial_files() {
        let temp = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        let source = temp.path().join("a.mp3");
        std::fs::write(&source, b"audio").unwrap();
        let fs = Arc::new(CrossDeviceFs {
            copy_fails: true,
            ..CrossDeviceFs::default()
        });

        let backoff = Duration::from_millis(40);
        let relocator = Relocator::new(3, Duration::from_millis(300), backoff).with_file_ops(fs.clone());
        let started = std::time::Instant::now();
        let err = relocator.relocate(&source, dest.path()).await.unwrap_err();

        assert!(matches!(
            err,
            DownloadError::RelocationRetriesExhausted { attempts: 3, ref path } if *path == source
        ));
        assert_eq!(fs.renames.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= backoff * 2);
        assert!(source.exists());
        assert_eq!(std::fs::read_dir(dest.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_unique_destination_without_extension() {
        let dest = tempfile::tempdir().unwrap();
        std::fs::write(dest.path().join("README"), b"").unwrap();
        assert_eq!(
            unique_destination(dest.path(), OsStr::new("README")),
            dest.path().join("README (1)")
        );
    }
}
