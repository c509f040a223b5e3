//! Waiting for a producer to let go of a file.
//!
//! A file that shows up in the drop zone may still be open in the producer.
//! Before touching it the orchestrator probes it with an exclusive open and,
//! while that fails with a sharing or permission error, sleeps and retries.
//! There is no retry limit: past a threshold the retries are logged as
//! warnings so stuck files become visible without being given up on.

use std::fs::{File, OpenOptions, TryLockError};
use std::io;
use std::time::Duration;

use camino::Utf8Path;
use dz_core::WatchConfig;
use tokio_util::sync::CancellationToken;

use crate::error::AccessError;

#[cfg(windows)]
const ERROR_SHARING_VIOLATION: i32 = 32;
#[cfg(windows)]
const ERROR_LOCK_VIOLATION: i32 = 33;

/// Retry schedule for [`wait_accessible`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessPolicy {
    /// Fixed delay between probes.
    pub retry_interval: Duration,
    /// Retries after which each further retry is logged as a warning.
    pub warn_after: u32,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self {
            retry_interval: Duration::from_secs(5),
            warn_after: 24,
        }
    }
}

impl From<&WatchConfig> for AccessPolicy {
    fn from(config: &WatchConfig) -> Self {
        Self {
            retry_interval: config.access_retry_interval(),
            warn_after: config.access_retry_warn_after,
        }
    }
}

/// Waits until `path` can be opened exclusively.
///
/// Returns the number of retries it took.
///
/// # Errors
///
/// - [`AccessError::NotFound`] if the file disappears
/// - [`AccessError::Io`] for any failure other than a sharing or permission error
/// - [`AccessError::Cancelled`] if `cancel` fires while waiting
pub async fn wait_accessible(
    path: &Utf8Path,
    policy: &AccessPolicy,
    cancel: &CancellationToken,
) -> Result<u32, AccessError> {
    let mut retries: u32 = 0;

    loop {
        let probe_path = path.to_owned();
        let probed = tokio::task::spawn_blocking(move || probe(&probe_path))
            .await
            .map_err(|e| AccessError::Io {
                path: path.to_owned(),
                source: io::Error::other(e),
            })?;

        match probed {
            Ok(()) => {
                if retries > 0 {
                    tracing::debug!(path = %path, retries, "File became accessible");
                }
                return Ok(retries);
            }
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                return Err(AccessError::NotFound(path.to_owned()));
            }
            Err(error) if is_transient(&error) => {
                retries = retries.saturating_add(1);
                if retries > policy.warn_after {
                    tracing::warn!(path = %path, retry = retries, error = %error, "File still locked");
                } else {
                    tracing::debug!(path = %path, retry = retries, error = %error, "File locked, retrying");
                }
            }
            Err(error) => {
                return Err(AccessError::Io {
                    path: path.to_owned(),
                    source: error,
                });
            }
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(AccessError::Cancelled(path.to_owned())),
            () = tokio::time::sleep(policy.retry_interval) => {}
        }
    }
}

/// Opens `path` without sharing and takes an exclusive lock, then lets go.
fn probe(path: &Utf8Path) -> io::Result<()> {
    let file = exclusive_open(path)?;
    match file.try_lock() {
        Ok(()) => Ok(()),
        Err(TryLockError::WouldBlock) => Err(io::Error::from(io::ErrorKind::WouldBlock)),
        Err(TryLockError::Error(error)) => Err(error),
    }
}

#[cfg(windows)]
fn exclusive_open(path: &Utf8Path) -> io::Result<File> {
    use std::os::windows::fs::OpenOptionsExt;
    OpenOptions::new().read(true).share_mode(0).open(path)
}

#[cfg(not(windows))]
fn exclusive_open(path: &Utf8Path) -> io::Result<File> {
    OpenOptions::new().read(true).open(path)
}

/// Sharing violations and permission errors are worth waiting out.
pub(crate) fn is_transient(error: &io::Error) -> bool {
    is_sharing_violation(error)
        || matches!(
            error.kind(),
            io::ErrorKind::WouldBlock | io::ErrorKind::PermissionDenied | io::ErrorKind::ResourceBusy
        )
}

#[cfg(windows)]
fn is_sharing_violation(error: &io::Error) -> bool {
    matches!(
        error.raw_os_error(),
        Some(ERROR_SHARING_VIOLATION | ERROR_LOCK_VIOLATION)
    )
}

#[cfg(not(windows))]
fn is_sharing_violation(_error: &io::Error) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use camino::Utf8PathBuf;
    use tempfile::TempDir;

    use super::*;

    fn fast() -> AccessPolicy {
        AccessPolicy {
            retry_interval: Duration::from_millis(50),
            warn_after: 2,
        }
    }

    fn file_in(dir: &TempDir, name: &str) -> Utf8PathBuf {
        let path = Utf8PathBuf::from_path_buf(dir.path().join(name)).unwrap();
        std::fs::write(&path, "{}").unwrap();
        path
    }

    #[test]
    fn test_transient_classes() {
        assert!(is_transient(&io::Error::from(io::ErrorKind::PermissionDenied)));
        assert!(is_transient(&io::Error::from(io::ErrorKind::WouldBlock)));
        assert!(!is_transient(&io::Error::from(io::ErrorKind::InvalidData)));
        assert!(!is_transient(&io::Error::from(io::ErrorKind::NotFound)));
    }

    #[tokio::test]
    async fn test_free_file_is_immediately_accessible() {
        let dir = TempDir::new().unwrap();
        let path = file_in(&dir, "a.json");
        let retries = wait_accessible(&path, &fast(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(retries, 0);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("gone.json")).unwrap();
        let result = wait_accessible(&path, &fast(), &CancellationToken::new()).await;
        assert!(matches!(result, Err(AccessError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_waits_for_lock_release() {
        let dir = TempDir::new().unwrap();
        let path = file_in(&dir, "locked.json");
        let holder = File::open(&path).unwrap();
        holder.lock().unwrap();

        let release = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            drop(holder);
        });

        let started = Instant::now();
        let retries = wait_accessible(&path, &fast(), &CancellationToken::new())
            .await
            .unwrap();
        release.await.unwrap();

        assert!(retries >= 1);
        assert!(started.elapsed() >= Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_cancel_stops_waiting() {
        let dir = TempDir::new().unwrap();
        let path = file_in(&dir, "held.json");
        let holder = File::open(&path).unwrap();
        holder.lock().unwrap();

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(120)).await;
            trigger.cancel();
        });

        let result = wait_accessible(&path, &fast(), &cancel).await;
        assert!(matches!(result, Err(AccessError::Cancelled(_))));
        drop(holder);
    }
}
