//! Process-level store locking.
//!
//! Every mutation of the scan ledger is a read-modify-write of a whole file,
//! so writers are serialized through an exclusive lock on a sibling
//! `.lock` file. Bootstrap takes the same lock on each store it creates.
//! Readers never take the lock; they rely on atomic replace.
//!
//! Uses the `fs2` crate for cross-platform file locking (flock/LockFileEx).

use chrono::Local;
use fs2::FileExt;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Delay between attempts while waiting for a contended lock.
const RETRY_INTERVAL: Duration = Duration::from_millis(20);

/// Errors from lock operations.
#[derive(Debug, Error)]
pub enum LockError {
    #[error("Store is locked by another writer: {}", .0.display())]
    Locked(PathBuf),

    #[error("Store busy: lock on {} not acquired within {}ms", path.display(), waited.as_millis())]
    Timeout { path: PathBuf, waited: Duration },

    #[error("Failed to create lock file: {0}")]
    CreateFailed(#[source] io::Error),

    #[error("Failed to acquire lock: {0}")]
    AcquireFailed(#[source] io::Error),
}

/// A guard that holds an exclusive lock on a store file.
///
/// The lock is automatically released when the guard is dropped.
pub struct StoreLockGuard {
    _file: File,
    lock_path: PathBuf,
    sidecar_path: Option<PathBuf>,
}

impl StoreLockGuard {
    /// Get the path to the lock file.
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }
}

#[derive(Serialize)]
struct LockSidecar {
    pid: u32,
    exe: Option<String>,
    timestamp: String,
}

fn sidecar_path_for(lock_path: &Path) -> PathBuf {
    let ext = lock_path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("lock");
    lock_path.with_extension(format!("{ext}.json"))
}

/// Record who holds the lock, for diagnosing a stuck writer.
fn write_lock_sidecar(lock_path: &Path) -> Option<PathBuf> {
    let sidecar = LockSidecar {
        pid: std::process::id(),
        exe: std::env::current_exe().ok().map(|p| p.display().to_string()),
        timestamp: Local::now().to_rfc3339(),
    };
    let sidecar_path = sidecar_path_for(lock_path);
    match serde_json::to_vec_pretty(&sidecar)
        .map_err(io::Error::other)
        .and_then(|payload| fs::write(&sidecar_path, payload))
    {
        Ok(()) => Some(sidecar_path),
        Err(e) => {
            warn!(
                "Failed to write lock sidecar {}: {}",
                sidecar_path.display(),
                e
            );
            None
        }
    }
}

impl Drop for StoreLockGuard {
    fn drop(&mut self) {
        debug!("Releasing store lock: {}", self.lock_path.display());
        if let Some(path) = &self.sidecar_path {
            if let Err(e) = fs::remove_file(path) {
                debug!("Failed to remove lock sidecar {}: {}", path.display(), e);
            }
        }
        // File is unlocked when closed
    }
}

impl std::fmt::Debug for StoreLockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreLockGuard")
            .field("lock_path", &self.lock_path)
            .finish()
    }
}

/// Get the lock file path for a store path.
///
/// Examples:
/// - `/data/scans.csv` → `/data/scans.csv.lock`
/// - `/data/scans` → `/data/scans.lock` (no double-dot)
pub fn lock_path_for(store_path: &Path) -> PathBuf {
    let mut lock_path = store_path.to_path_buf();
    match lock_path.extension() {
        Some(ext) => {
            let new_ext = format!("{}.lock", ext.to_string_lossy());
            lock_path.set_extension(new_ext);
        }
        None => {
            lock_path.set_extension("lock");
        }
    }
    lock_path
}

fn open_lock_file(lock_path: &Path) -> Result<File, LockError> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(lock_path)
        .map_err(LockError::CreateFailed)
}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

/// Try to acquire an exclusive lock on a store file.
///
/// Non-blocking: returns `Err(LockError::Locked)` immediately if another
/// writer holds the lock.
pub fn try_lock_exclusive(store_path: &Path) -> Result<StoreLockGuard, LockError> {
    let lock_path = lock_path_for(store_path);
    let file = open_lock_file(&lock_path)?;

    // Fully qualified so newer toolchains don't resolve to std's File::try_lock_exclusive
    match FileExt::try_lock_exclusive(&file) {
        Ok(()) => {
            debug!("Acquired exclusive store lock: {}", lock_path.display());
            let sidecar_path = write_lock_sidecar(&lock_path);
            Ok(StoreLockGuard {
                _file: file,
                lock_path,
                sidecar_path,
            })
        }
        Err(e) if is_contended(&e) => Err(LockError::Locked(store_path.to_path_buf())),
        Err(e) => Err(LockError::AcquireFailed(e)),
    }
}

/// Acquire an exclusive lock, waiting at most `timeout`.
///
/// Fails with `LockError::Timeout` if the lock is still held by another
/// writer when the wait expires.
pub fn lock_exclusive_timeout(
    store_path: &Path,
    timeout: Duration,
) -> Result<StoreLockGuard, LockError> {
    let started = Instant::now();
    let mut contended = false;
    loop {
        match try_lock_exclusive(store_path) {
            Ok(guard) => {
                if contended {
                    info!(
                        waited_ms = started.elapsed().as_millis() as u64,
                        "Acquired contended store lock: {}",
                        guard.lock_path().display()
                    );
                }
                return Ok(guard);
            }
            Err(LockError::Locked(_)) => {
                let waited = started.elapsed();
                if waited >= timeout {
                    warn!(
                        "Gave up waiting for store lock after {}ms: {}",
                        waited.as_millis(),
                        store_path.display()
                    );
                    return Err(LockError::Timeout {
                        path: store_path.to_path_buf(),
                        waited,
                    });
                }
                if !contended {
                    debug!("Store lock contended, waiting: {}", store_path.display());
                    contended = true;
                }
                thread::sleep(RETRY_INTERVAL.min(timeout - waited));
            }
            Err(e) => return Err(e),
        }
    }
}

/// Check whether a store is currently locked by another writer.
///
/// This attempts to acquire the lock and immediately releases it.
pub fn is_locked(store_path: &Path) -> bool {
    match try_lock_exclusive(store_path) {
        Ok(_guard) => false,
        Err(LockError::Locked(_)) => true,
        Err(e) => {
            warn!("Failed to check lock status: {}", e);
            false
        }
    }
}
