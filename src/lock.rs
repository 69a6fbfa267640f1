//! Best-effort cross-process lock around the cache load/scan/save cycle.
//!
//! Two strategies sit behind [`CacheLock`]: `flock` on Unix and exclusive
//! lock-file creation elsewhere. Callers that fail to get the lock carry on
//! without it.

use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, SystemTime};
use tracing::debug;

/// Lock files older than this are assumed to belong to a dead process.
pub const STALE_LOCK_AGE: Duration = Duration::from_secs(30);

pub trait CacheLock {
    /// Try up to `attempts` times, sleeping `backoff` between tries.
    fn try_acquire(&self, attempts: u32, backoff: Duration) -> Option<LockGuard>;
}

/// Held lock; released when dropped.
#[derive(Debug)]
pub struct LockGuard {
    file: Option<File>,
    kind: GuardKind,
}

#[derive(Debug)]
enum GuardKind {
    Flock,
    Marker(PathBuf),
}

impl LockGuard {
    pub fn release(self) {}
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let Some(file) = self.file.take() else {
            return;
        };
        match &self.kind {
            GuardKind::Flock => {
                let _ = FileExt::unlock(&file);
            }
            GuardKind::Marker(path) => {
                drop(file);
                let _ = fs::remove_file(path);
            }
        }
    }
}

/// Advisory `flock(LOCK_EX | LOCK_NB)` on a lock file.
#[derive(Debug, Clone)]
pub struct FlockLock {
    path: PathBuf,
}

impl FlockLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CacheLock for FlockLock {
    fn try_acquire(&self, attempts: u32, backoff: Duration) -> Option<LockGuard> {
        let file = match OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&self.path)
        {
            Ok(f) => f,
            Err(e) => {
                debug!(path = %self.path.display(), "cannot open lock file: {e}");
                return None;
            }
        };

        for attempt in 0..attempts.max(1) {
            if file.try_lock_exclusive().is_ok() {
                return Some(LockGuard {
                    file: Some(file),
                    kind: GuardKind::Flock,
                });
            }
            if attempt + 1 < attempts {
                thread::sleep(backoff);
            }
        }
        None
    }
}

/// Lock by exclusively creating a marker file; removed on release.
#[derive(Debug, Clone)]
pub struct MarkerFileLock {
    path: PathBuf,
    stale_after: Duration,
}

impl MarkerFileLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            stale_after: STALE_LOCK_AGE,
        }
    }

    fn is_stale(&self) -> bool {
        fs::metadata(&self.path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|mtime| SystemTime::now().duration_since(mtime).ok())
            .is_some_and(|age| age > self.stale_after)
    }
}

impl CacheLock for MarkerFileLock {
    fn try_acquire(&self, attempts: u32, backoff: Duration) -> Option<LockGuard> {
        let mut attempt = 0;
        while attempt < attempts.max(1) {
            attempt += 1;
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&self.path)
            {
                Ok(file) => {
                    return Some(LockGuard {
                        file: Some(file),
                        kind: GuardKind::Marker(self.path.clone()),
                    });
                }
                Err(_) if self.is_stale() => {
                    debug!(path = %self.path.display(), "removing stale lock file");
                    let _ = fs::remove_file(&self.path);
                    continue;
                }
                Err(_) => {}
            }
            if attempt < attempts {
                thread::sleep(backoff);
            }
        }
        None
    }
}

/// The lock strategy for the current platform.
pub fn platform_lock(path: &Path) -> Box<dyn CacheLock> {
    if cfg!(unix) {
        Box::new(FlockLock::new(path))
    } else {
        Box::new(MarkerFileLock::new(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAST: Duration = Duration::from_millis(1);

    #[test]
    fn marker_lock_is_exclusive_until_released() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("cost_cache.lock");
        let lock = MarkerFileLock::new(&path);

        let guard = lock.try_acquire(3, FAST).unwrap();
        assert!(path.exists());
        assert!(lock.try_acquire(3, FAST).is_none());

        guard.release();
        assert!(!path.exists());
        assert!(lock.try_acquire(1, FAST).is_some());
    }

    #[test]
    fn stale_marker_is_taken_over() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("cost_cache.lock");
        fs::write(&path, b"").unwrap();
        File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(SystemTime::now() - Duration::from_secs(120))
            .unwrap();

        let lock = MarkerFileLock::new(&path);
        assert!(lock.try_acquire(2, FAST).is_some());
    }

    #[cfg(unix)]
    #[test]
    fn flock_is_exclusive_until_dropped() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("cost_cache.lock");
        let lock = FlockLock::new(&path);

        let guard = lock.try_acquire(2, FAST).unwrap();
        assert!(lock.try_acquire(2, FAST).is_none());
        drop(guard);
        assert!(lock.try_acquire(1, FAST).is_some());
        // flock leaves the file in place
        assert!(path.exists());
    }
}
