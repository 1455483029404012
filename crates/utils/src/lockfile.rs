use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockfileError {
    #[error("another SparkQ process already holds the lock at {0}")]
    AlreadyLocked(PathBuf),
    #[error("io error on lockfile {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Guards the single-writer invariant from spec §5: a second process
/// starting while a live PID holds the lockfile must refuse to start.
///
/// The OS advisory lock (`fs2::try_lock_exclusive`) is the actual guard;
/// the PID written into the file is for operator visibility (`status`,
/// `stop`) only, not for locking itself.
pub struct ProcessLock {
    path: PathBuf,
    file: File,
}

impl ProcessLock {
    /// Acquire the lock, creating the file if needed and writing our PID.
    ///
    /// Uses `OpenOptions` without truncation before locking, so a failed
    /// acquisition never wipes a running process's PID out from under it.
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self, LockfileError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| LockfileError::Io {
                path: path.clone(),
                source,
            })?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| LockfileError::Io {
                path: path.clone(),
                source,
            })?;

        file.try_lock_exclusive()
            .map_err(|_| LockfileError::AlreadyLocked(path.clone()))?;

        file.set_len(0).map_err(|source| LockfileError::Io {
            path: path.clone(),
            source,
        })?;
        let mut file = file;
        writeln!(file, "{}", std::process::id()).map_err(|source| LockfileError::Io {
            path: path.clone(),
            source,
        })?;

        Ok(Self { path, file })
    }

    /// Read the PID recorded in an existing lockfile, without acquiring the lock.
    pub fn read_pid(path: impl AsRef<Path>) -> Option<u32> {
        fs::read_to_string(path)
            .ok()
            .and_then(|s| s.trim().parse().ok())
    }
}

impl Drop for ProcessLock {
    fn drop(&mut self) {
        // The advisory lock is released automatically when `self.file` closes.
        // Removing the file itself is best-effort cleanup for `status`/`start`.
        let _ = fs2::FileExt::unlock(&self.file);
        let _ = fs::remove_file(&self.path);
    }
}
