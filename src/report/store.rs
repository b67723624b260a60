//! report::store
//!
//! Persisted run results and the exclusive run lock.
//!
//! # Storage
//!
//! - `<state_dir>/last-run.json` - the most recent [`RunResult`]
//! - `<state_dir>/lock` - lock file with an OS-level exclusive lock
//!
//! where `<state_dir>` is `$BERTH_STATE_DIR` if set, otherwise
//! `<user data dir>/berth`.
//!
//! # Invariants
//!
//! - The run lock is held for the whole of `apply`; a second concurrent
//!   apply fails fast instead of racing provider mutations
//! - The lock is released on drop (RAII), even on panic
//! - `status` reads the last run without taking the lock

use std::fs::{self, File, OpenOptions};
use std::path::PathBuf;

use fs2::FileExt;
use thiserror::Error;

use super::RunResult;

/// Errors from run persistence.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No state directory could be resolved.
    #[error("could not determine a state directory (set BERTH_STATE_DIR)")]
    NoStateDir,

    /// Another apply is in progress.
    #[error("another apply is already running against this state directory")]
    AlreadyLocked,

    /// No run has been recorded yet.
    #[error("no run recorded yet")]
    NoRun,

    /// Run result (de)serialization failed.
    #[error("failed to encode run result: {0}")]
    Encode(#[from] serde_json::Error),

    /// I/O error.
    #[error("run store i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// File-backed store for run results.
#[derive(Debug, Clone)]
pub struct RunStore {
    dir: PathBuf,
}

impl RunStore {
    /// Open the default store, honoring `BERTH_STATE_DIR`.
    pub fn open_default() -> Result<Self, StoreError> {
        let dir = match std::env::var_os("BERTH_STATE_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_dir().ok_or(StoreError::NoStateDir)?.join("berth"),
        };
        Ok(Self { dir })
    }

    /// Open a store rooted at an explicit directory (tests).
    pub fn open_at(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn last_run_path(&self) -> PathBuf {
        self.dir.join("last-run.json")
    }

    fn lock_path(&self) -> PathBuf {
        self.dir.join("lock")
    }

    /// Acquire the exclusive run lock. Non-blocking: fails fast if held.
    pub fn lock(&self) -> Result<RunLock, StoreError> {
        fs::create_dir_all(&self.dir)?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path())?;
        file.try_lock_exclusive()
            .map_err(|_| StoreError::AlreadyLocked)?;
        Ok(RunLock { file })
    }

    /// Persist a run result as the most recent run.
    ///
    /// Written via a temp file and rename so a crashed writer never leaves
    /// a truncated record behind.
    pub fn save(&self, result: &RunResult) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_vec_pretty(result)?;
        let tmp = self.dir.join("last-run.json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, self.last_run_path())?;
        Ok(())
    }

    /// Load the most recent run result.
    pub fn load_last(&self) -> Result<RunResult, StoreError> {
        let path = self.last_run_path();
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NoRun)
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&text)?)
    }
}

/// An exclusive lock over the state directory.
///
/// Released when dropped.
#[derive(Debug)]
pub struct RunLock {
    file: File,
}

impl Drop for RunLock {
    fn drop(&mut self) {
        // Releasing a lock we hold only fails if the fd is already gone.
        let _ = fs2::FileExt::unlock(&self.file);
    }
}
