use crate::error::BoxError;
use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const LOCK_FILE_NAME: &str = "radiobox.lock";

/// Held for the lifetime of the daemon; the lock is released when dropped.
pub struct InstanceLock {
    file: File,
    path: PathBuf,
}

impl InstanceLock {
    pub fn default_path() -> PathBuf {
        dirs::runtime_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(LOCK_FILE_NAME)
    }

    /// Take the exclusive lock on `path`, failing if another daemon holds it.
    pub fn acquire(path: &Path) -> Result<Self> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("Failed to open lock file {}", path.display()))?;

        if file.try_lock_exclusive().is_err() {
            return Err(BoxError::AlreadyRunning(path.to_path_buf()).into());
        }

        // pid, for humans looking at the file
        file.set_len(0)?;
        write!(file, "{}", std::process::id())?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
        let _ = std::fs::remove_file(&self.path);
    }
}
