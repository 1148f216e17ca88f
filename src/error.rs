use std::path::PathBuf;
use thiserror::Error;

/// Errors a caller is expected to see and act on.
///
/// Transient I/O and daemon failures travel as `anyhow::Error` and end up in
/// the log; these variants mark mistakes in configuration or usage.
#[derive(Error, Debug)]
pub enum BoxError {
    #[error("repeat only works when playing through the player daemon, not on the local audio device")]
    RepeatOnLocalPlayback,
    #[error("unsupported config format: {0}")]
    UnsupportedConfigFormat(PathBuf),
    #[error("input device not found: {0}")]
    DeviceNotFound(String),
    #[error("{0} mutex poisoned")]
    Poisoned(&'static str),
    #[error("another radiobox instance holds the lock {0}")]
    AlreadyRunning(PathBuf),
}
