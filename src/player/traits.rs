use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayState {
    Playing,
    Paused,
    Stopped,
}

impl Default for PlayState {
    fn default() -> Self {
        Self::Stopped
    }
}

/// Snapshot of the remote player as reported by a status query.
///
/// Adapters fill in what the daemon reports; everything except the play
/// state is optional because streams and empty queues leave fields unset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerStatus {
    pub state: PlayState,
    /// Zero-based position of the current song in the queue
    pub song: Option<u32>,
    /// Seconds into the current song
    pub elapsed: Option<f64>,
    /// Current Volume (0-100)
    pub volume: Option<u8>,
    /// True while a library update job is running
    pub updating_db: bool,
}

/// How a pause request treats the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseMode {
    Pause,
    Resume,
    Toggle,
}

/// One connected session to the remote player daemon.
///
/// Every call maps onto a single protocol command; policy (clamping,
/// resume bookkeeping, ...) lives in [`crate::player::MusicPlayer`].
pub trait RemotePlayer: Send {
    fn status(&mut self) -> Result<PlayerStatus>;

    fn clear(&mut self) -> Result<()>;
    /// Append a single song or stream URI to the queue
    fn add(&mut self, uri: &str) -> Result<()>;
    /// Append every song below a library directory, recursively
    fn add_dir(&mut self, dir: &str) -> Result<()>;
    fn load_playlist(&mut self, name: &str) -> Result<()>;

    /// Resume at the current position
    fn play(&mut self) -> Result<()>;
    fn play_pos(&mut self, pos: u32) -> Result<()>;
    fn pause(&mut self, mode: PauseMode) -> Result<()>;
    fn stop(&mut self) -> Result<()>;
    fn next(&mut self) -> Result<()>;
    fn previous(&mut self) -> Result<()>;
    fn shuffle(&mut self) -> Result<()>;

    /// Absolute seek inside the song at queue position `pos`
    fn seek(&mut self, pos: u32, elapsed: f64) -> Result<()>;
    /// Seek relative to the current position; the sign gives the direction
    fn seek_relative(&mut self, secs: f64) -> Result<()>;

    fn set_volume(&mut self, volume: u8) -> Result<()>;
    /// Change the volume by `delta` percent points
    fn change_volume(&mut self, delta: i32) -> Result<()>;

    fn set_single(&mut self, enable: bool) -> Result<()>;
    fn set_repeat(&mut self, enable: bool) -> Result<()>;

    /// Start a library update, optionally limited to `path`
    fn update(&mut self, path: Option<&str>) -> Result<()>;
}

/// Opens sessions for the [`crate::player::ConnectionPool`].
pub trait Connector: Send + Sync {
    /// Connect and authenticate a fresh session
    fn connect(&self) -> Result<Box<dyn RemotePlayer>>;

    /// Human readable target, for logs
    fn describe(&self) -> String;
}
