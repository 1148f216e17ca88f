pub mod folder;
pub mod local;
#[cfg(feature = "mpd")]
pub mod mpd;
pub mod music;
pub mod pool;
pub mod traits;

pub use folder::{FolderConfig, FolderType, ResumePosition};
pub use local::{run_shell, AlsaAudio, LocalAudio};
#[cfg(feature = "mpd")]
pub use self::mpd::MpdConnector;
pub use music::{MusicPlayer, PlayerSettings};
pub use pool::ConnectionPool;
pub use traits::{Connector, PauseMode, PlayState, PlayerStatus, RemotePlayer};
