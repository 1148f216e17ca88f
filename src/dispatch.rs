//! Turning identifiers into player calls.

use crate::input::Dispatch;
use crate::player::{run_shell, MusicPlayer, PauseMode, PlayState};
use crate::shortcuts::{ShortcutResolver, TargetKind};
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Action name reported when a folder is started
pub const PLAY_FOLDER: &str = "playfolder";

/// The closed set of `cmd://` actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Pause,
    TogglePause,
    Next,
    ContinueOrNext,
    Previous,
    VolumeUp,
    VolumeDown,
    Shuffle,
    UpdateDb,
    Record300s,
    PlayLastRecord,
    SeekForward,
    SeekBackward,
    PlayStartupSound,
    Sync,
    Ignore,
}

impl Action {
    pub const ALL: [Action; 16] = [
        Action::Pause,
        Action::TogglePause,
        Action::Next,
        Action::ContinueOrNext,
        Action::Previous,
        Action::VolumeUp,
        Action::VolumeDown,
        Action::Shuffle,
        Action::UpdateDb,
        Action::Record300s,
        Action::PlayLastRecord,
        Action::SeekForward,
        Action::SeekBackward,
        Action::PlayStartupSound,
        Action::Sync,
        Action::Ignore,
    ];

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == name)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Pause => "pause",
            Action::TogglePause => "togglepause",
            Action::Next => "next",
            Action::ContinueOrNext => "continue-or-next",
            Action::Previous => "previous",
            Action::VolumeUp => "volumeup",
            Action::VolumeDown => "volumedown",
            Action::Shuffle => "shuffle",
            Action::UpdateDb => "updateDB",
            Action::Record300s => "record300s",
            Action::PlayLastRecord => "playLastRecord",
            Action::SeekForward => "seek+10",
            Action::SeekBackward => "seek-10",
            Action::PlayStartupSound => "playstartupsound",
            Action::Sync => "sync",
            Action::Ignore => "ignore",
        }
    }
}

pub struct Dispatcher {
    player: Arc<MusicPlayer>,
    resolver: ShortcutResolver,
}

impl Dispatcher {
    pub fn new(player: Arc<MusicPlayer>, resolver: ShortcutResolver) -> Self {
        Self { player, resolver }
    }

    pub fn player(&self) -> &Arc<MusicPlayer> {
        &self.player
    }

    /// Run the action called `name`; unknown names are logged and dropped.
    pub fn command(&self, name: &str) -> Result<()> {
        info!("cmd action: {}", name);
        match Action::parse(name) {
            Some(action) => self.perform(action),
            None => {
                info!("unknown cmd action: {}", name);
                Ok(())
            }
        }
    }

    pub fn perform(&self, action: Action) -> Result<()> {
        let player = &self.player;

        // sync opens its own connections between the long running steps
        if action == Action::Sync {
            return player.sync();
        }

        player.pool().with_connection(|client| match action {
            Action::Pause => player.pause(client, PauseMode::Pause),
            Action::TogglePause => player.pause(client, PauseMode::Toggle),
            Action::Next => player.play_next(client),
            Action::ContinueOrNext => {
                if client.status()?.state == PlayState::Playing {
                    player.play_next(client)
                } else {
                    player.pause(client, PauseMode::Resume)
                }
            }
            Action::Previous => player.play_previous(client),
            Action::VolumeUp => player.increase_volume(client),
            Action::VolumeDown => player.decrease_volume(client),
            Action::Shuffle => player.shuffle(client),
            Action::UpdateDb => player.update_db(client, None),
            Action::Record300s => player.record(client, 300).map(|_| ()),
            Action::PlayLastRecord => player.play_last_record(client),
            Action::SeekForward => player.seek(client, 10.0),
            Action::SeekBackward => player.seek(client, -10.0),
            Action::PlayStartupSound => match player.sound_effect("startup") {
                Some(sound) => player.play_single_file(client, sound, false, false),
                None => Ok(()),
            },
            Action::Ignore => {
                info!("action: ignore.");
                Ok(())
            }
            Action::Sync => Ok(()),
        })
    }

    /// Resolve `id` and act on it.
    ///
    /// Returns the name of what was done (the action, the shell command,
    /// `continue-or-next` or `playfolder`), or `None` when nothing happened.
    pub fn play_action(&self, id: &str) -> Result<Option<String>> {
        self.player.update_timer();

        let Some(shortcut) = self.resolver.resolve(id) else {
            return Ok(None);
        };

        match shortcut.kind {
            TargetKind::InlineCommand => {
                self.command(&shortcut.target)?;
                Ok(Some(shortcut.target))
            }
            TargetKind::ExternalCommand => {
                info!("extcmd: {}", shortcut.target);
                run_shell(&shortcut.target, &self.player.layout().base_dir)?;
                Ok(Some(shortcut.target))
            }
            TargetKind::Folder => {
                let folder = PathBuf::from(&shortcut.target);
                if self.player.current_folder().as_deref() == Some(folder.as_path()) {
                    self.perform(Action::ContinueOrNext)?;
                    return Ok(Some(Action::ContinueOrNext.as_str().to_string()));
                }

                if !self.player.layout().audio_dir.join(&folder).is_dir() {
                    warn!("folder {} does not exist", folder.display());
                    return Ok(None);
                }

                let player = &self.player;
                player
                    .pool()
                    .with_connection(|client| player.play_folder(client, &folder))?;
                Ok(Some(PLAY_FOLDER.to_string()))
            }
        }
    }
}

impl Dispatch for Dispatcher {
    fn play_action(&self, id: &str) -> Result<Option<String>> {
        Dispatcher::play_action(self, id)
    }

    fn seek(&self, rel_secs: f64) -> Result<()> {
        let player = &self.player;
        player.pool().with_connection(|client| player.seek(client, rel_secs))
    }

    fn jump_to(&self, pos: u32) -> Result<()> {
        let player = &self.player;
        player.pool().with_connection(|client| player.jump_to(client, pos))
    }
}
