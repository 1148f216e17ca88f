//! The player facade: what is playing, where it stopped, and the volume and
//! mute policies layered over the raw daemon commands.
//!
//! Most operations take an already acquired session so that one dispatched
//! action maps onto one pooled connection. [`MusicPlayer::sync`] and the
//! mute timer acquire their own.

use super::folder::{FolderConfig, FolderType, ResumePosition};
use super::local::{run_shell, LocalAudio};
use super::pool::ConnectionPool;
use super::traits::{PauseMode, RemotePlayer};
use crate::config::{BoxConfig, BoxLayout};
use crate::error::BoxError;
use crate::timer::OneShotTimer;
use anyhow::Result;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant, SystemTime};
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

/// Upper bound for waiting on a folder-scoped library update
const MAX_UPDATE_WAIT: Duration = Duration::from_secs(300);

/// Upper bound for the library update that follows a sync
const MAX_SYNC_WAIT: Duration = Duration::from_secs(1800);

#[derive(Debug, Clone)]
pub struct PlayerSettings {
    pub volume_steps: u8,
    pub min_volume: Option<u8>,
    pub max_volume: Option<u8>,
    pub mute_timeout: Option<Duration>,
    pub save_pos: bool,
    pub update_before_playing: bool,
    pub update_poll: Duration,
    pub sync_script: String,
    pub sync_poll: Duration,
    pub sound_effects: HashMap<String, PathBuf>,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            volume_steps: 5,
            min_volume: None,
            max_volume: None,
            mute_timeout: None,
            save_pos: true,
            update_before_playing: true,
            update_poll: Duration::from_millis(500),
            sync_script: "./sync-this-phoniebox.sh".to_string(),
            sync_poll: Duration::from_secs(2),
            sound_effects: HashMap::new(),
        }
    }
}

impl PlayerSettings {
    pub fn from_config(config: &BoxConfig) -> Self {
        Self {
            volume_steps: config.volume_steps,
            min_volume: config.min_volume,
            max_volume: config.max_volume,
            mute_timeout: config.mute_timeout(),
            save_pos: config.save_pos,
            update_before_playing: config.update_before_playing,
            sync_script: config.sync_script.clone(),
            sync_poll: config.sync_poll_interval(),
            sound_effects: config.sound_effects.clone(),
            ..Self::default()
        }
    }
}

#[derive(Default)]
struct Session {
    folder: Option<PathBuf>,
    config: Option<FolderConfig>,
}

pub struct MusicPlayer {
    settings: PlayerSettings,
    layout: BoxLayout,
    pool: Arc<ConnectionPool>,
    local: Mutex<Box<dyn LocalAudio>>,
    session: Mutex<Session>,
    mute_timer: OneShotTimer,
}

impl MusicPlayer {
    pub fn new(
        settings: PlayerSettings,
        layout: BoxLayout,
        pool: Arc<ConnectionPool>,
        local: Box<dyn LocalAudio>,
        runtime: Handle,
    ) -> Self {
        Self {
            settings,
            layout,
            pool,
            local: Mutex::new(local),
            session: Mutex::new(Session::default()),
            mute_timer: OneShotTimer::new("mute", runtime),
        }
    }

    pub fn layout(&self) -> &BoxLayout {
        &self.layout
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    pub fn sound_effect(&self, name: &str) -> Option<&Path> {
        self.settings.sound_effects.get(name).map(PathBuf::as_path)
    }

    /// Folder (relative to the audio root) started by the last `play_folder`
    pub fn current_folder(&self) -> Option<PathBuf> {
        self.session().ok().and_then(|s| s.folder.clone())
    }

    fn session(&self) -> Result<MutexGuard<'_, Session>> {
        self.session
            .lock()
            .map_err(|_| BoxError::Poisoned("player session").into())
    }

    fn local(&self) -> Result<MutexGuard<'_, Box<dyn LocalAudio>>> {
        self.local
            .lock()
            .map_err(|_| BoxError::Poisoned("local audio").into())
    }

    fn stop_local_audio(&self) -> Result<()> {
        self.local()?.stop_all();
        Ok(())
    }

    pub fn is_recording(&self) -> bool {
        self.local().map(|mut l| l.is_recording()).unwrap_or(false)
    }

    pub fn stop_recording(&self) -> Result<bool> {
        Ok(self.local()?.stop_recording())
    }

    /// Persist the position of the current folder if it asks for resume.
    ///
    /// Returns whether a position was written. A failed write is logged and
    /// reported as `false`; only a failed status query is an error.
    pub fn save_pos(&self, client: &mut dyn RemotePlayer) -> Result<bool> {
        if !self.settings.save_pos {
            return Ok(false);
        }

        let (folder, resume) = {
            let session = self.session()?;
            match (&session.folder, &session.config) {
                (Some(folder), Some(config)) => (folder.clone(), config.resume()),
                _ => return Ok(false),
            }
        };

        let folder_abs = self.layout.audio_dir.join(&folder);
        if !resume || !folder_abs.exists() {
            return Ok(false);
        }

        let status = client.status()?;
        let pos = ResumePosition {
            song: status.song,
            elapsed: status.elapsed,
        };

        match pos.write(&folder_abs) {
            Ok(()) => {
                debug!("saved position {:?} for {}", pos, folder.display());
                Ok(true)
            }
            Err(e) => {
                error!("failed to write resume position: {:#}", e);
                Ok(false)
            }
        }
    }

    /// Replace the queue with `folder` (relative to the audio root) and start it.
    pub fn play_folder(&self, client: &mut dyn RemotePlayer, folder: &Path) -> Result<()> {
        info!("playFolder: {}", folder.display());
        self.stop_local_audio()?;
        self.save_pos(client)?;

        let config = FolderConfig::load(&self.layout.audio_dir, folder);
        let Some(kind) = config.folder_type() else {
            warn!("unknown folder type {:?} in {}", config.kind(), folder.display());
            return Ok(());
        };
        let uri = config.resolved_uri(folder);
        let resume = config.resume();

        {
            let mut session = self.session()?;
            session.folder = Some(folder.to_path_buf());
            session.config = Some(config);
        }

        client.clear()?;
        let folder_uri = folder.to_string_lossy();

        match kind {
            FolderType::Music => {
                if self.settings.update_before_playing {
                    client.update(Some(&folder_uri))?;
                    self.wait_for_update(client)?;
                }
                client.add_dir(&folder_uri)?;
            }
            FolderType::Stream => match uri {
                Some(uri) => client.add(&uri)?,
                None => warn!("stream folder {} has no uri", folder.display()),
            },
            FolderType::Playlist | FolderType::PlaylistStream => match uri {
                Some(uri) => client.load_playlist(&uri)?,
                None => warn!("playlist folder {} has no uri", folder.display()),
            },
        }

        client.set_single(false)?;
        client.set_repeat(true)?;

        if resume {
            let pos = ResumePosition::read(&self.layout.audio_dir.join(folder)).unwrap_or_default();
            let song = pos.song.unwrap_or(0);
            match pos.elapsed {
                Some(elapsed) => client.seek(song, elapsed)?,
                None => client.play_pos(song)?,
            }
        } else {
            client.play_pos(0)?;
        }

        Ok(())
    }

    fn wait_for_update(&self, client: &mut dyn RemotePlayer) -> Result<()> {
        let started = Instant::now();
        while client.status()?.updating_db {
            if started.elapsed() > MAX_UPDATE_WAIT {
                warn!("library update still running after {:?}, playing anyway", MAX_UPDATE_WAIT);
                break;
            }
            std::thread::sleep(self.settings.update_poll);
        }
        Ok(())
    }

    pub fn jump_to(&self, client: &mut dyn RemotePlayer, pos: u32) -> Result<()> {
        self.stop_local_audio()?;
        client.play_pos(pos)
    }

    pub fn play_next(&self, client: &mut dyn RemotePlayer) -> Result<()> {
        self.stop_local_audio()?;
        client.next()
    }

    pub fn play_previous(&self, client: &mut dyn RemotePlayer) -> Result<()> {
        self.stop_local_audio()?;
        client.previous()
    }

    pub fn increase_volume(&self, client: &mut dyn RemotePlayer) -> Result<()> {
        self.stop_local_audio()?;
        let current = i32::from(client.status()?.volume.unwrap_or(0));
        let step = i32::from(self.settings.volume_steps);

        match self.settings.max_volume {
            Some(max) if current + step > i32::from(max) => {
                debug!("volume {} already at the upper bound {}", current, max);
                Ok(())
            }
            _ => client.change_volume(step),
        }
    }

    pub fn decrease_volume(&self, client: &mut dyn RemotePlayer) -> Result<()> {
        self.stop_local_audio()?;
        let current = i32::from(client.status()?.volume.unwrap_or(0));
        let step = i32::from(self.settings.volume_steps);

        match self.settings.min_volume {
            Some(min) if current - step < i32::from(min) => {
                debug!("volume {} already at the lower bound {}", current, min);
                Ok(())
            }
            _ => client.change_volume(-step),
        }
    }

    pub fn shuffle(&self, client: &mut dyn RemotePlayer) -> Result<()> {
        self.stop_local_audio()?;
        client.shuffle()
    }

    pub fn seek(&self, client: &mut dyn RemotePlayer, rel_secs: f64) -> Result<()> {
        if rel_secs == 0.0 {
            return Ok(());
        }
        client.seek_relative(rel_secs)
    }

    pub fn pause(&self, client: &mut dyn RemotePlayer, mode: PauseMode) -> Result<()> {
        self.stop_local_audio()?;
        client.pause(mode)?;
        self.save_pos(client)?;
        Ok(())
    }

    pub fn play(&self, client: &mut dyn RemotePlayer) -> Result<()> {
        self.stop_local_audio()?;
        client.play()
    }

    /// Play one file, either on the local audio device (`local`) or as a
    /// single-song queue on the daemon.
    ///
    /// Local playback cannot loop; asking for `repeat` there is an error.
    pub fn play_single_file(
        &self,
        client: &mut dyn RemotePlayer,
        file: &Path,
        local: bool,
        repeat: bool,
    ) -> Result<()> {
        if local {
            if repeat {
                return Err(BoxError::RepeatOnLocalPlayback.into());
            }
            self.pause(client, PauseMode::Pause)?;
            let mut audio = self.local()?;
            audio.stop_all();
            audio.play(&self.layout.base_dir.join(file))
        } else {
            self.stop_local_audio()?;
            self.save_pos(client)?;
            // the folder is no longer queued; keep its resume point intact
            *self.session()? = Session::default();
            client.stop()?;
            client.clear()?;
            client.set_single(true)?;
            client.set_repeat(repeat)?;
            client.add(&file.to_string_lossy())?;
            client.play_pos(0)
        }
    }

    /// Record `duration_secs` seconds from the local audio device.
    /// Returns `false` if a recording is already running.
    pub fn record(&self, client: &mut dyn RemotePlayer, duration_secs: u32) -> Result<bool> {
        if self.local()?.is_recording() {
            info!("already recording");
            return Ok(false);
        }

        self.pause(client, PauseMode::Pause)?;

        let dir = &self.layout.recordings_dir;
        if let Err(e) = fs::create_dir_all(dir) {
            warn!("cannot create {}: {}", dir.display(), e);
        }
        let name = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S");
        let file = dir.join(format!("{}.wav", name));

        self.local()?.record(&file, duration_secs)?;
        Ok(true)
    }

    pub fn play_last_record(&self, client: &mut dyn RemotePlayer) -> Result<()> {
        self.pause(client, PauseMode::Pause)?;

        match latest_recording(&self.layout.recordings_dir) {
            Some(file) => self.play_single_file(client, &file, true, false),
            None => {
                info!("no recordings in {}", self.layout.recordings_dir.display());
                Ok(())
            }
        }
    }

    pub fn update_db(&self, client: &mut dyn RemotePlayer, uri: Option<&str>) -> Result<()> {
        client.update(uri)
    }

    /// Pull new content from outside and rescan the library.
    ///
    /// Plays the `wait` effect in a loop while the sync script and the library
    /// update run, then the `done` effect (or pauses if there is none).
    pub fn sync(&self) -> Result<()> {
        if let Some(wait) = self.sound_effect("wait") {
            self.pool
                .with_connection(|client| self.play_single_file(client, wait, false, true))?;
        }

        match run_shell(&self.settings.sync_script, &self.layout.base_dir) {
            Ok(status) => info!("sync script finished: {}", status),
            Err(e) => error!("Execution of {} failed: {:#}", self.settings.sync_script, e),
        }

        self.pool.with_connection(|client| self.update_db(client, None))?;

        let started = Instant::now();
        loop {
            std::thread::sleep(self.settings.sync_poll);
            if started.elapsed() > MAX_SYNC_WAIT {
                warn!("library update still running after {:?}, giving up", MAX_SYNC_WAIT);
                return Ok(());
            }
            let finished = self.pool.with_connection(|client| {
                if client.status()?.updating_db {
                    return Ok(false);
                }
                match self.sound_effect("done") {
                    Some(done) => self.play_single_file(client, done, false, false)?,
                    None => self.pause(client, PauseMode::Pause)?,
                }
                Ok(true)
            })?;
            if finished {
                info!("sync complete");
                return Ok(());
            }
        }
    }

    /// Restart the mute-after-idle countdown. No-op when no timeout is set.
    pub fn update_timer(self: &Arc<Self>) {
        let Some(timeout) = self.settings.mute_timeout else {
            return;
        };

        let player = Arc::downgrade(self);
        self.mute_timer.arm(timeout, move || {
            let Some(player) = player.upgrade() else {
                return;
            };
            info!("mute timeout reached, pausing");
            if let Err(e) = player
                .pool
                .with_connection(|client| player.pause(client, PauseMode::Pause))
            {
                warn!("mute timeout pause failed: {:#}", e);
            }
        });
    }
}

/// Most recently modified `.wav` file in `dir`
fn latest_recording(dir: &Path) -> Option<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("cannot list {}: {}", dir.display(), e);
            return None;
        }
    };

    entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case("wav"))
                .unwrap_or(false)
        })
        .max_by_key(|path| {
            fs::metadata(path)
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH)
        })
}
