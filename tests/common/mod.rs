#![allow(dead_code)]

use anyhow::{bail, Result};
use radiobox::config::BoxLayout;
use radiobox::dispatch::Dispatcher;
use radiobox::player::{
    ConnectionPool, Connector, LocalAudio, MusicPlayer, PauseMode, PlayState, PlayerSettings,
    PlayerStatus, RemotePlayer,
};
use radiobox::shortcuts::{MatchRule, ShortcutResolver};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::runtime::Handle;

/// What the fake daemon has seen and what it reports
#[derive(Debug, Default)]
pub struct FakeState {
    pub calls: Vec<String>,
    pub status: PlayerStatus,
    /// Status queries that still report a running library update
    pub updating_polls: usize,
}

/// In-memory stand-in for the player daemon
pub struct FakeRemote {
    state: Arc<Mutex<FakeState>>,
}

impl FakeRemote {
    fn record(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn status_mut<F: FnOnce(&mut PlayerStatus)>(&self, f: F) {
        f(&mut self.state.lock().unwrap().status);
    }
}

impl RemotePlayer for FakeRemote {
    fn status(&mut self) -> Result<PlayerStatus> {
        self.record("status".into());
        let mut state = self.state.lock().unwrap();
        let mut status = state.status.clone();
        status.updating_db = state.updating_polls > 0;
        state.updating_polls = state.updating_polls.saturating_sub(1);
        Ok(status)
    }

    fn clear(&mut self) -> Result<()> {
        self.record("clear".into());
        Ok(())
    }

    fn add(&mut self, uri: &str) -> Result<()> {
        self.record(format!("add {}", uri));
        Ok(())
    }

    fn add_dir(&mut self, dir: &str) -> Result<()> {
        self.record(format!("add_dir {}", dir));
        Ok(())
    }

    fn load_playlist(&mut self, name: &str) -> Result<()> {
        self.record(format!("load {}", name));
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        self.record("play".into());
        self.status_mut(|s| s.state = PlayState::Playing);
        Ok(())
    }

    fn play_pos(&mut self, pos: u32) -> Result<()> {
        self.record(format!("play {}", pos));
        self.status_mut(|s| {
            s.state = PlayState::Playing;
            s.song = Some(pos);
            s.elapsed = Some(0.0);
        });
        Ok(())
    }

    fn pause(&mut self, mode: PauseMode) -> Result<()> {
        self.record(format!("pause {:?}", mode));
        self.status_mut(|s| {
            s.state = match (mode, s.state) {
                (PauseMode::Pause, _) => PlayState::Paused,
                (PauseMode::Resume, _) => PlayState::Playing,
                (PauseMode::Toggle, PlayState::Playing) => PlayState::Paused,
                (PauseMode::Toggle, _) => PlayState::Playing,
            }
        });
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.record("stop".into());
        self.status_mut(|s| s.state = PlayState::Stopped);
        Ok(())
    }

    fn next(&mut self) -> Result<()> {
        self.record("next".into());
        Ok(())
    }

    fn previous(&mut self) -> Result<()> {
        self.record("previous".into());
        Ok(())
    }

    fn shuffle(&mut self) -> Result<()> {
        self.record("shuffle".into());
        Ok(())
    }

    fn seek(&mut self, pos: u32, elapsed: f64) -> Result<()> {
        self.record(format!("seek {} {}", pos, elapsed));
        self.status_mut(|s| {
            s.state = PlayState::Playing;
            s.song = Some(pos);
            s.elapsed = Some(elapsed);
        });
        Ok(())
    }

    fn seek_relative(&mut self, secs: f64) -> Result<()> {
        self.record(format!("seekcur {:+}", secs));
        Ok(())
    }

    fn set_volume(&mut self, volume: u8) -> Result<()> {
        self.record(format!("setvol {}", volume));
        self.status_mut(|s| s.volume = Some(volume));
        Ok(())
    }

    fn change_volume(&mut self, delta: i32) -> Result<()> {
        self.record(format!("volume {:+}", delta));
        self.status_mut(|s| {
            let v = i32::from(s.volume.unwrap_or(0)) + delta;
            s.volume = Some(v.clamp(0, 100) as u8);
        });
        Ok(())
    }

    fn set_single(&mut self, enable: bool) -> Result<()> {
        self.record(format!("single {}", u8::from(enable)));
        Ok(())
    }

    fn set_repeat(&mut self, enable: bool) -> Result<()> {
        self.record(format!("repeat {}", u8::from(enable)));
        Ok(())
    }

    fn update(&mut self, path: Option<&str>) -> Result<()> {
        self.record(format!("update {}", path.unwrap_or("")).trim_end().to_string());
        Ok(())
    }
}

/// Hands out [`FakeRemote`]s sharing one [`FakeState`]
#[derive(Clone, Default)]
pub struct FakeConnector {
    pub state: Arc<Mutex<FakeState>>,
    pub connects: Arc<AtomicUsize>,
    pub refuse: Arc<AtomicBool>,
}

impl FakeConnector {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn take_calls(&self) -> Vec<String> {
        std::mem::take(&mut self.state.lock().unwrap().calls)
    }

    /// Report a running library update for the next `polls` status queries
    pub fn set_updating(&self, polls: usize) {
        self.state.lock().unwrap().updating_polls = polls;
    }

    pub fn updating_polls(&self) -> usize {
        self.state.lock().unwrap().updating_polls
    }

    pub fn set_status<F: FnOnce(&mut PlayerStatus)>(&self, f: F) {
        f(&mut self.state.lock().unwrap().status);
    }
}

impl Connector for FakeConnector {
    fn connect(&self) -> Result<Box<dyn RemotePlayer>> {
        if self.refuse.load(Ordering::SeqCst) {
            bail!("connection refused");
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeRemote {
            state: Arc::clone(&self.state),
        }))
    }

    fn describe(&self) -> String {
        "fake://player".to_string()
    }
}

/// Records aplay/arecord requests instead of spawning them
#[derive(Clone, Default)]
pub struct FakeLocalAudio {
    pub log: Arc<Mutex<Vec<String>>>,
    pub recording: Arc<AtomicBool>,
}

impl FakeLocalAudio {
    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

impl LocalAudio for FakeLocalAudio {
    fn play(&mut self, file: &Path) -> Result<()> {
        self.log.lock().unwrap().push(format!("aplay {}", file.display()));
        Ok(())
    }

    fn record(&mut self, file: &Path, duration_secs: u32) -> Result<()> {
        self.log
            .lock()
            .unwrap()
            .push(format!("arecord {} {}", duration_secs, file.display()));
        self.recording.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_recording(&mut self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    fn stop_recording(&mut self) -> bool {
        self.recording.swap(false, Ordering::SeqCst)
    }

    fn stop_all(&mut self) {
        self.stop_recording();
    }
}

/// A complete box on a temporary directory with fake collaborators
pub struct Harness {
    pub dir: TempDir,
    pub layout: BoxLayout,
    pub remote: FakeConnector,
    pub local: FakeLocalAudio,
    pub pool: Arc<ConnectionPool>,
    pub player: Arc<MusicPlayer>,
    pub dispatcher: Dispatcher,
}

impl Harness {
    /// Must be called from inside a tokio runtime
    pub fn new(settings: PlayerSettings) -> Self {
        Self::with_close_after(settings, Duration::from_secs(7))
    }

    pub fn with_close_after(settings: PlayerSettings, close_after: Duration) -> Self {
        let dir = TempDir::new().unwrap();
        let layout = BoxLayout::new(dir.path());
        fs::create_dir_all(&layout.audio_dir).unwrap();
        fs::create_dir_all(&layout.shortcuts_dir).unwrap();

        let remote = FakeConnector::default();
        let local = FakeLocalAudio::default();
        let runtime = Handle::current();

        let pool = Arc::new(ConnectionPool::new(
            Box::new(remote.clone()),
            close_after,
            runtime.clone(),
        ));
        let player = Arc::new(MusicPlayer::new(
            settings,
            layout.clone(),
            Arc::clone(&pool),
            Box::new(local.clone()),
            runtime,
        ));
        let dispatcher = Dispatcher::new(
            Arc::clone(&player),
            ShortcutResolver::new(&layout, MatchRule::Token),
        );

        Self {
            dir,
            layout,
            remote,
            local,
            pool,
            player,
            dispatcher,
        }
    }

    /// Create an audio folder, optionally with a `folder.json`
    pub fn folder(&self, rel: &str, config: Option<&str>) -> PathBuf {
        let path = self.layout.audio_dir.join(rel);
        fs::create_dir_all(&path).unwrap();
        if let Some(config) = config {
            fs::write(path.join("folder.json"), config).unwrap();
        }
        path
    }

    pub fn shortcut(&self, id: &str, content: &str) {
        fs::write(self.layout.shortcuts_dir.join(id), content).unwrap();
    }
}

/// Settings with no waiting on library updates
pub fn quick_settings() -> PlayerSettings {
    PlayerSettings {
        update_before_playing: false,
        update_poll: Duration::from_millis(10),
        sync_poll: Duration::from_millis(10),
        ..PlayerSettings::default()
    }
}
