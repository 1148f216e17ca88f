//! Daemon configuration.
//!
//! The config file keeps the camelCase keys of the legacy `config.json` so an
//! existing box can be pointed at it unchanged; `.toml` files use the same
//! key names.

use crate::error::BoxError;
use crate::shortcuts::MatchRule;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxConfig {
    // Player daemon
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub pwd: Option<String>,
    #[serde(default = "default_close_after")]
    pub close_after_seconds: f64,

    // Filesystem layout
    #[serde(default)]
    pub base_dir: Option<PathBuf>,
    #[serde(default = "default_audio_dir")]
    pub audio_dir: PathBuf,
    #[serde(default = "default_shortcuts_dir")]
    pub shortcuts_dir: PathBuf,
    #[serde(default)]
    pub recordings_dir: Option<PathBuf>,
    #[serde(default)]
    pub scan_match: MatchRule,

    // Playback policy
    #[serde(default = "default_volume_steps")]
    pub volume_steps: u8,
    #[serde(default)]
    pub min_volume: Option<u8>,
    #[serde(default)]
    pub max_volume: Option<u8>,
    #[serde(default)]
    pub initial_volume: Option<u8>,
    #[serde(default, rename = "muteTimeoutS")]
    pub mute_timeout_s: Option<f64>,
    #[serde(default = "default_true")]
    pub save_pos: bool,
    #[serde(default = "default_alsa_device")]
    pub alsa_audio_device: String,
    /// Rescan the library before a `music` folder is queued, and wait for it.
    /// The MPD client cannot limit the rescan to one folder, so on a large
    /// library every folder start waits for a full update; turn this off
    /// when new content only arrives through `sync`.
    #[serde(default = "default_true")]
    pub update_before_playing: bool,
    #[serde(default, rename = "startupfolder")]
    pub startup_folder: Option<PathBuf>,
    #[serde(default)]
    pub sound_effects: HashMap<String, PathBuf>,
    #[serde(default = "default_sync_script")]
    pub sync_script: String,
    #[serde(default = "default_sync_poll")]
    pub sync_poll_seconds: f64,

    // RFID readers
    #[serde(default)]
    pub rfid_reader_names: Vec<String>,
    #[serde(default, rename = "latestRFIDFile")]
    pub latest_rfid_file: Option<PathBuf>,
    #[serde(default)]
    pub same_card_delay: HashMap<String, f64>,
    #[serde(default, rename = "lockCardIDs")]
    pub lock_card_ids: HashSet<String>,
    #[serde(default, rename = "unlockCardIDs")]
    pub unlock_card_ids: HashSet<String>,
    #[serde(default, rename = "toggleLockCardIDs")]
    pub toggle_lock_card_ids: HashSet<String>,
    #[serde(default)]
    pub rfid_locked: bool,
    #[serde(default)]
    pub jump_cards: HashMap<String, u8>,

    // IR remote
    #[serde(default)]
    pub lirc: bool,
    #[serde(default, rename = "lircdevice")]
    pub lirc_device: Option<String>,
    #[serde(default)]
    pub lock_keys: HashSet<String>,
    #[serde(default)]
    pub unlock_keys: HashSet<String>,
    #[serde(default)]
    pub toggle_lock_keys: HashSet<String>,
    #[serde(default)]
    pub lirc_locked: bool,

    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    6600
}

fn default_close_after() -> f64 {
    7.0
}

fn default_audio_dir() -> PathBuf {
    PathBuf::from("shared/audiofolders")
}

fn default_shortcuts_dir() -> PathBuf {
    PathBuf::from("shared/shortcuts")
}

fn default_volume_steps() -> u8 {
    5
}

fn default_true() -> bool {
    true
}

fn default_alsa_device() -> String {
    "default".to_string()
}

fn default_sync_script() -> String {
    "./sync-this-phoniebox.sh".to_string()
}

fn default_sync_poll() -> f64 {
    2.0
}

fn default_log_file() -> PathBuf {
    PathBuf::from("/var/tmp/radio.log")
}

impl Default for BoxConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            pwd: None,
            close_after_seconds: default_close_after(),
            base_dir: None,
            audio_dir: default_audio_dir(),
            shortcuts_dir: default_shortcuts_dir(),
            recordings_dir: None,
            scan_match: MatchRule::default(),
            volume_steps: default_volume_steps(),
            min_volume: None,
            max_volume: None,
            initial_volume: None,
            mute_timeout_s: None,
            save_pos: true,
            alsa_audio_device: default_alsa_device(),
            update_before_playing: true,
            startup_folder: None,
            sound_effects: HashMap::new(),
            sync_script: default_sync_script(),
            sync_poll_seconds: default_sync_poll(),
            rfid_reader_names: Vec::new(),
            latest_rfid_file: None,
            same_card_delay: HashMap::new(),
            lock_card_ids: HashSet::new(),
            unlock_card_ids: HashSet::new(),
            toggle_lock_card_ids: HashSet::new(),
            rfid_locked: false,
            jump_cards: HashMap::new(),
            lirc: false,
            lirc_device: None,
            lock_keys: HashSet::new(),
            unlock_keys: HashSet::new(),
            toggle_lock_keys: HashSet::new(),
            lirc_locked: false,
            log_file: default_log_file(),
        }
    }
}

/// Absolute locations of everything the daemon reads and writes.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxLayout {
    pub base_dir: PathBuf,
    pub audio_dir: PathBuf,
    pub shortcuts_dir: PathBuf,
    pub recordings_dir: PathBuf,
}

impl BoxLayout {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        let audio_dir = base_dir.join(default_audio_dir());
        Self {
            shortcuts_dir: base_dir.join(default_shortcuts_dir()),
            recordings_dir: audio_dir.join("Recordings"),
            audio_dir,
            base_dir,
        }
    }
}

impl BoxConfig {
    pub fn get_config_dir() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("radiobox");
        path
    }

    pub fn get_config_path() -> PathBuf {
        Self::get_config_dir().join("config.toml")
    }

    /// Load `path`; `.json` is parsed as JSON, `.toml` (or no extension) as TOML.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;

        let mut config: BoxConfig = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&content)
                .with_context(|| format!("Invalid JSON config {}", path.display()))?,
            Some("toml") | None => toml::from_str(&content)
                .with_context(|| format!("Invalid TOML config {}", path.display()))?,
            Some(_) => return Err(BoxError::UnsupportedConfigFormat(path.to_path_buf()).into()),
        };

        if config.base_dir.is_none() {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            config.base_dir = Some(dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf()));
        }

        Ok(config)
    }

    pub fn layout(&self) -> BoxLayout {
        let base_dir = self
            .base_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));
        let audio_dir = base_dir.join(&self.audio_dir);
        let recordings_dir = match &self.recordings_dir {
            Some(dir) => base_dir.join(dir),
            None => audio_dir.join("Recordings"),
        };

        BoxLayout {
            shortcuts_dir: base_dir.join(&self.shortcuts_dir),
            audio_dir,
            recordings_dir,
            base_dir,
        }
    }

    pub fn close_after(&self) -> Duration {
        Duration::from_secs_f64(self.close_after_seconds.max(0.0))
    }

    pub fn mute_timeout(&self) -> Option<Duration> {
        self.mute_timeout_s
            .filter(|s| *s > 0.0)
            .map(Duration::from_secs_f64)
    }

    pub fn sync_poll_interval(&self) -> Duration {
        Duration::from_secs_f64(self.sync_poll_seconds.max(0.0))
    }
}
