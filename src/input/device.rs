//! Linux input devices through evdev.
//!
//! Tag readers are USB keyboard wedges: every scan arrives as digit key
//! presses terminated by Enter. The IR receiver shows up as a device with
//! the remote's keys.

use super::{KeyEvent, KeySource, TagSource};
use crate::error::BoxError;
use anyhow::Result;
use evdev::{Device, EventType, Key};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// Delay before re-opening a device that failed
const REOPEN_DELAY: Duration = Duration::from_secs(3);

/// Characters of the keyboard wedge layout, indexed by key code
const KEYMAP: &str = "X^1234567890XXXXqwertzuiopXXXXasdfghjklXXXXXyxcvbnmXXXXXXXXXXXXXXXXXXXXXXX";

#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub path: PathBuf,
    pub name: String,
    pub phys: String,
}

pub fn list_devices() -> Vec<DeviceInfo> {
    evdev::enumerate()
        .map(|(path, device)| DeviceInfo {
            path,
            name: device.name().unwrap_or_default().to_string(),
            phys: device.physical_path().unwrap_or_default().to_string(),
        })
        .collect()
}

pub fn open_by_name(name: &str) -> Result<Device> {
    evdev::enumerate()
        .find(|(_, device)| device.name() == Some(name))
        .map(|(path, device)| {
            info!("found input device {} at {}", name, path.display());
            device
        })
        .ok_or_else(|| BoxError::DeviceNotFound(name.to_string()).into())
}

fn wedge_char(code: u16) -> char {
    KEYMAP.as_bytes().get(usize::from(code)).map(|&b| char::from(b)).unwrap_or('X')
}

/// Kernel names sharing a code with the one evdev prints
const KEY_ALIASES: &[(Key, &str)] = &[
    (Key::KEY_MUTE, "KEY_MIN_INTERESTING"),
    (Key::KEY_HANGEUL, "KEY_HANGUEL"),
    (Key::KEY_COFFEE, "KEY_SCREENLOCK"),
    (Key::KEY_DIRECTION, "KEY_ROTATE_DISPLAY"),
    (Key::KEY_BRIGHTNESS_AUTO, "KEY_BRIGHTNESS_ZERO"),
    (Key::KEY_WWAN, "KEY_WIMAX"),
    (Key::KEY_ZOOM, "KEY_FULL_SCREEN"),
    (Key::KEY_SCREEN, "KEY_ASPECT_RATIO"),
    (Key::KEY_DISPLAYTOGGLE, "KEY_BRIGHTNESS_TOGGLE"),
];

/// All logical names of a key code; empty for codes that are not keys
fn key_names(code: u16) -> Vec<String> {
    let key = Key::new(code);
    let name = format!("{:?}", key);
    if !name.starts_with("KEY_") {
        return Vec::new();
    }

    let mut names = vec![name];
    names.extend(
        KEY_ALIASES
            .iter()
            .filter(|(k, _)| *k == key)
            .map(|(_, alias)| alias.to_string()),
    );
    names
}

/// Named device that is looked up again after every failure
struct Reconnecting {
    name: String,
    device: Option<Device>,
}

impl Reconnecting {
    fn new(name: &str) -> Self {
        let device = match open_by_name(name) {
            Ok(device) => Some(device),
            Err(e) => {
                warn!("{:#}", e);
                None
            }
        };
        Self {
            name: name.to_string(),
            device,
        }
    }

    fn device(&mut self) -> Result<&mut Device> {
        self.device
            .as_mut()
            .ok_or_else(|| BoxError::DeviceNotFound(self.name.clone()).into())
    }

    fn reopen(&mut self) {
        std::thread::sleep(REOPEN_DELAY);
        self.device = open_by_name(&self.name).ok();
    }
}

pub struct EvdevTagReader {
    inner: Reconnecting,
}

impl EvdevTagReader {
    pub fn new(name: &str) -> Self {
        Self {
            inner: Reconnecting::new(name),
        }
    }

    fn read_once(&mut self) -> Result<String> {
        let device = self.inner.device()?;
        let mut id = String::new();
        loop {
            for event in device.fetch_events()? {
                if event.event_type() != EventType::KEY || event.value() != 1 {
                    continue;
                }
                if event.code() == Key::KEY_ENTER.code() {
                    return Ok(id);
                }
                id.push(wedge_char(event.code()));
            }
        }
    }
}

impl TagSource for EvdevTagReader {
    /// Blocks until a tag is read; a failing device is re-opened until it
    /// comes back.
    fn read_tag(&mut self) -> Result<String> {
        loop {
            match self.read_once() {
                Ok(id) => return Ok(id),
                Err(e) => {
                    warn!("tag reader {}: {:#}", self.inner.name, e);
                    self.inner.reopen();
                }
            }
        }
    }
}

pub struct EvdevKeySource {
    inner: Reconnecting,
    pending: VecDeque<KeyEvent>,
}

impl EvdevKeySource {
    pub fn new(name: &str) -> Self {
        Self {
            inner: Reconnecting::new(name),
            pending: VecDeque::new(),
        }
    }

    pub fn is_present(&self) -> bool {
        self.inner.device.is_some()
    }

    fn fill(&mut self) -> Result<()> {
        let device = self.inner.device()?;
        for event in device.fetch_events()? {
            if event.event_type() != EventType::KEY {
                continue;
            }
            let names = key_names(event.code());
            if !names.is_empty() {
                self.pending.push_back(KeyEvent {
                    code: event.code(),
                    value: event.value(),
                    names,
                });
            }
        }
        Ok(())
    }
}

impl KeySource for EvdevKeySource {
    fn next_event(&mut self) -> Result<KeyEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(event);
            }
            if let Err(e) = self.fill() {
                warn!("remote {}: {:#}", self.inner.name, e);
                self.inner.reopen();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wedge_layout() {
        let codes = [2u16, 3, 4, 11];
        let id: String = codes.iter().map(|&c| wedge_char(c)).collect();
        assert_eq!(id, "1230");
        assert_eq!(wedge_char(16), 'q');
        assert_eq!(wedge_char(500), 'X');
    }

    #[test]
    fn test_key_names() {
        assert_eq!(key_names(Key::KEY_OK.code()), vec!["KEY_OK"]);
        assert_eq!(key_names(Key::KEY_5.code()), vec!["KEY_5"]);
        assert!(key_names(Key::BTN_SOUTH.code()).is_empty());
    }

    #[test]
    fn test_key_aliases() {
        assert_eq!(
            key_names(Key::KEY_MUTE.code()),
            vec!["KEY_MUTE", "KEY_MIN_INTERESTING"]
        );
        // evdev prints the first of two names for the same code
        assert_eq!(
            key_names(Key::KEY_FULL_SCREEN.code()),
            vec!["KEY_ZOOM", "KEY_FULL_SCREEN"]
        );
    }
}
