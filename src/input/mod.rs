//! Input workers: tag readers and the IR remote.
//!
//! Both processors are plain state machines fed with events and an explicit
//! `now`, so they can be driven from tests without devices or clocks.

#[cfg(feature = "evdev")]
pub mod device;
pub mod remote;
pub mod rfid;

pub use remote::RemoteProcessor;
pub use rfid::TagProcessor;

use anyhow::Result;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::info;

/// Inactivity after which a half-entered number is dropped
pub const ACCUMULATOR_WINDOW: Duration = Duration::from_secs(5);

/// Pause after a failed event before reading the next one
pub const ERROR_BACKOFF: Duration = Duration::from_secs(2);

/// What the input processors need from the rest of the daemon.
pub trait Dispatch: Send + Sync {
    /// Resolve and act on an identifier; returns the performed action name
    fn play_action(&self, id: &str) -> Result<Option<String>>;
    /// Relative seek, bypassing the shortcut lookup
    fn seek(&self, rel_secs: f64) -> Result<()>;
    /// Jump to a queue position, bypassing the shortcut lookup
    fn jump_to(&self, pos: u32) -> Result<()>;
}

/// Blocking source of tag identifiers
pub trait TagSource: Send {
    fn read_tag(&mut self) -> Result<String>;
}

/// A key transition from the remote
#[derive(Debug, Clone, PartialEq)]
pub struct KeyEvent {
    pub code: u16,
    /// 1 down, 0 up, 2 autorepeat
    pub value: i32,
    /// Logical names of the key (`KEY_OK`, ...)
    pub names: Vec<String>,
}

impl KeyEvent {
    pub fn new(code: u16, value: i32, name: &str) -> Self {
        Self {
            code,
            value,
            names: vec![name.to_string()],
        }
    }
}

/// Blocking source of key events
pub trait KeySource: Send {
    fn next_event(&mut self) -> Result<KeyEvent>;
}

#[derive(Debug, Clone, Default)]
pub struct LockSets {
    pub lock: HashSet<String>,
    pub unlock: HashSet<String>,
    pub toggle: HashSet<String>,
}

/// Child lock shared by lock/unlock/toggle identifiers
#[derive(Debug, Clone)]
pub struct LockState {
    sets: LockSets,
    locked: bool,
}

impl LockState {
    pub fn new(sets: LockSets, locked: bool) -> Self {
        Self { sets, locked }
    }

    /// Apply `id` if it is a lock identifier. Returns true when the event
    /// was consumed.
    pub fn intercept(&mut self, id: &str) -> bool {
        if self.sets.lock.contains(id) {
            self.locked = true;
        } else if self.sets.unlock.contains(id) {
            self.locked = false;
        } else if self.sets.toggle.contains(id) {
            self.locked = !self.locked;
        } else {
            return false;
        }
        info!("input {}", if self.locked { "locked" } else { "unlocked" });
        true
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }
}

/// Digits entered one at a time, forgotten after a quiet `window`.
///
/// An input exactly `window` after the previous one still counts.
#[derive(Debug, Clone)]
pub struct DigitAccumulator {
    digits: String,
    last: Option<Instant>,
    window: Duration,
}

impl Default for DigitAccumulator {
    fn default() -> Self {
        Self::new(ACCUMULATOR_WINDOW)
    }
}

impl DigitAccumulator {
    pub fn new(window: Duration) -> Self {
        Self {
            digits: String::new(),
            last: None,
            window,
        }
    }

    /// Drop the digits if the window has passed since the last one
    pub fn expire(&mut self, now: Instant) {
        if let Some(last) = self.last {
            if now.saturating_duration_since(last) > self.window {
                self.clear();
            }
        }
    }

    pub fn push(&mut self, digit: u8, now: Instant) {
        self.expire(now);
        self.digits.push(char::from(b'0' + digit.min(9)));
        self.last = Some(now);
    }

    pub fn is_pending(&self) -> bool {
        self.last.is_some()
    }

    pub fn len(&self) -> usize {
        self.digits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.digits.is_empty()
    }

    pub fn digits(&self) -> &str {
        &self.digits
    }

    pub fn take(&mut self) -> String {
        self.last = None;
        std::mem::take(&mut self.digits)
    }

    pub fn clear(&mut self) {
        self.digits.clear();
        self.last = None;
    }
}
