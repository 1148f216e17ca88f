//! IR remote worker.
//!
//! Keys act on release so that the hold time is known: a long press on an
//! arrow key seeks, a short one skips or jumps to a typed number.

use super::{Dispatch, DigitAccumulator, KeyEvent, KeySource, LockSets, LockState, ERROR_BACKOFF};
use crate::config::BoxConfig;
use anyhow::Result;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Prefix of identifiers composed from typed digits
pub const REMOTE_PREFIX: &str = "lirc";

/// Minimum hold for an arrow key to seek instead of skipping
const SEEK_HOLD: Duration = Duration::from_secs(1);

const KEY_DOWN: i32 = 1;
const KEY_UP: i32 = 0;

const BACKWARD_KEYS: [&str; 2] = ["KEY_CHANNELDOWN", "KEY_LEFT"];
const FORWARD_KEYS: [&str; 2] = ["KEY_CHANNELUP", "KEY_RIGHT"];

/// Seek distance for a key held `hold`: (3 * seconds)^2, one decimal
pub fn seek_seconds(hold: Duration) -> f64 {
    let secs = 3.0 * hold.as_secs_f64();
    (secs * secs * 10.0).round() / 10.0
}

fn numeral(name: &str) -> Option<u8> {
    let digit = name.strip_prefix("KEY_")?;
    match digit.as_bytes() {
        [d @ b'0'..=b'9'] => Some(d - b'0'),
        _ => None,
    }
}

#[derive(Debug, Clone, Default)]
pub struct RemoteSettings {
    pub locks: LockSets,
    pub locked: bool,
}

impl RemoteSettings {
    pub fn from_config(config: &BoxConfig) -> Self {
        Self {
            locks: LockSets {
                lock: config.lock_keys.clone(),
                unlock: config.unlock_keys.clone(),
                toggle: config.toggle_lock_keys.clone(),
            },
            locked: config.lirc_locked,
        }
    }
}

pub struct RemoteProcessor {
    dispatch: Arc<dyn Dispatch>,
    lock: LockState,
    accumulator: DigitAccumulator,
    pressed: HashMap<u16, Instant>,
}

impl RemoteProcessor {
    pub fn new(dispatch: Arc<dyn Dispatch>, settings: RemoteSettings) -> Self {
        Self {
            dispatch,
            lock: LockState::new(settings.locks, settings.locked),
            accumulator: DigitAccumulator::default(),
            pressed: HashMap::new(),
        }
    }

    pub fn is_locked(&self) -> bool {
        self.lock.is_locked()
    }

    /// Process one key transition
    pub fn handle_event(&mut self, event: &KeyEvent, now: Instant) -> Result<()> {
        let hold = match event.value {
            KEY_DOWN => {
                self.pressed.insert(event.code, now);
                return Ok(());
            }
            KEY_UP => self
                .pressed
                .remove(&event.code)
                .map(|down| now.saturating_duration_since(down))
                .unwrap_or_default(),
            // autorepeat
            _ => return Ok(()),
        };

        self.accumulator.expire(now);

        for name in &event.names {
            if self.lock.intercept(name) {
                continue;
            }
            if self.lock.is_locked() {
                debug!("locked, ignoring {}", name);
                continue;
            }

            if let Some(digit) = numeral(name) {
                self.accumulator.push(digit, now);
                continue;
            }

            let result = self.release(name, hold);
            self.accumulator.clear();
            result?;
        }
        Ok(())
    }

    fn release(&mut self, name: &str, hold: Duration) -> Result<()> {
        let pending = self.accumulator.is_pending();
        let backward = BACKWARD_KEYS.contains(&name);
        let forward = FORWARD_KEYS.contains(&name);

        if name == "KEY_OK" && pending {
            let id = format!("{}{}", REMOTE_PREFIX, self.accumulator.digits());
            self.dispatch.play_action(&id).map(|_| ())
        } else if backward && hold >= SEEK_HOLD {
            self.dispatch.seek(-seek_seconds(hold))
        } else if forward && hold >= SEEK_HOLD {
            self.dispatch.seek(seek_seconds(hold))
        } else if (backward || forward) && pending {
            match self.accumulator.digits().parse::<u32>() {
                Ok(pos) => self.dispatch.jump_to(pos),
                Err(e) => {
                    warn!("cannot jump to {:?}: {}", self.accumulator.digits(), e);
                    Ok(())
                }
            }
        } else {
            self.dispatch.play_action(name).map(|_| ())
        }
    }

    /// Read and process key events until `running` is cleared
    pub fn run(&mut self, source: &mut dyn KeySource, running: &AtomicBool) {
        while running.load(Ordering::SeqCst) {
            let result = source
                .next_event()
                .and_then(|event| self.handle_event(&event, Instant::now()));

            if let Err(e) = result {
                error!("Execution failed: {:#}", e);
                std::thread::sleep(ERROR_BACKOFF);
            }
        }
    }
}
