//! Tag-scan worker.

use super::{Dispatch, DigitAccumulator, LockSets, LockState, TagSource, ERROR_BACKOFF};
use crate::config::BoxConfig;
use anyhow::Result;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Delay between two reads
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Digits composing one jump target
const JUMP_DIGITS: usize = 3;

const DEFAULT_DELAY_KEY: &str = "default";

#[derive(Debug, Clone, Default)]
pub struct TagSettings {
    /// Overwritten with every scanned id
    pub latest_file: Option<PathBuf>,
    /// Seconds a repeated tag is ignored, by previously performed action
    pub same_card_delay: HashMap<String, f64>,
    pub locks: LockSets,
    pub locked: bool,
    /// Tags standing for a single digit
    pub jump_cards: HashMap<String, u8>,
}

impl TagSettings {
    pub fn from_config(config: &BoxConfig) -> Self {
        Self {
            latest_file: config.latest_rfid_file.clone(),
            same_card_delay: config.same_card_delay.clone(),
            locks: LockSets {
                lock: config.lock_card_ids.clone(),
                unlock: config.unlock_card_ids.clone(),
                toggle: config.toggle_lock_card_ids.clone(),
            },
            locked: config.rfid_locked,
            jump_cards: config.jump_cards.clone(),
        }
    }
}

/// What happened to one scanned tag
#[derive(Debug, Clone, PartialEq)]
pub enum TagOutcome {
    LockChanged,
    Locked,
    Accumulating,
    Suppressed,
    Dispatched(Option<String>),
}

#[derive(Debug, Clone)]
struct Previous {
    id: String,
    action: Option<String>,
    at: Instant,
}

pub struct TagProcessor {
    dispatch: Arc<dyn Dispatch>,
    latest_file: Option<PathBuf>,
    same_card_delay: HashMap<String, f64>,
    lock: LockState,
    jump_cards: HashMap<String, u8>,
    accumulator: DigitAccumulator,
    previous: Option<Previous>,
}

impl TagProcessor {
    pub fn new(dispatch: Arc<dyn Dispatch>, settings: TagSettings) -> Self {
        Self {
            dispatch,
            latest_file: settings.latest_file,
            same_card_delay: settings.same_card_delay,
            lock: LockState::new(settings.locks, settings.locked),
            jump_cards: settings.jump_cards,
            accumulator: DigitAccumulator::default(),
            previous: None,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.lock.is_locked()
    }

    /// Process one scanned tag
    pub fn handle_tag(&mut self, id: &str, now: Instant) -> Result<TagOutcome> {
        info!("tag {}", id);
        self.write_latest(id);

        if self.lock.intercept(id) {
            return Ok(TagOutcome::LockChanged);
        }
        if self.lock.is_locked() {
            debug!("locked, ignoring {}", id);
            return Ok(TagOutcome::Locked);
        }

        self.accumulator.expire(now);

        if let Some(&digit) = self.jump_cards.get(id) {
            self.accumulator.push(digit, now);
            if self.accumulator.len() < JUMP_DIGITS {
                return Ok(TagOutcome::Accumulating);
            }
            let target = self.accumulator.take();
            return self.dispatch_id(&target, now);
        }

        if self.accumulator.is_pending() {
            debug!("dropping unfinished number {}", self.accumulator.digits());
            self.accumulator.clear();
        }

        if let Some(prev) = &self.previous {
            let delay = self.delay_after(prev.action.as_deref());
            if prev.id == id && now.saturating_duration_since(prev.at) < delay {
                debug!("Ignoring card due to sameCardDelay");
                return Ok(TagOutcome::Suppressed);
            }
        }

        self.dispatch_id(id, now)
    }

    fn dispatch_id(&mut self, id: &str, now: Instant) -> Result<TagOutcome> {
        let action = self.dispatch.play_action(id)?;
        self.previous = Some(Previous {
            id: id.to_string(),
            action: action.clone(),
            at: now,
        });
        Ok(TagOutcome::Dispatched(action))
    }

    fn delay_after(&self, action: Option<&str>) -> Duration {
        let secs = action
            .and_then(|a| self.same_card_delay.get(a))
            .or_else(|| self.same_card_delay.get(DEFAULT_DELAY_KEY))
            .copied()
            .unwrap_or(0.0);
        Duration::from_secs_f64(secs.max(0.0))
    }

    fn write_latest(&self, id: &str) {
        if let Some(path) = &self.latest_file {
            if let Err(e) = fs::write(path, id) {
                warn!("cannot write {}: {}", path.display(), e);
            }
        }
    }

    /// Read and process tags until `running` is cleared
    pub fn run(&mut self, source: &mut dyn TagSource, running: &AtomicBool) {
        while running.load(Ordering::SeqCst) {
            std::thread::sleep(POLL_INTERVAL);

            let result = source
                .read_tag()
                .and_then(|id| self.handle_tag(&id, Instant::now()));

            if let Err(e) = result {
                error!("Execution failed: {:#}", e);
                std::thread::sleep(ERROR_BACKOFF);
            }
        }
    }
}
