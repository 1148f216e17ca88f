//! Lazily connected, self-closing access to the player daemon.
//!
//! The daemon is touched in short bursts (a tag scan, a key press), so the
//! pool keeps one session open while events keep coming and hangs up after
//! `close_after` of silence.

use super::traits::{Connector, RemotePlayer};
use crate::error::BoxError;
use crate::timer::OneShotTimer;
use anyhow::{anyhow, Result};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, warn};

struct PoolState {
    session: Option<Box<dyn RemotePlayer>>,
    /// Bumped on every release; an idle-close only acts on the epoch it was armed for
    epoch: u64,
}

pub struct ConnectionPool {
    connector: Box<dyn Connector>,
    close_after: Duration,
    state: Arc<Mutex<PoolState>>,
    idle_timer: OneShotTimer,
}

impl ConnectionPool {
    pub fn new(connector: Box<dyn Connector>, close_after: Duration, runtime: Handle) -> Self {
        Self {
            connector,
            close_after,
            state: Arc::new(Mutex::new(PoolState {
                session: None,
                epoch: 0,
            })),
            idle_timer: OneShotTimer::new("idle-close", runtime),
        }
    }

    /// Run `f` against a connected session.
    ///
    /// Connects (and authenticates) first if needed. Whatever `f` returns,
    /// the idle-close timer is re-armed afterwards; an error from `f` also
    /// drops the session so the next caller starts from a fresh connection.
    pub fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn RemotePlayer) -> Result<T>,
    {
        self.idle_timer.cancel();

        // 1. Lock the pool 🔒
        let mut state = self
            .state
            .lock()
            .map_err(|_| BoxError::Poisoned("connection pool"))?;

        // 2. Connect if the last session was closed
        if state.session.is_none() {
            match self.connector.connect() {
                Ok(session) => {
                    debug!("opened session to {}", self.connector.describe());
                    state.session = Some(session);
                }
                Err(e) => {
                    self.arm_idle_close(&mut state);
                    return Err(e);
                }
            }
        }

        // 3. Use the session
        let result = match state.session.as_deref_mut() {
            Some(session) => f(session),
            None => Err(anyhow!("No player connection")),
        };

        if let Err(e) = &result {
            warn!("dropping player session after error: {:#}", e);
            state.session = None;
        }

        // 4. Release
        self.arm_idle_close(&mut state);
        result
    }

    pub fn is_connected(&self) -> bool {
        self.state
            .lock()
            .map(|state| state.session.is_some())
            .unwrap_or(false)
    }

    fn arm_idle_close(&self, state: &mut PoolState) {
        state.epoch += 1;
        let epoch = state.epoch;
        let shared = Arc::clone(&self.state);
        let target = self.connector.describe();

        self.idle_timer.arm(self.close_after, move || {
            let Ok(mut state) = shared.lock() else {
                return;
            };
            // re-acquired since this timer was armed
            if state.epoch != epoch {
                return;
            }
            if state.session.take().is_some() {
                debug!("closed idle session to {}", target);
            }
        });
    }
}
