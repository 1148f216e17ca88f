//! Cancelable one-shot deferred callbacks.
//!
//! Used for the connection idle-close and the mute-after-idle timeout. Each
//! [`OneShotTimer`] holds at most one pending callback: arming it again
//! supersedes the previous one, cancelling aborts it. A callback that has
//! already started running is never interrupted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::warn;

pub struct OneShotTimer {
    name: &'static str,
    runtime: Handle,
    generation: Arc<AtomicU64>,
    pending: Mutex<Option<AbortHandle>>,
}

impl OneShotTimer {
    pub fn new(name: &'static str, runtime: Handle) -> Self {
        Self {
            name,
            runtime,
            generation: Arc::new(AtomicU64::new(0)),
            pending: Mutex::new(None),
        }
    }

    /// Run `callback` on the blocking pool after `delay`, replacing whatever
    /// was pending.
    pub fn arm<F>(&self, delay: Duration, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let generation = Arc::clone(&self.generation);
        let name = self.name;

        let task = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            // superseded while we slept
            if generation.load(Ordering::SeqCst) != ticket {
                return;
            }
            if let Err(e) = tokio::task::spawn_blocking(callback).await {
                warn!("{} timer callback failed: {}", name, e);
            }
        });

        if let Some(old) = self.swap_pending(Some(task.abort_handle())) {
            old.abort();
        }
    }

    /// Drop the pending callback, if any.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(old) = self.swap_pending(None) {
            old.abort();
        }
    }

    fn swap_pending(&self, next: Option<AbortHandle>) -> Option<AbortHandle> {
        match self.pending.lock() {
            Ok(mut guard) => std::mem::replace(&mut *guard, next),
            Err(poisoned) => std::mem::replace(&mut *poisoned.into_inner(), next),
        }
    }
}

impl Drop for OneShotTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_fires_once_after_delay() {
        let timer = OneShotTimer::new("test", Handle::current());
        let hits = Arc::new(AtomicUsize::new(0));

        let h = Arc::clone(&hits);
        timer.arm(Duration::from_millis(20), move || {
            h.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_rearm_supersedes_previous() {
        let timer = OneShotTimer::new("test", Handle::current());
        let hits = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let h = Arc::clone(&hits);
            timer.arm(Duration::from_millis(40), move || {
                h.fetch_add(1, Ordering::SeqCst);
            });
        }

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_cancel_before_fire() {
        let timer = OneShotTimer::new("test", Handle::current());
        let hits = Arc::new(AtomicUsize::new(0));

        let h = Arc::clone(&hits);
        timer.arm(Duration::from_millis(30), move || {
            h.fetch_add(1, Ordering::SeqCst);
        });
        timer.cancel();

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }
}
