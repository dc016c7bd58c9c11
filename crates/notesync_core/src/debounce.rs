//! Cancellable single-slot timer.
//!
//! Scheduling replaces whatever was pending. When the delay elapses the
//! action is spawned as its own task, so cancelling or rescheduling only
//! ever stops a timer that has not fired yet and never an action that is
//! already running.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;

/// A debounced action slot.
#[derive(Debug)]
pub struct Debouncer {
    label: &'static str,
    delay: Duration,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    /// Create a debouncer. `label` only shows up in logs.
    pub fn new(label: &'static str, delay: Duration) -> Self {
        Self {
            label,
            delay,
            timer: Mutex::new(None),
        }
    }

    /// Configured delay.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `action` once `delay` passes without another call to `schedule`
    /// or `cancel`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule<F, Fut>(&self, action: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let delay = self.delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tokio::spawn(action());
        });

        let previous = self.timer.lock().unwrap().replace(handle);
        if let Some(previous) = previous {
            previous.abort();
            log::trace!("[Debouncer:{}] rescheduled", self.label);
        }
    }

    /// Stop a pending timer. Returns true if one was pending.
    pub fn cancel(&self) -> bool {
        match self.timer.lock().unwrap().take() {
            Some(handle) => {
                let pending = !handle.is_finished();
                handle.abort();
                if pending {
                    log::trace!("[Debouncer:{}] cancelled", self.label);
                }
                pending
            }
            None => false,
        }
    }

    /// Whether a timer is waiting to fire.
    pub fn is_pending(&self) -> bool {
        self.timer
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        if let Ok(mut timer) = self.timer.lock()
            && let Some(handle) = timer.take()
        {
            handle.abort();
        }
    }
}
