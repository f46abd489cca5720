//! Process-wide cooperative cancellation.
//!
//! A [`ShutdownSignal`] is cloned into every actor loop. Loops poll
//! [`ShutdownSignal::is_triggered`] at the top of each iteration and pace
//! themselves with [`ShutdownSignal::sleep`], which returns early once the
//! signal fires. Blocking resources such as buffers are attached as
//! [`Closeable`]s so that triggering the signal also wakes every thread
//! parked inside them.

use log::info;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::Duration;

/// A resource whose blocked waiters must be released on shutdown
pub trait Closeable: Send + Sync {
    fn close(&self);
}

struct SignalState {
    triggered: bool,
    attached: Vec<Arc<dyn Closeable>>,
}

struct SignalInner {
    state: Mutex<SignalState>,
    wakeup: Condvar,
}

/// Broadcast cancellation token. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct ShutdownSignal {
    inner: Arc<SignalInner>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SignalInner {
                state: Mutex::new(SignalState {
                    triggered: false,
                    attached: Vec::new(),
                }),
                wakeup: Condvar::new(),
            }),
        }
    }

    /// Close `resource` when the signal fires. Closes it immediately if the
    /// signal has already fired.
    pub fn attach(&self, resource: Arc<dyn Closeable>) {
        let mut state = self.inner.state.lock();
        if state.triggered {
            drop(state);
            resource.close();
        } else {
            state.attached.push(resource);
        }
    }

    /// Fire the signal. Idempotent; returns true only for the first call.
    pub fn trigger(&self) -> bool {
        let attached = {
            let mut state = self.inner.state.lock();
            if state.triggered {
                return false;
            }
            state.triggered = true;
            std::mem::take(&mut state.attached)
        };
        self.inner.wakeup.notify_all();

        info!("Shutdown signalled, closing {} attached resource(s)", attached.len());
        // Closed outside our own lock: each resource takes its own lock to wake waiters.
        for resource in attached {
            resource.close();
        }
        true
    }

    pub fn is_triggered(&self) -> bool {
        self.inner.state.lock().triggered
    }

    /// Sleep for `duration` unless the signal fires first.
    ///
    /// Returns `true` if the full duration elapsed, `false` if cut short
    /// (or the signal had already fired).
    pub fn sleep(&self, duration: Duration) -> bool {
        let mut state = self.inner.state.lock();
        if state.triggered {
            return false;
        }
        self.inner
            .wakeup
            .wait_while_for(&mut state, |s| !s.triggered, duration);
        !state.triggered
    }

    /// Block until the signal fires
    pub fn wait(&self) {
        let mut state = self.inner.state.lock();
        while !state.triggered {
            self.inner.wakeup.wait(&mut state);
        }
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownSignal")
            .field("triggered", &self.is_triggered())
            .finish()
    }
}
