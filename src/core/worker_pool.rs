//! Fixed-size worker pool for long-running actor loops.
//!
//! Tasks are queued on an unbounded channel, so `submit` never blocks.
//! Each worker runs one task to completion before taking the next. Actor
//! loops never return on their own, so the pool is sized with one thread
//! per loop and stopped through its [`ShutdownSignal`]: shutdown closes the
//! queue, fires the signal and waits for every worker to drain out.

use super::errors::{FactoryError, Result};
use super::shutdown::ShutdownSignal;
use crossbeam_channel::{Receiver, Sender};
use log::{debug, error, info, warn};
use parking_lot::{Condvar, Mutex};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Lifecycle of a pool. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    Running,
    ShuttingDown,
    Stopped,
}

struct PoolControl {
    state: PoolState,
    sender: Option<Sender<Task>>,
    live_workers: usize,
    handles: Vec<JoinHandle<()>>,
    /// Set once a bounded shutdown has given up on some worker
    timed_out: bool,
}

struct PoolShared {
    control: Mutex<PoolControl>,
    worker_exited: Condvar,
}

/// Decrements the live worker count when a worker thread ends, however it ends
struct LiveWorker {
    shared: Arc<PoolShared>,
}

impl Drop for LiveWorker {
    fn drop(&mut self) {
        let mut control = self.shared.control.lock();
        control.live_workers = control.live_workers.saturating_sub(1);
        drop(control);
        self.shared.worker_exited.notify_all();
    }
}

pub struct WorkerPool {
    shared: Arc<PoolShared>,
    signal: ShutdownSignal,
    size: usize,
}

impl WorkerPool {
    /// Start a pool of `size` worker threads with a fresh shutdown signal
    pub fn new(size: usize) -> Result<Self> {
        Self::with_signal(size, ShutdownSignal::new())
    }

    /// Start a pool that fires `signal` when it shuts down
    pub fn with_signal(size: usize, signal: ShutdownSignal) -> Result<Self> {
        if size == 0 {
            return Err(FactoryError::InvalidConfig(
                "worker pool needs at least one thread".to_string(),
            ));
        }

        let (sender, receiver) = crossbeam_channel::unbounded::<Task>();
        let pool = Self {
            shared: Arc::new(PoolShared {
                control: Mutex::new(PoolControl {
                    state: PoolState::Running,
                    sender: Some(sender),
                    live_workers: 0,
                    handles: Vec::with_capacity(size),
                    timed_out: false,
                }),
                worker_exited: Condvar::new(),
            }),
            signal,
            size,
        };

        for worker_id in 0..size {
            if let Err(e) = pool.spawn_worker(worker_id, receiver.clone()) {
                error!("[WorkerPool] Failed to spawn worker {}: {}", worker_id, e);
                // Dropping `pool` shuts down the workers already running
                return Err(FactoryError::WorkerSpawn(e));
            }
        }

        info!("[WorkerPool] Started {} worker(s)", size);
        Ok(pool)
    }

    fn spawn_worker(&self, worker_id: usize, tasks: Receiver<Task>) -> std::io::Result<()> {
        let live = LiveWorker {
            shared: Arc::clone(&self.shared),
        };
        // Counted before spawning so a fast-exiting worker cannot underflow
        self.shared.control.lock().live_workers += 1;

        let spawned = thread::Builder::new()
            .name(format!("factory-worker-{}", worker_id))
            .spawn(move || worker_loop(worker_id, tasks, live));

        match spawned {
            Ok(handle) => {
                self.shared.control.lock().handles.push(handle);
                Ok(())
            }
            // The closure (and its LiveWorker) was dropped, undoing the count
            Err(e) => Err(e),
        }
    }

    /// Queue a task. Fails with `PoolClosed` once shutdown has begun.
    pub fn submit<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let control = self.shared.control.lock();
        match (control.state, control.sender.as_ref()) {
            (PoolState::Running, Some(sender)) => sender
                .send(Box::new(task))
                .map_err(|_| FactoryError::PoolClosed),
            _ => Err(FactoryError::PoolClosed),
        }
    }

    /// Stop accepting tasks, fire the shutdown signal and wait for every
    /// worker thread to exit. Idempotent; concurrent callers all wait.
    pub fn shutdown(&self) -> Result<()> {
        self.shutdown_until(None)
    }

    /// Like [`WorkerPool::shutdown`], but gives up after `timeout` with
    /// `ShutdownTimeout` if some task has not honoured cancellation. The
    /// pool stays `ShuttingDown` and may be waited on again. Dropping it
    /// instead detaches the workers still running.
    pub fn shutdown_timeout(&self, timeout: Duration) -> Result<()> {
        self.shutdown_until(Some(Instant::now() + timeout))
    }

    fn shutdown_until(&self, deadline: Option<Instant>) -> Result<()> {
        let mut control = self.shared.control.lock();
        if control.state == PoolState::Running {
            control.state = PoolState::ShuttingDown;
            // Disconnecting the queue wakes idle workers
            control.sender = None;
            info!("[WorkerPool] Shutting down {} worker(s)", control.live_workers);
            drop(control);

            self.signal.trigger();
            control = self.shared.control.lock();
        }

        while control.live_workers > 0 {
            match deadline {
                None => self.shared.worker_exited.wait(&mut control),
                Some(deadline) => {
                    let timed_out = self
                        .shared
                        .worker_exited
                        .wait_until(&mut control, deadline)
                        .timed_out();
                    if timed_out && control.live_workers > 0 {
                        control.timed_out = true;
                        warn!(
                            "[WorkerPool] {} worker(s) still running at shutdown deadline",
                            control.live_workers
                        );
                        return Err(FactoryError::ShutdownTimeout {
                            pending: control.live_workers,
                        });
                    }
                }
            }
        }

        let handles = std::mem::take(&mut control.handles);
        drop(control);
        for handle in handles {
            if handle.join().is_err() {
                warn!("[WorkerPool] Worker thread ended abnormally");
            }
        }

        let mut control = self.shared.control.lock();
        if control.state != PoolState::Stopped {
            control.state = PoolState::Stopped;
            info!("[WorkerPool] Stopped");
        }
        Ok(())
    }

    pub fn state(&self) -> PoolState {
        self.shared.control.lock().state
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of worker threads that have not yet exited
    pub fn live_workers(&self) -> usize {
        self.shared.control.lock().live_workers
    }

    /// The signal fired by shutdown. Clone it into every submitted loop.
    pub fn shutdown_signal(&self) -> &ShutdownSignal {
        &self.signal
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        let mut control = self.shared.control.lock();
        if control.state == PoolState::Stopped {
            return;
        }

        if control.timed_out {
            // Dropped handles detach; the stuck workers die with the process
            let detached = std::mem::take(&mut control.handles);
            warn!(
                "[WorkerPool] Detaching {} worker(s) still running after shutdown timeout",
                control.live_workers
            );
            drop(control);
            drop(detached);
            return;
        }
        drop(control);

        if let Err(e) = self.shutdown() {
            error!("[WorkerPool] Shutdown on drop failed: {}", e);
        }
    }
}

fn worker_loop(worker_id: usize, tasks: Receiver<Task>, _live: LiveWorker) {
    debug!("[Worker {}] Started", worker_id);
    // recv fails only once the queue is both disconnected and empty
    while let Ok(task) = tasks.recv() {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
            error!(
                "[Worker {}] Task panicked: {}",
                worker_id,
                panic_message(payload.as_ref())
            );
        }
    }
    debug!("[Worker {}] Exiting", worker_id);
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
