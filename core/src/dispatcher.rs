/*!
# Dispatcher Module

This module defines the bounded-concurrency dispatcher for FlowGate.

The dispatcher is responsible for:
- Accepting tasks without ever blocking the caller
- Starting queued tasks in FIFO order while fewer than `max_concurrency` run
- Releasing a slot when a task finishes, whether it returned or panicked
- Running a background scheduler loop that re-checks the queue whenever a
  slot frees up, with a periodic poll as a fallback

Key components include:
- The `Dispatcher` trait defining the submission and status interface
- `BoundedDispatcher`, a cloneable handle over the shared queue and capacity
- The scheduler loop, stopped by `close`/`shutdown`, or after draining once the last handle is dropped

All queue and capacity bookkeeping lives under a single mutex. Task bodies
always run outside of it, so a long task never delays new submissions.
*/

use crate::capacity::CapacityTracker;
use crate::config::DispatcherConfig;
use crate::error::{FlowGateError, Result};
use crate::queue::TaskQueue;
use crate::stats::{self, DispatcherStats};
use crate::task::Task;
use async_trait::async_trait;
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info, trace, warn};

/// Trait for submitting work under a concurrency limit
#[async_trait]
pub trait Dispatcher: Send + Sync + 'static {
    /// Queue a task and start it as soon as a slot is free.
    ///
    /// Never waits for the task to start or finish.
    fn submit(&self, task: Task) -> Result<()>;

    /// Whether at least one task is executing right now
    fn is_running(&self) -> bool;

    /// Number of tasks waiting for a slot
    fn pending(&self) -> usize;

    /// Wait until nothing is executing and nothing is queued
    async fn wait_idle(&self);
}

struct State {
    queue: TaskQueue,
    capacity: CapacityTracker,
    closed: bool,
    dispatched: u64,
    completed: u64,
    panicked: u64,
    dispatch_passes: u64,
}

impl State {
    fn is_idle(&self) -> bool {
        !self.capacity.is_busy() && self.queue.is_empty()
    }
}

struct Shared {
    state: Mutex<State>,
    /// Slot freed. `notify_one` keeps a permit when the loop is not waiting.
    wake: Notify,
    /// Transition to idle
    idle: Notify,
    poll_interval: Duration,
    runtime: Handle,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        // Task code never runs under this lock
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start queued tasks until the queue is drained or every slot is taken.
    fn dispatch_pass(self: &Arc<Self>, state: &mut State) -> usize {
        if state.queue.is_empty() {
            return 0;
        }
        state.dispatch_passes += 1;

        let mut started = 0;
        while state.capacity.has_capacity() {
            let Some(task) = state.queue.pop() else {
                break;
            };
            state.capacity.acquire();
            state.dispatched += 1;
            started += 1;
            self.launch(task);
        }

        if started > 0 {
            metrics::counter!(stats::TASKS_DISPATCHED, started as u64);
        }
        stats::publish_gauges(state.capacity.active(), state.queue.len());
        debug!(
            started,
            active = state.capacity.active(),
            pending = state.queue.len(),
            "Dispatch pass"
        );

        started
    }

    /// Run a task on the runtime; its slot is already acquired.
    fn launch(self: &Arc<Self>, task: Task) {
        let shared = Arc::clone(self);
        self.runtime.spawn(async move {
            let kind = task.kind();
            trace!(kind, "Task started");

            let panicked = match task {
                Task::Blocking(f) => match tokio::task::spawn_blocking(f).await {
                    Ok(()) => false,
                    Err(err) => err.is_panic(),
                },
                Task::Async(fut) => AssertUnwindSafe(fut).catch_unwind().await.is_err(),
            };

            shared.finish(kind, panicked);
        });
    }

    fn finish(&self, kind: &'static str, panicked: bool) {
        let became_idle = {
            let mut state = self.lock();
            state.capacity.release();
            state.completed += 1;
            if panicked {
                state.panicked += 1;
            }
            stats::publish_gauges(state.capacity.active(), state.queue.len());
            state.is_idle()
        };

        metrics::increment_counter!(stats::TASKS_COMPLETED);
        if panicked {
            metrics::increment_counter!(stats::TASK_PANICS);
            warn!(kind, "Task panicked, releasing its slot");
        } else {
            trace!(kind, "Task finished");
        }

        if became_idle {
            self.idle.notify_waiters();
        }
        self.wake.notify_one();
    }
}

async fn scheduler_loop(shared: Arc<Shared>, mut shutdown_rx: watch::Receiver<bool>) {
    debug!(
        poll_interval_ms = shared.poll_interval.as_millis() as u64,
        "Scheduler loop started"
    );

    // Set once every handle is gone. Queued work still drains before the loop exits.
    let mut detached = false;

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        {
            let mut state = shared.lock();
            shared.dispatch_pass(&mut state);
            if detached && state.is_idle() {
                break;
            }
        }

        tokio::select! {
            _ = shared.wake.notified() => {}
            _ = time::sleep(shared.poll_interval) => {
                trace!("Poll interval elapsed");
            }
            changed = shutdown_rx.changed(), if !detached => {
                if changed.is_err() {
                    debug!("Every dispatcher handle dropped, draining queued tasks");
                    detached = true;
                }
            }
        }
    }

    debug!("Scheduler loop stopped");
}

struct Control {
    shutdown_tx: watch::Sender<bool>,
    scheduler: Mutex<Option<JoinHandle<()>>>,
}

/// Dispatcher that runs at most `max_concurrency` tasks at a time.
///
/// Cloning yields another handle to the same dispatcher. Dropping the last
/// handle does not abandon accepted work: the scheduler loop keeps starting
/// queued tasks and exits once nothing is queued or executing. Only
/// [`close`](Self::close) discards queued tasks.
#[derive(Clone)]
pub struct BoundedDispatcher {
    shared: Arc<Shared>,
    control: Arc<Control>,
}

impl BoundedDispatcher {
    /// Create a dispatcher with the given limit and default settings.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(max_concurrency: usize) -> Result<Self> {
        Self::with_config(DispatcherConfig::new(max_concurrency))
    }

    /// Create a dispatcher with a custom configuration on the current runtime
    pub fn with_config(config: DispatcherConfig) -> Result<Self> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| FlowGateError::NoRuntime)?;
        Self::with_config_on(config, runtime)
    }

    /// Create a dispatcher that spawns its work on `runtime`.
    ///
    /// Usable from outside the runtime's own threads.
    pub fn with_config_on(config: DispatcherConfig, runtime: Handle) -> Result<Self> {
        config.validate()?;

        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                queue: TaskQueue::new(),
                capacity: CapacityTracker::new(config.max_concurrency),
                closed: false,
                dispatched: 0,
                completed: 0,
                panicked: 0,
                dispatch_passes: 0,
            }),
            wake: Notify::new(),
            idle: Notify::new(),
            poll_interval: config.poll_interval(),
            runtime: runtime.clone(),
        });

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let scheduler = runtime.spawn(scheduler_loop(Arc::clone(&shared), shutdown_rx));

        info!(
            max_concurrency = config.max_concurrency,
            poll_interval_ms = config.poll_interval_ms,
            "Dispatcher started"
        );

        Ok(Self {
            shared,
            control: Arc::new(Control {
                shutdown_tx,
                scheduler: Mutex::new(Some(scheduler)),
            }),
        })
    }

    /// Submit a synchronous closure
    pub fn submit_fn<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit(Task::blocking(f))
    }

    /// Submit a future
    pub fn submit_future<Fut>(&self, fut: Fut) -> Result<()>
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.submit(Task::future(fut))
    }

    /// Ceiling on concurrently executing tasks
    pub fn max_concurrency(&self) -> usize {
        self.shared.lock().capacity.max()
    }

    /// Whether `close` or `shutdown` has been called
    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    /// Snapshot of the dispatcher's counters
    pub fn stats(&self) -> DispatcherStats {
        let state = self.shared.lock();
        DispatcherStats {
            max_concurrency: state.capacity.max(),
            active: state.capacity.active(),
            pending: state.queue.len(),
            dispatched: state.dispatched,
            completed: state.completed,
            panicked: state.panicked,
            dispatch_passes: state.dispatch_passes,
        }
    }

    /// Stop accepting tasks and stop the scheduler loop.
    ///
    /// Queued tasks are dropped without running; the number dropped is
    /// returned. Tasks already executing run to completion.
    pub fn close(&self) -> usize {
        let (discarded, idle) = {
            let mut state = self.shared.lock();
            if state.closed {
                return 0;
            }
            state.closed = true;
            let discarded = state.queue.clear();
            stats::publish_gauges(state.capacity.active(), 0);
            (discarded, state.is_idle())
        };

        // The loop may already be gone
        let _ = self.control.shutdown_tx.send(true);
        if idle {
            self.shared.idle.notify_waiters();
        }

        info!(discarded, "Dispatcher closed");
        discarded
    }

    /// Close the dispatcher, then wait for executing tasks and the scheduler loop to finish
    pub async fn shutdown(&self) {
        self.close();

        let scheduler = self
            .control
            .scheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = scheduler {
            if let Err(err) = handle.await {
                warn!("Scheduler loop ended abnormally: {}", err);
            }
        }

        self.wait_idle().await;
    }
}

#[async_trait]
impl Dispatcher for BoundedDispatcher {
    fn submit(&self, task: Task) -> Result<()> {
        let mut state = self.shared.lock();
        if state.closed {
            return Err(FlowGateError::Closed);
        }

        trace!(kind = task.kind(), "Task submitted");
        state.queue.push(task);
        self.shared.dispatch_pass(&mut state);
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.shared.lock().capacity.is_busy()
    }

    fn pending(&self) -> usize {
        self.shared.lock().queue.len()
    }

    async fn wait_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            tokio::pin!(notified);
            // Register before checking so a concurrent transition is not missed
            notified.as_mut().enable();

            let idle = self.shared.lock().is_idle();
            if idle {
                return;
            }
            notified.await;
        }
    }
}

impl fmt::Debug for BoundedDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedDispatcher")
            .field("stats", &self.stats())
            .field("closed", &self.is_closed())
            .finish()
    }
}
