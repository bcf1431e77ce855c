use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, select, Receiver, Sender, TrySendError};

use crate::{ClusterError, Result};

/// Unique identifier for background tasks
pub type TaskId = String;

/// Work that runs on the background pool
pub trait BackgroundTask: Send + 'static {
    /// Get the task ID, used in log messages
    fn task_id(&self) -> TaskId;

    /// Execute the task. Errors are logged by the pool, never surfaced.
    fn execute(self: Box<Self>, ctx: &TaskContext) -> Result<()>;
}

/// Cancellation flag shared between a submitter and its tasks.
///
/// Cancelling also disconnects a channel, so a task blocked in
/// [`TaskContext::sleep_unless_cancelled`] wakes immediately.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    trigger: Arc<Mutex<Option<Sender<()>>>>,
    signal: Receiver<()>,
}

impl CancellationToken {
    pub fn new() -> Self {
        let (trigger, signal) = bounded(0);
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            trigger: Arc::new(Mutex::new(Some(trigger))),
            signal,
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.trigger
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// What a running task can see of its worker
pub struct TaskContext {
    shutdown_rx: Receiver<()>,
    token: CancellationToken,
}

impl TaskContext {
    /// Sleeps for `duration` unless the pool shuts down first.
    /// Returns `false` when the pool is shutting down.
    pub fn sleep(&self, duration: Duration) -> bool {
        if duration.is_zero() {
            return !self.is_shutting_down();
        }
        select! {
            recv(self.shutdown_rx) -> _ => false,
            recv(crossbeam_channel::after(duration)) -> _ => !self.is_shutting_down(),
        }
    }

    /// Like [`sleep`](Self::sleep), but also returns `false` as soon as
    /// `token` is cancelled.
    pub fn sleep_unless_cancelled(&self, duration: Duration, token: &CancellationToken) -> bool {
        if token.is_cancelled() || self.is_shutting_down() {
            return false;
        }
        if duration.is_zero() {
            return true;
        }
        select! {
            recv(self.shutdown_rx) -> _ => false,
            recv(token.signal) -> _ => false,
            recv(crossbeam_channel::after(duration)) -> _ => {
                !self.is_shutting_down() && !token.is_cancelled()
            }
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Configuration for the background task manager
#[derive(Debug, Clone)]
pub struct TaskManagerConfig {
    /// Number of worker threads
    pub worker_threads: usize,
    /// Tasks queued before new submissions are rejected
    pub max_queue_size: usize,
    /// Prefix for worker thread names
    pub thread_name: String,
}

impl Default for TaskManagerConfig {
    fn default() -> Self {
        Self {
            worker_threads: 2,
            max_queue_size: 16,
            thread_name: "mapcluster-worker".to_string(),
        }
    }
}

#[derive(Debug, Default)]
struct TaskCounters {
    completed: AtomicUsize,
    failed: AtomicUsize,
    rejected: AtomicUsize,
}

/// A fixed pool of worker threads fed by a bounded queue.
///
/// Submissions never block: when the queue is full the task is rejected.
/// A failing or panicking task is logged and the worker carries on.
pub struct BackgroundTaskManager {
    task_tx: Option<Sender<Box<dyn BackgroundTask>>>,
    shutdown_tx: Option<Sender<()>>,
    token: CancellationToken,
    workers: Vec<JoinHandle<()>>,
    counters: Arc<TaskCounters>,
}

impl BackgroundTaskManager {
    pub fn new(config: TaskManagerConfig) -> Result<Self> {
        let (task_tx, task_rx) = bounded::<Box<dyn BackgroundTask>>(config.max_queue_size.max(1));
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);
        let token = CancellationToken::new();
        let counters = Arc::new(TaskCounters::default());

        let mut workers = Vec::with_capacity(config.worker_threads.max(1));
        for index in 0..config.worker_threads.max(1) {
            let task_rx = task_rx.clone();
            let ctx = TaskContext {
                shutdown_rx: shutdown_rx.clone(),
                token: token.clone(),
            };
            let counters = Arc::clone(&counters);

            let handle = std::thread::Builder::new()
                .name(format!("{}-{}", config.thread_name, index))
                .spawn(move || Self::worker_loop(task_rx, ctx, counters))
                .map_err(|e| ClusterError::WorkerPool(format!("failed to spawn worker: {}", e)))?;
            workers.push(handle);
        }

        log::debug!(
            "background task manager started with {} workers, queue size {}",
            workers.len(),
            config.max_queue_size
        );
        Ok(Self {
            task_tx: Some(task_tx),
            shutdown_tx: Some(shutdown_tx),
            token,
            workers,
            counters,
        })
    }

    /// Queue a task. Fails if the queue is full or the manager shut down.
    pub fn submit_task(&self, task: Box<dyn BackgroundTask>) -> Result<()> {
        let task_tx = self
            .task_tx
            .as_ref()
            .ok_or_else(|| ClusterError::WorkerPool("task manager is shut down".into()))?;

        match task_tx.try_send(task) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(task)) => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                Err(ClusterError::WorkerPool(format!(
                    "task queue is full, dropping '{}'",
                    task.task_id()
                )))
            }
            Err(TrySendError::Disconnected(_)) => {
                Err(ClusterError::WorkerPool("task queue is closed".into()))
            }
        }
    }

    /// Stops the workers and waits for them. Queued tasks are discarded and a
    /// task sleeping in [`TaskContext::sleep`] wakes up immediately.
    pub fn shutdown(&mut self) {
        if self.shutdown_tx.is_none() {
            return;
        }
        log::debug!("shutting down background task manager");

        self.token.cancel();
        // Disconnecting both channels wakes every worker
        self.shutdown_tx.take();
        self.task_tx.take();

        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::warn!("background worker exited with a panic");
            }
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Get the current number of queued tasks
    pub fn queued_tasks(&self) -> usize {
        self.task_tx.as_ref().map(Sender::len).unwrap_or(0)
    }

    pub fn completed_tasks(&self) -> usize {
        self.counters.completed.load(Ordering::Relaxed)
    }

    pub fn failed_tasks(&self) -> usize {
        self.counters.failed.load(Ordering::Relaxed)
    }

    pub fn rejected_tasks(&self) -> usize {
        self.counters.rejected.load(Ordering::Relaxed)
    }

    fn worker_loop(
        task_rx: Receiver<Box<dyn BackgroundTask>>,
        ctx: TaskContext,
        counters: Arc<TaskCounters>,
    ) {
        loop {
            let next = select! {
                recv(task_rx) -> task => task.ok(),
                recv(ctx.shutdown_rx) -> _ => None,
            };
            let Some(task) = next else {
                break;
            };
            if ctx.is_shutting_down() {
                break;
            }

            let task_id = task.task_id();
            match panic::catch_unwind(AssertUnwindSafe(|| task.execute(&ctx))) {
                Ok(Ok(())) => {
                    counters.completed.fetch_add(1, Ordering::Relaxed);
                }
                Ok(Err(e)) => {
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                    log::warn!("background task '{}' failed: {}", task_id, e);
                }
                Err(_) => {
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                    log::warn!("background task '{}' panicked", task_id);
                }
            }
        }
    }
}

impl Drop for BackgroundTaskManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}
