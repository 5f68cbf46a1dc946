use std::{
    collections::VecDeque,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    thread::{self, JoinHandle},
    time::Duration
};
use thiserror::Error;
use tracing::{debug, error};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum TaskError {
    #[error("task panicked: {0}")]
    Panicked(String),

    #[error("task was cancelled before it ran")]
    Cancelled
}

type Task = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
struct PoolState {
    tasks: VecDeque<Task>,
    in_flight: usize,
    live_workers: usize,
    target_workers: usize,
    closed: bool
}

impl PoolState {
    fn pending(&self) -> usize {
        self.tasks.len() + self.in_flight
    }
}

#[derive(Default)]
struct PoolShared {
    state: Mutex<PoolState>,
    /// Signalled when a task is queued or workers should re-check their state.
    available: Condvar,
    /// Signalled when the queue is empty and nothing is running.
    idle: Condvar
}

impl PoolShared {
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Result of a queued task.
pub struct TaskHandle<T> {
    receiver: flume::Receiver<Result<T, TaskError>>
}

impl<T> TaskHandle<T> {
    /// Blocks until the task finished or was dropped unrun.
    pub fn wait(self) -> Result<T, TaskError> {
        self.receiver.recv().unwrap_or(Err(TaskError::Cancelled))
    }

    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<T, TaskError>> {
        match self.receiver.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(flume::RecvTimeoutError::Timeout) => None,
            Err(flume::RecvTimeoutError::Disconnected) => Some(Err(TaskError::Cancelled))
        }
    }
}

/// Fixed set of threads consuming a FIFO task queue.
///
/// A panicking task is logged and reported through its [`TaskHandle`]; the
/// worker that ran it carries on with the next task.
pub struct WorkerPool {
    name: String,
    shared: Arc<PoolShared>,
    threads: Mutex<Vec<JoinHandle<()>>>
}

impl WorkerPool {
    pub fn new(name: impl Into<String>, num_workers: usize) -> Self {
        let pool = WorkerPool {
            name: name.into(),
            shared: Arc::new(PoolShared::default()),
            threads: Mutex::new(Vec::new())
        };
        pool.start_workers(num_workers);
        pool
    }

    pub fn enqueue<F, T>(&self, task: F) -> TaskHandle<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static
    {
        let (sender, receiver) = flume::bounded(1);
        let pool_name = self.name.clone();

        let wrapped: Task = Box::new(move || {
            let result = catch_unwind(AssertUnwindSafe(task)).map_err(|payload| {
                let message = panic_message(payload.as_ref());
                error!(pool = %pool_name, %message, "Task panicked");
                TaskError::Panicked(message)
            });
            // Nobody waiting on the handle is fine
            let _ = sender.send(result);
        });

        let mut state = self.shared.lock();
        if state.closed {
            drop(state);
            return TaskHandle { receiver };
        }
        state.tasks.push_back(wrapped);
        drop(state);

        self.shared.available.notify_one();
        TaskHandle { receiver }
    }

    /// Tasks queued plus tasks currently running.
    pub fn pending_count(&self) -> usize {
        self.shared.lock().pending()
    }

    pub fn num_workers(&self) -> usize {
        self.shared.lock().target_workers
    }

    /// Blocks until the queue is empty and no task is running.
    pub fn drain(&self) {
        let mut state = self.shared.lock();
        while state.pending() > 0 && state.live_workers > 0 {
            state = self.shared.idle.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
    }

    pub fn start_workers(&self, count: usize) {
        let mut threads = self.threads.lock().unwrap_or_else(PoisonError::into_inner);
        threads.retain(|t| !t.is_finished());

        {
            let mut state = self.shared.lock();
            if state.closed {
                return;
            }
            state.target_workers += count;
            state.live_workers += count;
        }

        for _ in 0..count {
            let shared = Arc::clone(&self.shared);
            let name = self.name.clone();
            let spawned = thread::Builder::new()
                .name(format!("{}-worker", self.name))
                .spawn(move || worker_loop(shared, name));

            match spawned {
                Ok(handle) => threads.push(handle),
                Err(e) => {
                    error!(pool = %self.name, error = %e, "Failed to spawn worker");
                    let mut state = self.shared.lock();
                    state.target_workers -= 1;
                    state.live_workers -= 1;
                }
            }
        }
    }

    /// Lowers the worker count. Surplus workers exit once they are between tasks.
    pub fn stop_workers(&self, count: usize) {
        {
            let mut state = self.shared.lock();
            state.target_workers = state.target_workers.saturating_sub(count);
        }
        self.shared.available.notify_all();
    }

    /// Closes the pool, drops queued tasks, and joins every worker after its
    /// current task.
    pub fn shutdown(&self) {
        let discarded = {
            let mut state = self.shared.lock();
            state.closed = true;
            std::mem::take(&mut state.tasks)
        };

        if !discarded.is_empty() {
            debug!(pool = %self.name, discarded = discarded.len(), "Discarding queued tasks on shutdown");
        }
        drop(discarded);

        self.shared.available.notify_all();
        self.shared.idle.notify_all();

        let threads = std::mem::take(&mut *self.threads.lock().unwrap_or_else(PoisonError::into_inner));
        for thread in threads {
            if thread.join().is_err() {
                error!(pool = %self.name, "Worker thread panicked");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(shared: Arc<PoolShared>, pool_name: String) {
    loop {
        let task = {
            let mut state = shared.lock();
            loop {
                if state.closed || state.live_workers > state.target_workers {
                    state.live_workers -= 1;
                    drop(state);
                    shared.idle.notify_all();
                    debug!(pool = %pool_name, "Worker exiting");
                    return;
                }

                if let Some(task) = state.tasks.pop_front() {
                    state.in_flight += 1;
                    break task;
                }

                state = shared.available.wait(state).unwrap_or_else(PoisonError::into_inner);
            }
        };

        task();

        let mut state = shared.lock();
        state.in_flight -= 1;
        if state.pending() == 0 {
            shared.idle.notify_all();
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
