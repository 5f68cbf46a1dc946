use std::{
    fmt::Display,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, PoisonError
    },
    thread::{self, JoinHandle},
    time::Duration
};
use thiserror::Error;
use tracing::{debug, error, warn};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ActiveError {
    #[error("background writer '{name}' stopped after a failed job: {reason}")]
    Terminated { name: String, reason: String },

    #[error("background writer '{0}' is shut down")]
    Closed(String),

    #[error("failed to spawn background writer '{name}': {reason}")]
    Spawn { name: String, reason: String }
}

type Job = Box<dyn FnOnce() -> Result<(), String> + Send + 'static>;

struct Shared {
    name: String,
    pending: AtomicUsize,
    failure: Mutex<Option<ActiveError>>
}

impl Shared {
    fn failure(&self) -> Option<ActiveError> {
        self.failure.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// Runs jobs one at a time, in submission order, on a dedicated thread.
///
/// The first job that fails (or panics) stops the thread. From then on every
/// call to [`ActiveWriter::send`] returns that failure instead of queueing.
/// Dropping the writer runs whatever is still queued and joins the thread.
pub struct ActiveWriter {
    sender: Option<flume::Sender<Job>>,
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>
}

impl ActiveWriter {
    pub fn new(name: impl Into<String>) -> Result<Self, ActiveError> {
        let name = name.into();
        let (sender, receiver) = flume::unbounded::<Job>();
        let shared = Arc::new(Shared {
            name: name.clone(),
            pending: AtomicUsize::new(0),
            failure: Mutex::new(None)
        });

        let worker_shared = Arc::clone(&shared);
        let thread = thread::Builder::new()
            .name(name.clone())
            .spawn(move || run(receiver, worker_shared))
            .map_err(|e| ActiveError::Spawn {
                name,
                reason: e.to_string()
            })?;

        Ok(ActiveWriter {
            sender: Some(sender),
            shared,
            thread: Some(thread)
        })
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Jobs queued or currently running.
    pub fn pending(&self) -> usize {
        self.shared.pending.load(Ordering::SeqCst)
    }

    pub fn failure(&self) -> Option<ActiveError> {
        self.shared.failure()
    }

    pub fn send<F, E>(&self, job: F) -> Result<(), ActiveError>
    where
        F: FnOnce() -> Result<(), E> + Send + 'static,
        E: Display
    {
        // Held while queueing so a dying worker cannot slip in between
        let failure = self.shared.failure.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(failure) = failure.as_ref() {
            return Err(failure.clone());
        }

        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| ActiveError::Closed(self.shared.name.clone()))?;

        self.shared.pending.fetch_add(1, Ordering::SeqCst);
        let boxed: Job = Box::new(move || job().map_err(|e| e.to_string()));
        if sender.send(boxed).is_err() {
            self.shared.pending.fetch_sub(1, Ordering::SeqCst);
            return Err(ActiveError::Closed(self.shared.name.clone()));
        }

        Ok(())
    }

    /// Like [`ActiveWriter::send`], but first sleeps in `backoff` steps while
    /// more than `max_pending` jobs are outstanding.
    pub fn send_throttled<F, E>(&self, max_pending: usize, backoff: Duration, job: F) -> Result<(), ActiveError>
    where
        F: FnOnce() -> Result<(), E> + Send + 'static,
        E: Display
    {
        while self.pending() > max_pending {
            if let Some(failure) = self.failure() {
                return Err(failure);
            }
            thread::sleep(backoff);
        }

        self.send(job)
    }

    /// Blocks until every job sent so far has run.
    pub fn wait_idle(&self, poll: Duration) -> Result<(), ActiveError> {
        while self.pending() > 0 {
            if let Some(failure) = self.failure() {
                return Err(failure);
            }
            thread::sleep(poll);
        }

        self.failure().map_or(Ok(()), Err)
    }
}

impl Drop for ActiveWriter {
    fn drop(&mut self) {
        // Closing the channel lets the worker finish the queue and exit
        drop(self.sender.take());

        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!(writer = %self.shared.name, "Background writer thread panicked during shutdown");
            }
        }

        if let Some(failure) = self.failure() {
            warn!(writer = %self.shared.name, %failure, "Background writer was dropped after failing");
        }
    }
}

fn run(receiver: flume::Receiver<Job>, shared: Arc<Shared>) {
    debug!(writer = %shared.name, "Background writer started");

    while let Ok(job) = receiver.recv() {
        let outcome = catch_unwind(AssertUnwindSafe(job));
        let reason = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(reason)) => Some(reason),
            Err(_) => Some("job panicked".to_string())
        };

        let Some(reason) = reason else {
            shared.pending.fetch_sub(1, Ordering::SeqCst);
            continue;
        };

        error!(writer = %shared.name, %reason, "Background job failed, stopping writer");

        let mut failure = shared.failure.lock().unwrap_or_else(PoisonError::into_inner);
        *failure = Some(ActiveError::Terminated {
            name: shared.name.clone(),
            reason
        });

        let discarded = receiver.drain().count();
        if discarded > 0 {
            warn!(writer = %shared.name, discarded, "Discarded queued jobs of a failed writer");
        }
        shared.pending.store(0, Ordering::SeqCst);
        return;
    }

    debug!(writer = %shared.name, "Background writer stopped");
}

#[cfg(test)]
mod tests {
    use super::{ActiveError, ActiveWriter};
    use std::{
        sync::{Arc, Mutex},
        thread,
        time::Duration
    };

    #[test]
    fn test_jobs_run_in_submission_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        {
            let writer = ActiveWriter::new("order").unwrap();
            for i in 0..200 {
                let log = Arc::clone(&log);
                writer
                    .send(move || {
                        log.lock().unwrap().push(i);
                        Ok::<(), String>(())
                    })
                    .unwrap();
            }
        }

        assert_eq!(*log.lock().unwrap(), (0..200).collect::<Vec<_>>());
    }

    #[test]
    fn test_failure_is_returned_on_every_later_send() {
        let writer = ActiveWriter::new("failing").unwrap();
        writer.send(|| Err::<(), _>("connection reset")).unwrap();

        let first = writer.wait_idle(Duration::from_millis(1));
        assert!(matches!(first, Err(ActiveError::Terminated { ref reason, .. }) if reason == "connection reset"));

        for _ in 0..3 {
            let again = writer.send(|| Ok::<(), String>(()));
            assert_eq!(again, first.clone());
        }
    }

    #[test]
    fn test_panicking_job_terminates_writer() {
        let writer = ActiveWriter::new("panicking").unwrap();
        writer.send(|| -> Result<(), String> { panic!("boom") }).unwrap();

        assert!(writer.wait_idle(Duration::from_millis(1)).is_err());
        assert!(matches!(writer.send(|| Ok::<(), String>(())), Err(ActiveError::Terminated { .. })));
    }

    #[test]
    fn test_drop_drains_queue() {
        let counter = Arc::new(Mutex::new(0));
        {
            let writer = ActiveWriter::new("drain").unwrap();
            for _ in 0..50 {
                let counter = Arc::clone(&counter);
                writer
                    .send(move || {
                        thread::sleep(Duration::from_micros(100));
                        *counter.lock().unwrap() += 1;
                        Ok::<(), String>(())
                    })
                    .unwrap();
            }
        }

        assert_eq!(*counter.lock().unwrap(), 50);
    }

    #[test]
    fn test_throttled_send_stalls_until_backlog_shrinks() {
        let writer = Arc::new(ActiveWriter::new("throttled").unwrap());
        let (gate_tx, gate_rx) = flume::unbounded::<()>();
        let max_pending = 5;

        // Fill the writer past its ceiling with jobs that wait for the gate
        for _ in 0..=max_pending {
            let gate_rx = gate_rx.clone();
            writer
                .send(move || gate_rx.recv().map_err(|e| e.to_string()))
                .unwrap();
        }
        assert_eq!(writer.pending(), max_pending + 1);

        let (done_tx, done_rx) = flume::bounded::<()>(1);
        let producer = {
            let writer = Arc::clone(&writer);
            thread::spawn(move || {
                writer
                    .send_throttled(max_pending, Duration::from_millis(1), || Ok::<(), String>(()))
                    .unwrap();
                done_tx.send(()).unwrap();
            })
        };

        // Still over the ceiling, so the producer must be waiting
        assert!(done_rx.recv_timeout(Duration::from_millis(100)).is_err());

        for _ in 0..=max_pending {
            gate_tx.send(()).unwrap();
        }

        assert!(done_rx.recv_timeout(Duration::from_secs(5)).is_ok());
        producer.join().unwrap();
        writer.wait_idle(Duration::from_millis(1)).unwrap();
        assert_eq!(writer.pending(), 0);
    }
}
