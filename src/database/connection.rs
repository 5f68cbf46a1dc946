use super::{DbError, Store};
use crate::threading::active::{ActiveError, ActiveWriter};
use std::{sync::Arc, time::Duration};
use tracing::trace;

/// A store connection paired with the background writer that owns its
/// asynchronous statements.
///
/// Reads go straight to the store and block. Statements handed to
/// [`Connection::execute_background`] run on the writer thread in the order
/// they were submitted.
pub struct Connection {
    store: Arc<dyn Store>,
    writer: ActiveWriter,
    max_pending: usize,
    backoff: Duration
}

impl Connection {
    pub fn new(
        name: impl Into<String>,
        store: Arc<dyn Store>,
        max_pending: usize,
        backoff: Duration
    ) -> Result<Self, ActiveError> {
        Ok(Connection {
            store,
            writer: ActiveWriter::new(name)?,
            max_pending,
            backoff
        })
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    /// Queues `sql` without waiting for it. Stalls the caller while the
    /// writer has more than `max_pending` statements outstanding.
    pub fn execute_background(&self, sql: String) -> Result<(), ActiveError> {
        let store = Arc::clone(&self.store);
        self.writer.send_throttled(self.max_pending, self.backoff, move || {
            trace!(len = sql.len(), "Executing background statement");
            store.execute(&sql)
        })
    }

    /// Background statements queued or running.
    pub fn pending(&self) -> usize {
        self.writer.pending()
    }

    pub fn failure(&self) -> Option<ActiveError> {
        self.writer.failure()
    }

    pub fn wait_idle(&self, poll: Duration) -> Result<(), ActiveError> {
        self.writer.wait_idle(poll)
    }
}

impl From<ActiveError> for DbError {
    fn from(e: ActiveError) -> Self {
        DbError::Connect {
            target: "background writer".to_string(),
            reason: e.to_string()
        }
    }
}
