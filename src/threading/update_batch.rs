use crate::{database::connection::Connection, threading::active::ActiveError};
use std::{
    mem,
    sync::{Arc, Mutex, MutexGuard, PoisonError}
};
use tracing::error;

/// Collects statements and hands them to a connection's background writer
/// once more than `threshold` bytes have piled up.
///
/// A threshold of 0 sends every statement as soon as it is appended.
/// Whatever is left when the batch is dropped gets sent as well.
pub struct UpdateBatch {
    connection: Arc<Connection>,
    threshold: usize,
    buffer: Mutex<String>
}

impl UpdateBatch {
    pub fn new(connection: Arc<Connection>, threshold: usize) -> Self {
        UpdateBatch {
            connection,
            threshold,
            buffer: Mutex::new(String::new())
        }
    }

    pub fn append(&self, statement: &str) -> Result<(), ActiveError> {
        let mut buffer = self.lock();
        buffer.push_str(statement);

        if buffer.len() > self.threshold {
            self.send(&mut buffer)?;
        }

        Ok(())
    }

    /// Appends several statements without another producer interleaving.
    pub fn append_all<'a>(&self, statements: impl IntoIterator<Item = &'a str>) -> Result<(), ActiveError> {
        let mut buffer = self.lock();
        for statement in statements {
            buffer.push_str(statement);

            if buffer.len() > self.threshold {
                self.send(&mut buffer)?;
            }
        }

        Ok(())
    }

    pub fn flush(&self) -> Result<(), ActiveError> {
        let mut buffer = self.lock();
        self.send(&mut buffer)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    fn lock(&self) -> MutexGuard<'_, String> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn send(&self, buffer: &mut String) -> Result<(), ActiveError> {
        if buffer.is_empty() {
            return Ok(());
        }

        self.connection.execute_background(mem::take(buffer))
    }
}

impl Drop for UpdateBatch {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            error!(error = %e, "Failed to flush remaining statements");
        }
    }
}
