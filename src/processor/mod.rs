pub mod bulk;
pub mod difficulty;
pub mod monitor;
pub mod player;
pub mod summary;

use crate::{
    config::{ConfigError, ProcessorConfig},
    database::{connection::Connection, statements, Connector, DbError, Store},
    model::{
        constants::{DIFFICULTY_LOAD_THREADS, DRAIN_POLL_INTERVAL_MS},
        difficulty_cache::DifficultyCache,
        structures::game_mode::GameMode
    },
    threading::{active::ActiveError, update_batch::UpdateBatch, worker_pool::TaskError}
};
use difficulty::AttributeTable;
use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc
    },
    time::Duration
};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Writer(#[from] ActiveError),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error("unable to retrieve count '{0}'")]
    UnknownCount(String),

    #[error("missing data: {0}")]
    MissingData(String)
}

/// The connections one thread of work writes and reads through.
pub struct ThreadContext {
    pub connection: Arc<Connection>,
    pub replica: Arc<dyn Store>,
    pub players: UpdateBatch,
    pub scores: UpdateBatch
}

impl ThreadContext {
    pub fn flush(&self) -> Result<(), ActiveError> {
        self.players.flush()?;
        self.scores.flush()
    }

    /// Flushes both batches and waits for the writer to run everything.
    pub fn settle(&self) -> Result<(), ActiveError> {
        self.flush()?;
        self.connection.wait_idle(Duration::from_millis(DRAIN_POLL_INTERVAL_MS))
    }
}

/// Recomputes performance values of one game mode.
///
/// Construction loads the map blacklist, the attribute names and the
/// difficulty of every accepted map. The instance is then driven by one of
/// the run modes in [`monitor`], [`bulk`] and [`summary`].
pub struct Processor {
    mode: GameMode,
    config: ProcessorConfig,
    connector: Arc<dyn Connector>,
    cache: Arc<DifficultyCache>,
    blacklist: HashSet<i32>,
    attributes: Arc<AttributeTable>,
    primary: Arc<Connection>,
    replica: Arc<dyn Store>,
    shutdown: AtomicBool
}

impl Processor {
    pub fn new(mode: GameMode, config: ProcessorConfig, connector: Arc<dyn Connector>) -> Result<Self, ProcessorError> {
        info!(mode = %mode, "Starting pp processor");

        let primary = Arc::new(Connection::new(
            format!("{}-primary", mode.tag()),
            connector.primary()?,
            config.writer.max_pending,
            config.writer_backoff()
        )?);
        let replica = connector.replica()?;

        info!("Retrieving blacklisted beatmaps");
        let blacklist = replica.blacklisted_maps(mode)?.into_iter().collect::<HashSet<_>>();
        info!(count = blacklist.len(), "Retrieved blacklisted beatmaps");

        info!("Retrieving difficulty attribute names");
        let attributes = Arc::new(AttributeTable::from_names(replica.attribute_names()?));
        info!(count = attributes.len(), "Retrieved difficulty attributes");

        let processor = Processor {
            mode,
            config,
            connector,
            cache: Arc::new(DifficultyCache::new()),
            blacklist,
            attributes,
            primary,
            replica,
            shutdown: AtomicBool::new(false)
        };
        processor.load_all_difficulties(DIFFICULTY_LOAD_THREADS)?;

        Ok(processor)
    }

    pub fn mode(&self) -> GameMode {
        self.mode
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<DifficultyCache> {
        &self.cache
    }

    pub fn primary(&self) -> &Arc<Connection> {
        &self.primary
    }

    pub fn replica(&self) -> &Arc<dyn Store> {
        &self.replica
    }

    pub fn is_blacklisted(&self, map_id: i32) -> bool {
        self.blacklist.contains(&map_id)
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    fn load_all_difficulties(&self, threads: usize) -> Result<(), ProcessorError> {
        let stores = (0..threads.max(1))
            .map(|_| self.connector.replica())
            .collect::<Result<Vec<_>, _>>()?;

        difficulty::load_all(&stores, self.mode, &self.attributes, &self.cache)?;
        Ok(())
    }

    /// Fetches one map into the cache. Returns whether it exists.
    pub fn fetch_map(&self, store: &dyn Store, map_id: i32) -> Result<bool, DbError> {
        difficulty::fetch_map(store, self.mode, map_id, &self.attributes, &self.cache)
    }

    /// A fresh primary connection with its own writer, a replica and two
    /// batches flushing at `threshold`.
    pub fn thread_context(&self, name: &str, threshold: usize) -> Result<ThreadContext, ProcessorError> {
        let connection = Arc::new(Connection::new(
            format!("{}-{}", self.mode.tag(), name),
            self.connector.primary()?,
            self.config.writer.max_pending,
            self.config.writer_backoff()
        )?);

        Ok(ThreadContext {
            replica: self.connector.replica()?,
            players: UpdateBatch::new(Arc::clone(&connection), threshold),
            scores: UpdateBatch::new(Arc::clone(&connection), threshold),
            connection
        })
    }

    /// Context sharing the processor's own connections.
    pub fn main_context(&self, threshold: usize) -> ThreadContext {
        ThreadContext {
            connection: Arc::clone(&self.primary),
            replica: Arc::clone(&self.replica),
            players: UpdateBatch::new(Arc::clone(&self.primary), threshold),
            scores: UpdateBatch::new(Arc::clone(&self.primary), threshold)
        }
    }

    pub fn retrieve_count(&self, key: &str) -> Result<i64, ProcessorError> {
        self.primary
            .store()
            .count(key)?
            .ok_or_else(|| ProcessorError::UnknownCount(key.to_string()))
    }

    pub fn store_count(&self, key: &str, value: i64) -> Result<(), ProcessorError> {
        self.primary.execute_background(statements::store_count(key, value))?;
        Ok(())
    }
}
