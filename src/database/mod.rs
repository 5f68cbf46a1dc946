pub mod connection;
pub mod db;
pub mod db_structs;
pub mod statements;

use crate::model::structures::game_mode::GameMode;
use chrono::NaiveDateTime;
use db_structs::{ApprovedMap, DifficultyRow, MapIdBounds, MapRange, NewScore, ScoreOwner, ScoreRow};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("failed to connect to {target}: {reason}")]
    Connect { target: String, reason: String },

    #[error("{what} not found")]
    NotFound { what: String },

    #[error("failed to start database runtime: {0}")]
    Runtime(#[from] std::io::Error)
}

/// Everything the processor reads from or writes to the data store.
///
/// Reads block the calling thread. [`Store::execute`] is only ever called
/// from a connection's background writer.
pub trait Store: Send + Sync {
    /// All high scores of one player.
    fn scores_by_player(&self, mode: GameMode, player_id: i64) -> Result<Vec<ScoreRow>, DbError>;

    /// Scores with an id above `after`, ascending, at most `limit` of them.
    fn scores_after(&self, mode: GameMode, after: i64, limit: i64) -> Result<Vec<NewScore>, DbError>;

    fn score_owner(&self, mode: GameMode, score_id: i64) -> Result<Option<ScoreOwner>, DbError>;

    /// Difficulty rows of accepted maps playable in `mode`.
    fn difficulty_rows(&self, mode: GameMode, range: MapRange) -> Result<Vec<DifficultyRow>, DbError>;

    /// Highest id and number of accepted maps playable in `mode`.
    fn map_id_bounds(&self, mode: GameMode) -> Result<MapIdBounds, DbError>;

    fn latest_approval(&self) -> Result<Option<NaiveDateTime>, DbError>;

    /// Maps whose set was approved strictly after `since`, oldest first.
    fn maps_approved_since(&self, since: NaiveDateTime) -> Result<Vec<ApprovedMap>, DbError>;

    fn blacklisted_maps(&self, mode: GameMode) -> Result<Vec<i32>, DbError>;

    /// `(attrib_id, name)` pairs of `osu_difficulty_attribs`.
    fn attribute_names(&self) -> Result<Vec<(i32, String)>, DbError>;

    /// The rating currently stored for a player in `column`.
    fn stored_rating(&self, mode: GameMode, player_id: i64, column: &str) -> Result<Option<f64>, DbError>;

    /// Reads a named counter from `osu_counts`.
    fn count(&self, key: &str) -> Result<Option<i64>, DbError>;

    fn max_score_id(&self, mode: GameMode) -> Result<Option<i64>, DbError>;

    fn player_ids_after(&self, mode: GameMode, after: i64, limit: i64) -> Result<Vec<i64>, DbError>;

    fn player_count_from(&self, mode: GameMode, from: i64) -> Result<i64, DbError>;

    fn player_id_by_name(&self, table: &str, name: &str) -> Result<Option<i64>, DbError>;

    fn player_name(&self, table: &str, player_id: i64) -> Result<Option<String>, DbError>;

    fn map_name(&self, map_id: i32) -> Result<Option<String>, DbError>;

    /// Runs one or more `;`-separated statements.
    fn execute(&self, sql: &str) -> Result<(), DbError>;
}

/// Opens fresh store connections. Every thread role owns its own.
pub trait Connector: Send + Sync {
    fn primary(&self) -> Result<Arc<dyn Store>, DbError>;

    /// Read-only connection. Falls back to the primary's parameters when no
    /// replica is configured.
    fn replica(&self) -> Result<Arc<dyn Store>, DbError>;
}
