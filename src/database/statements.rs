//! SQL text staged through update batches and background writers.
//!
//! Values are formatted into the statement since batches are sent as one
//! multi-statement string.

use crate::model::{
    constants::PLAYER_RATING_EPSILON,
    structures::game_mode::GameMode
};

pub fn score_update(mode: GameMode, score_id: i64, value: f64) -> String {
    format!(
        "UPDATE osu_scores{suffix}_high SET pp = {value} WHERE score_id = {score_id};\
         UPDATE score_process_queue SET status = 1 WHERE mode = {mode} AND score_id = {score_id};",
        suffix = mode.suffix(),
        mode = mode as u8
    )
}

/// Writes a player's rating and accuracy. Players who have not played for
/// three months, or who carry warnings, are written with a rating of zero.
/// Rows whose stored rating is within the epsilon are left untouched.
pub fn player_rating_update(
    mode: GameMode,
    rating_column: &str,
    metadata_table: &str,
    player_id: i64,
    value: f64,
    accuracy: f64
) -> String {
    format!(
        "UPDATE osu_user_stats{suffix} SET \"{rating_column}\" = CASE \
         WHEN last_played < NOW() - INTERVAL '3 months' \
         OR COALESCE((SELECT user_warnings FROM \"{metadata_table}\" WHERE user_id = {player_id}), 0) > 0 THEN 0 \
         ELSE {value} END, accuracy_new = {accuracy} \
         WHERE user_id = {player_id} AND ABS(\"{rating_column}\" - {value}) > {PLAYER_RATING_EPSILON};",
        suffix = mode.suffix()
    )
}

pub fn notable_event_insert(mode: GameMode, player_id: i64, map_id: i32, rating_change: f64) -> String {
    format!(
        "INSERT INTO osu_user_performance_change (user_id, mode, beatmap_id, performance_change, rank) \
         VALUES ({player_id}, {mode}, {map_id}, {rating_change}, NULL);",
        mode = mode as u8
    )
}

pub fn store_count(key: &str, value: i64) -> String {
    format!(
        "INSERT INTO osu_counts (name, count) VALUES ('{key}', {value}) \
         ON CONFLICT (name) DO UPDATE SET count = EXCLUDED.count;"
    )
}
