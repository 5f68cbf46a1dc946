use super::mods::Mods;
use crate::database::db_structs::ScoreRow;

/// Hit statistics of one score, normalized so that no count is negative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreStats {
    pub id: i64,
    pub player_id: i64,
    pub map_id: i32,
    pub score: i32,
    pub max_combo: i32,
    pub count_300: i32,
    pub count_100: i32,
    pub count_50: i32,
    pub count_miss: i32,
    pub count_geki: i32,
    pub count_katu: i32,
    pub mods: Mods
}

impl From<&ScoreRow> for ScoreStats {
    fn from(row: &ScoreRow) -> Self {
        ScoreStats {
            id: row.score_id,
            player_id: row.player_id,
            map_id: row.map_id,
            score: row.score.max(0),
            max_combo: row.max_combo.max(0),
            count_300: row.count_300.max(0),
            count_100: row.count_100.max(0),
            count_50: row.count_50.max(0),
            count_miss: row.count_miss.max(0),
            count_geki: row.count_geki.max(0),
            count_katu: row.count_katu.max(0),
            mods: Mods::from(row.mods)
        }
    }
}

/// The part of a computed score that aggregation cares about.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerformanceRecord {
    pub score_id: i64,
    pub map_id: i32,
    pub value: f64,
    pub accuracy: f64
}
