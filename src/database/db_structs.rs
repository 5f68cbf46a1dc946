use chrono::NaiveDateTime;
use serde::Serialize;

/// One row of `osu_scores{suffix}_high` as read for recomputation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreRow {
    pub score_id: i64,
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
    pub mods: i32,
    /// Stored performance value, `None` until first processed
    pub pp: Option<f64>
}

/// A score found by the new-score poll.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewScore {
    pub score_id: i64,
    pub player_id: i64,
    pub pp: Option<f64>
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreOwner {
    pub player_id: i64,
    pub mods: i32
}

/// One attribute of one (map, mods) pair, joined with the map's metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct DifficultyRow {
    pub map_id: i32,
    pub num_circles: Option<i32>,
    pub num_sliders: Option<i32>,
    pub num_spinners: Option<i32>,
    pub play_mode: i32,
    pub approved: i32,
    pub score_version: i32,
    pub mods: i32,
    pub attribute_id: i32,
    pub value: f64
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApprovedMap {
    pub map_id: i32,
    pub approved_date: NaiveDateTime
}

/// Which maps a difficulty query covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapRange {
    Single(i32),
    /// Half-open `[start, end)`
    Range(i32, i32)
}

impl MapRange {
    pub fn contains(&self, map_id: i32) -> bool {
        match *self {
            MapRange::Single(id) => id == map_id,
            MapRange::Range(start, end) => start <= map_id && map_id < end
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MapIdBounds {
    pub max_id: i32,
    pub count: i64
}
