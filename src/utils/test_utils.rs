use crate::{
    database::{
        db_structs::{ApprovedMap, DifficultyRow, MapIdBounds, MapRange, NewScore, ScoreOwner, ScoreRow},
        Connector, DbError, Store
    },
    model::{
        beatmap::Beatmap,
        mods::Mods,
        score::PerformanceRecord,
        structures::{
            difficulty_attribute::DifficultyAttribute, game_mode::GameMode, ranked_status::RankedStatus
        }
    }
};
use chrono::NaiveDateTime;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard, PoisonError}
};
use strum::IntoEnumIterator;

/// Mods every generated map carries attributes for.
const GENERATED_MOD_KEYS: [Mods; 6] = [
    Mods::NOMOD,
    Mods::HARD_ROCK,
    Mods::DOUBLE_TIME,
    Mods::EASY,
    Mods::HALF_TIME,
    Mods::FLASHLIGHT
];

pub fn generate_score_row(
    score_id: i64,
    player_id: i64,
    map_id: i32,
    max_combo: i32,
    counts: [i32; 6],
    mods: Mods
) -> ScoreRow {
    let [count_300, count_100, count_50, count_miss, count_geki, count_katu] = counts;
    ScoreRow {
        score_id,
        player_id,
        map_id,
        score: 1_000_000,
        max_combo,
        count_300,
        count_100,
        count_50,
        count_miss,
        count_geki,
        count_katu,
        mods: mods.bits() as i32,
        pp: None
    }
}

fn generate_beatmap(id: i32, play_mode: GameMode, attributes: &[(DifficultyAttribute, f64)]) -> Beatmap {
    let mut beatmap = Beatmap::new(id);
    beatmap.ranked_status = RankedStatus::Ranked;
    beatmap.play_mode = play_mode;
    beatmap.num_circles = 400;
    beatmap.num_sliders = 90;
    beatmap.num_spinners = 10;

    for mods in GENERATED_MOD_KEYS {
        for (attribute, value) in attributes {
            beatmap.set_attribute(mods, *attribute, *value);
        }
    }

    beatmap
}

/// Standard map with a max combo of 700 and AR 9.3.
pub fn generate_osu_beatmap(id: i32) -> Beatmap {
    generate_beatmap(
        id,
        GameMode::Osu,
        &[
            (DifficultyAttribute::Aim, 3.0),
            (DifficultyAttribute::Speed, 2.8),
            (DifficultyAttribute::OverallDifficulty, 9.0),
            (DifficultyAttribute::ApproachRate, 9.3),
            (DifficultyAttribute::MaxCombo, 700.0),
            (DifficultyAttribute::Strain, 6.0),
            (DifficultyAttribute::Flashlight, 2.0),
            (DifficultyAttribute::SliderFactor, 0.98),
            (DifficultyAttribute::SpeedNoteCount, 250.0)
        ]
    )
}

pub fn generate_taiko_beatmap(id: i32) -> Beatmap {
    generate_beatmap(
        id,
        GameMode::Taiko,
        &[
            (DifficultyAttribute::Strain, 4.0),
            (DifficultyAttribute::HitWindow300, 35.0),
            (DifficultyAttribute::MaxCombo, 1000.0)
        ]
    )
}

/// Catch map with a max combo of 950 and AR 9.
pub fn generate_catch_beatmap(id: i32) -> Beatmap {
    generate_beatmap(
        id,
        GameMode::Catch,
        &[
            (DifficultyAttribute::Aim, 4.0),
            (DifficultyAttribute::ApproachRate, 9.0),
            (DifficultyAttribute::MaxCombo, 950.0)
        ]
    )
}

pub fn generate_mania_beatmap(id: i32) -> Beatmap {
    generate_beatmap(
        id,
        GameMode::Mania,
        &[
            (DifficultyAttribute::Strain, 3.0),
            (DifficultyAttribute::HitWindow300, 40.0),
            (DifficultyAttribute::ScoreMultiplier, 1.0)
        ]
    )
}

pub fn generate_beatmap_for(mode: GameMode, id: i32) -> Beatmap {
    match mode {
        GameMode::Osu => generate_osu_beatmap(id),
        GameMode::Taiko => generate_taiko_beatmap(id),
        GameMode::Catch => generate_catch_beatmap(id),
        GameMode::Mania => generate_mania_beatmap(id)
    }
}

/// `n` records spread over `maps` map ids, from a fixed seed.
pub fn generate_performance_records(n: usize, maps: i32) -> Vec<PerformanceRecord> {
    let mut rng = ChaCha8Rng::seed_from_u64(42);

    (0..n)
        .map(|i| PerformanceRecord {
            score_id: i as i64 + 1,
            map_id: rng.random_range(1..=maps),
            value: rng.random_range(0.0..500.0),
            accuracy: rng.random_range(0.8..=1.0)
        })
        .collect()
}

/// Attribute names as `osu_difficulty_attribs` lists them. Ids start at 1.
pub fn standard_attribute_names() -> Vec<(i32, String)> {
    DifficultyAttribute::iter()
        .map(|a| (attribute_id(a), attribute_name(a).to_string()))
        .collect()
}

pub fn attribute_id(attribute: DifficultyAttribute) -> i32 {
    attribute.index() as i32 + 1
}

fn attribute_name(attribute: DifficultyAttribute) -> &'static str {
    match attribute {
        DifficultyAttribute::Aim => "Aim",
        DifficultyAttribute::Speed => "Speed",
        DifficultyAttribute::OverallDifficulty => "OD",
        DifficultyAttribute::ApproachRate => "AR",
        DifficultyAttribute::MaxCombo => "Max combo",
        DifficultyAttribute::Strain => "Strain",
        DifficultyAttribute::HitWindow300 => "Hit window 300",
        DifficultyAttribute::ScoreMultiplier => "Score multiplier",
        DifficultyAttribute::Flashlight => "Flashlight",
        DifficultyAttribute::SliderFactor => "Slider factor",
        DifficultyAttribute::SpeedNoteCount => "Speed note count"
    }
}

struct MemoryMap {
    /// Mode the difficulty attributes were computed for
    mode: GameMode,
    approved_date: NaiveDateTime,
    filename: String,
    rows: Vec<DifficultyRow>
}

#[derive(Default)]
struct MemoryState {
    maps: BTreeMap<i32, MemoryMap>,
    scores: BTreeMap<(GameMode, i64), ScoreRow>,
    /// Players with a stats row, and their stored rating
    player_stats: BTreeMap<(GameMode, i64), Option<f64>>,
    player_names: HashMap<i64, String>,
    blacklist: HashSet<(GameMode, i32)>,
    attribute_names: Vec<(i32, String)>,
    counts: HashMap<String, i64>,
    executed: Vec<String>,
    fail_pattern: Option<String>,
    failing_maps: HashSet<i32>,
    failing_players: HashSet<i64>
}

/// In-memory [`Store`].
///
/// Reads answer from the seeded rows. Executed statements are recorded as
/// is; apart from `osu_counts` upserts they do not change any seeded row, so
/// a stored score value stays whatever the test seeded.
pub struct MemoryStore {
    state: Mutex<MemoryState>
}

impl Default for MemoryStore {
    fn default() -> Self {
        MemoryStore {
            state: Mutex::new(MemoryState {
                attribute_names: standard_attribute_names(),
                ..MemoryState::default()
            })
        }
    }
}

impl MemoryStore {
    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores every attribute vector of `beatmap` as difficulty rows of `mode`.
    pub fn add_map(&self, mode: GameMode, beatmap: &Beatmap, approved_date: NaiveDateTime) {
        let mut rows = Vec::new();
        for mods in beatmap.difficulty_keys() {
            for attribute in DifficultyAttribute::iter() {
                rows.push(DifficultyRow {
                    map_id: beatmap.id,
                    num_circles: Some(beatmap.num_circles),
                    num_sliders: Some(beatmap.num_sliders),
                    num_spinners: Some(beatmap.num_spinners),
                    play_mode: beatmap.play_mode as i32,
                    approved: beatmap.ranked_status as i32,
                    score_version: beatmap.score_version as i32,
                    mods: mods.bits() as i32,
                    attribute_id: attribute_id(attribute),
                    value: beatmap.attribute(*mods, attribute)
                });
            }
        }

        self.lock().maps.insert(
            beatmap.id,
            MemoryMap {
                mode,
                approved_date,
                filename: format!("Artist - Title (Mapper) [Diff {}].osu", beatmap.id),
                rows
            }
        );
    }

    pub fn add_score(&self, mode: GameMode, row: ScoreRow) {
        self.lock().scores.insert((mode, row.score_id), row);
    }

    pub fn add_player(&self, mode: GameMode, player_id: i64, name: &str, rating: Option<f64>) {
        let mut state = self.lock();
        state.player_stats.insert((mode, player_id), rating);
        state.player_names.insert(player_id, name.to_string());
    }

    pub fn blacklist_map(&self, mode: GameMode, map_id: i32) {
        self.lock().blacklist.insert((mode, map_id));
    }

    pub fn set_count(&self, key: &str, value: i64) {
        self.lock().counts.insert(key.to_string(), value);
    }

    pub fn stored_count(&self, key: &str) -> Option<i64> {
        self.lock().counts.get(key).copied()
    }

    /// Every statement string that executed successfully, in order.
    pub fn executed(&self) -> Vec<String> {
        self.lock().executed.clone()
    }

    /// Occurrences of `pattern` across all executed statements.
    pub fn count_executed(&self, pattern: &str) -> usize {
        self.lock().executed.iter().map(|sql| sql.matches(pattern).count()).sum()
    }

    /// Makes every later execute whose text contains `pattern` fail.
    pub fn fail_executes_containing(&self, pattern: &str) {
        self.lock().fail_pattern = Some(pattern.to_string());
    }

    /// Makes every later difficulty query covering `map_id` fail.
    pub fn fail_difficulty_for(&self, map_id: i32) {
        self.lock().failing_maps.insert(map_id);
    }

    /// Makes every later score query for `player_id` fail.
    pub fn fail_scores_for(&self, player_id: i64) {
        self.lock().failing_players.insert(player_id);
    }

    /// Lets difficulty queries covering `map_id` succeed again.
    pub fn restore_difficulty_for(&self, map_id: i32) {
        self.lock().failing_maps.remove(&map_id);
    }

    fn apply_count_upserts(state: &mut MemoryState, sql: &str) {
        const MARKER: &str = "INSERT INTO osu_counts (name, count) VALUES ('";

        for (start, _) in sql.match_indices(MARKER) {
            let rest = &sql[start + MARKER.len()..];
            let Some((key, rest)) = rest.split_once("', ") else {
                continue;
            };
            let Some((value, _)) = rest.split_once(')') else {
                continue;
            };
            if let Ok(value) = value.trim().parse::<i64>() {
                state.counts.insert(key.to_string(), value);
            }
        }
    }
}

impl Store for MemoryStore {
    fn scores_by_player(&self, mode: GameMode, player_id: i64) -> Result<Vec<ScoreRow>, DbError> {
        let state = self.lock();
        if state.failing_players.contains(&player_id) {
            return Err(DbError::Connect {
                target: "memory".to_string(),
                reason: format!("score query for player {player_id} failed")
            });
        }

        let rows = state
            .scores
            .iter()
            .filter(|((m, _), row)| *m == mode && row.player_id == player_id)
            .map(|(_, row)| row.clone())
            .collect();
        Ok(rows)
    }

    fn scores_after(&self, mode: GameMode, after: i64, limit: i64) -> Result<Vec<NewScore>, DbError> {
        Ok(self
            .lock()
            .scores
            .range((mode, after + 1)..)
            .take_while(|((m, _), _)| *m == mode)
            .take(limit.max(0) as usize)
            .map(|(_, row)| NewScore {
                score_id: row.score_id,
                player_id: row.player_id,
                pp: row.pp
            })
            .collect())
    }

    fn score_owner(&self, mode: GameMode, score_id: i64) -> Result<Option<ScoreOwner>, DbError> {
        Ok(self.lock().scores.get(&(mode, score_id)).map(|row| ScoreOwner {
            player_id: row.player_id,
            mods: row.mods
        }))
    }

    fn difficulty_rows(&self, mode: GameMode, range: MapRange) -> Result<Vec<DifficultyRow>, DbError> {
        let min = RankedStatus::MIN_ACCEPTED as i32;
        let max = RankedStatus::MAX_ACCEPTED as i32;
        let mode_id = mode as i32;

        let state = self.lock();
        if state.failing_maps.iter().any(|id| range.contains(*id)) {
            return Err(DbError::Connect {
                target: "memory".to_string(),
                reason: format!("difficulty query for {range:?} failed")
            });
        }

        let rows = state
            .maps
            .iter()
            .filter(|(id, map)| range.contains(**id) && map.mode == mode)
            .flat_map(|(_, map)| map.rows.iter())
            .filter(|row| (min..=max).contains(&row.approved) && (row.play_mode == 0 || row.play_mode == mode_id))
            .cloned()
            .collect();
        Ok(rows)
    }

    fn map_id_bounds(&self, mode: GameMode) -> Result<MapIdBounds, DbError> {
        let min = RankedStatus::MIN_ACCEPTED as i32;
        let max = RankedStatus::MAX_ACCEPTED as i32;
        let mode_id = mode as i32;
        let state = self.lock();

        let accepted = state
            .maps
            .iter()
            .filter(|(_, map)| {
                map.mode == mode
                    && map
                        .rows
                        .first()
                        .map_or(false, |r| (min..=max).contains(&r.approved) && (r.play_mode == 0 || r.play_mode == mode_id))
            })
            .map(|(id, _)| *id)
            .collect::<Vec<_>>();

        Ok(MapIdBounds {
            max_id: accepted.iter().copied().max().unwrap_or(0),
            count: accepted.len() as i64
        })
    }

    fn latest_approval(&self) -> Result<Option<NaiveDateTime>, DbError> {
        Ok(self.lock().maps.values().map(|m| m.approved_date).max())
    }

    fn maps_approved_since(&self, since: NaiveDateTime) -> Result<Vec<ApprovedMap>, DbError> {
        let mut maps = self
            .lock()
            .maps
            .iter()
            .filter(|(_, m)| m.approved_date > since)
            .map(|(id, m)| ApprovedMap {
                map_id: *id,
                approved_date: m.approved_date
            })
            .collect::<Vec<_>>();
        maps.sort_by_key(|m| m.approved_date);
        Ok(maps)
    }

    fn blacklisted_maps(&self, mode: GameMode) -> Result<Vec<i32>, DbError> {
        Ok(self
            .lock()
            .blacklist
            .iter()
            .filter(|(m, _)| *m == mode)
            .map(|(_, id)| *id)
            .collect())
    }

    fn attribute_names(&self) -> Result<Vec<(i32, String)>, DbError> {
        Ok(self.lock().attribute_names.clone())
    }

    fn stored_rating(&self, mode: GameMode, player_id: i64, _column: &str) -> Result<Option<f64>, DbError> {
        Ok(self.lock().player_stats.get(&(mode, player_id)).copied().flatten())
    }

    fn count(&self, key: &str) -> Result<Option<i64>, DbError> {
        Ok(self.stored_count(key))
    }

    fn max_score_id(&self, mode: GameMode) -> Result<Option<i64>, DbError> {
        Ok(self.lock().scores.keys().filter(|(m, _)| *m == mode).map(|(_, id)| *id).max())
    }

    fn player_ids_after(&self, mode: GameMode, after: i64, limit: i64) -> Result<Vec<i64>, DbError> {
        Ok(self
            .lock()
            .player_stats
            .range((mode, after + 1)..)
            .take_while(|((m, _), _)| *m == mode)
            .take(limit.max(0) as usize)
            .map(|((_, id), _)| *id)
            .collect())
    }

    fn player_count_from(&self, mode: GameMode, from: i64) -> Result<i64, DbError> {
        Ok(self
            .lock()
            .player_stats
            .keys()
            .filter(|(m, id)| *m == mode && *id >= from)
            .count() as i64)
    }

    fn player_id_by_name(&self, _table: &str, name: &str) -> Result<Option<i64>, DbError> {
        Ok(self
            .lock()
            .player_names
            .iter()
            .find(|(_, n)| n.as_str() == name)
            .map(|(id, _)| *id))
    }

    fn player_name(&self, _table: &str, player_id: i64) -> Result<Option<String>, DbError> {
        Ok(self.lock().player_names.get(&player_id).cloned())
    }

    fn map_name(&self, map_id: i32) -> Result<Option<String>, DbError> {
        Ok(self
            .lock()
            .maps
            .get(&map_id)
            .map(|m| m.filename.trim_end_matches(".osu").to_string()))
    }

    fn execute(&self, sql: &str) -> Result<(), DbError> {
        let mut state = self.lock();
        if let Some(pattern) = &state.fail_pattern {
            if sql.contains(pattern.as_str()) {
                return Err(DbError::Connect {
                    target: "memory".to_string(),
                    reason: format!("rejected statement matching '{pattern}'")
                });
            }
        }

        Self::apply_count_upserts(&mut state, sql);
        state.executed.push(sql.to_string());
        Ok(())
    }
}

/// Hands out the same [`MemoryStore`] for every connection.
#[derive(Clone, Default)]
pub struct MemoryConnector {
    pub store: Arc<MemoryStore>
}

impl MemoryConnector {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        MemoryConnector { store }
    }
}

impl Connector for MemoryConnector {
    fn primary(&self) -> Result<Arc<dyn Store>, DbError> {
        Ok(self.store.clone())
    }

    fn replica(&self) -> Result<Arc<dyn Store>, DbError> {
        Ok(self.store.clone())
    }
}
