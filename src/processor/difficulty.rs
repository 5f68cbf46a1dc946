use crate::{
    database::{
        db_structs::{DifficultyRow, MapRange},
        DbError, Store
    },
    model::{
        beatmap::Beatmap,
        constants::DIFFICULTY_LOAD_STEP,
        difficulty_cache::DifficultyCache,
        mods::Mods,
        structures::{
            difficulty_attribute::DifficultyAttribute, game_mode::GameMode, ranked_status::RankedStatus,
            score_version::ScoreVersion
        }
    },
    threading::worker_pool::WorkerPool,
    utils::progress_utils::progress_bar
};
use itertools::Itertools;
use std::{collections::HashMap, str::FromStr, sync::Arc};
use tracing::{debug, info, warn};

/// Attribute ids of `osu_difficulty_attribs` mapped to the attributes we know.
#[derive(Debug, Clone, Default)]
pub struct AttributeTable {
    by_id: HashMap<i32, DifficultyAttribute>
}

impl AttributeTable {
    /// Names no calculator uses are left out; their rows get ignored.
    pub fn from_names(names: impl IntoIterator<Item = (i32, String)>) -> Self {
        let mut by_id = HashMap::new();
        for (id, name) in names {
            match DifficultyAttribute::from_str(&name) {
                Ok(attribute) => {
                    by_id.insert(id, attribute);
                }
                Err(_) => debug!(id, %name, "Ignoring unknown difficulty attribute")
            }
        }

        AttributeTable { by_id }
    }

    pub fn get(&self, id: i32) -> Option<DifficultyAttribute> {
        self.by_id.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// Groups query rows by map id into complete beatmaps.
pub fn beatmaps_from_rows(rows: &[DifficultyRow], attributes: &AttributeTable) -> Vec<Beatmap> {
    rows.iter()
        .chunk_by(|row| row.map_id)
        .into_iter()
        .map(|(map_id, group)| {
            let mut beatmap = Beatmap::new(map_id);
            for row in group {
                beatmap.ranked_status = RankedStatus::try_from(row.approved).unwrap_or(RankedStatus::Pending);
                beatmap.score_version = ScoreVersion::from_raw(row.score_version);
                beatmap.play_mode = GameMode::try_from(row.play_mode).unwrap_or(GameMode::Osu);
                beatmap.num_circles = row.num_circles.unwrap_or(0);
                beatmap.num_sliders = row.num_sliders.unwrap_or(0);
                beatmap.num_spinners = row.num_spinners.unwrap_or(0);

                if let Some(attribute) = attributes.get(row.attribute_id) {
                    beatmap.set_attribute(Mods::from(row.mods), attribute, row.value);
                }
            }
            beatmap
        })
        .collect()
}

/// Queries one range of maps and merges them into the cache.
/// Returns the number of maps found.
pub fn load_range(
    store: &dyn Store,
    mode: GameMode,
    range: MapRange,
    attributes: &AttributeTable,
    cache: &DifficultyCache
) -> Result<usize, DbError> {
    let mut rows = store.difficulty_rows(mode, range)?;
    rows.sort_by_key(|row| row.map_id);

    // Built before taking the write lock
    let beatmaps = beatmaps_from_rows(&rows, attributes);
    let found = beatmaps.len();
    if found > 0 {
        cache.upsert_many(beatmaps);
    }

    Ok(found)
}

/// Fetches a single map on demand. Returns whether it was found.
pub fn fetch_map(
    store: &dyn Store,
    mode: GameMode,
    map_id: i32,
    attributes: &AttributeTable,
    cache: &DifficultyCache
) -> Result<bool, DbError> {
    let found = load_range(store, mode, MapRange::Single(map_id), attributes, cache)? > 0;
    if found {
        info!(map_id, "Obtained beatmap difficulty");
    } else {
        warn!(map_id, "Couldn't find beatmap");
    }

    Ok(found)
}

/// Loads every accepted map playable in `mode`, split into id ranges spread
/// over `stores` (round-robin) and run on a pool with one worker per store.
pub fn load_all(
    stores: &[Arc<dyn Store>],
    mode: GameMode,
    attributes: &Arc<AttributeTable>,
    cache: &Arc<DifficultyCache>
) -> Result<(), DbError> {
    let Some(first) = stores.first() else {
        return Ok(());
    };

    let bounds = first.map_id_bounds(mode)?;
    info!(max_id = bounds.max_id, count = bounds.count, "Retrieving all beatmap difficulties");

    let bar = Arc::new(progress_bar(bounds.count.max(0) as u64, "beatmaps"));
    let pool = WorkerPool::new("difficulty", stores.len());

    let mut begin = 0;
    let mut index = 0;
    while begin <= bounds.max_id {
        let end = begin.saturating_add(DIFFICULTY_LOAD_STEP).min(bounds.max_id.saturating_add(1));
        let store = Arc::clone(&stores[index]);
        index = (index + 1) % stores.len();

        let attributes = Arc::clone(attributes);
        let cache = Arc::clone(cache);
        let bar = Arc::clone(&bar);
        pool.enqueue(move || {
            match load_range(store.as_ref(), mode, MapRange::Range(begin, end), &attributes, &cache) {
                Ok(found) => bar.inc(found as u64),
                Err(e) => warn!(begin, end, error = %e, "Failed to load beatmap difficulties")
            }
        });

        begin = end;
    }

    pool.drain();
    bar.finish_and_clear();

    info!(count = cache.len(), elapsed = ?bar.elapsed(), "Loaded beatmap difficulties");
    Ok(())
}
