use super::beatmap::Beatmap;
use std::{
    collections::{hash_map::Entry, HashMap},
    sync::{PoisonError, RwLock, RwLockReadGuard}
};

/// Map id to cached difficulty, shared by every thread of a processor.
///
/// A single lock guards the whole map. Readers never block each other, a
/// writer excludes everyone for the duration of one merge. Lookups never go
/// to the store on a miss; callers fetch with the lock released and then
/// [`DifficultyCache::upsert`] the result.
#[derive(Debug, Default)]
pub struct DifficultyCache {
    maps: RwLock<HashMap<i32, Beatmap>>
}

/// Read access held across several lookups.
pub struct CacheReadGuard<'a> {
    maps: RwLockReadGuard<'a, HashMap<i32, Beatmap>>
}

impl CacheReadGuard<'_> {
    pub fn get(&self, map_id: i32) -> Option<&Beatmap> {
        self.maps.get(&map_id)
    }

    pub fn contains(&self, map_id: i32) -> bool {
        self.maps.contains_key(&map_id)
    }
}

impl DifficultyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self) -> CacheReadGuard<'_> {
        CacheReadGuard {
            maps: self.maps.read().unwrap_or_else(PoisonError::into_inner)
        }
    }

    pub fn get(&self, map_id: i32) -> Option<Beatmap> {
        self.read().get(map_id).cloned()
    }

    pub fn contains(&self, map_id: i32) -> bool {
        self.read().contains(map_id)
    }

    pub fn len(&self) -> usize {
        self.read().maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Inserts the map or merges its attribute vectors into the cached one.
    pub fn upsert(&self, beatmap: Beatmap) {
        self.upsert_many(std::iter::once(beatmap));
    }

    /// Merges a whole query result under one write lock.
    pub fn upsert_many(&self, beatmaps: impl IntoIterator<Item = Beatmap>) {
        let mut maps = self.maps.write().unwrap_or_else(PoisonError::into_inner);
        for beatmap in beatmaps {
            match maps.entry(beatmap.id) {
                Entry::Occupied(mut cached) => cached.get_mut().merge_from(beatmap),
                Entry::Vacant(slot) => {
                    slot.insert(beatmap);
                }
            }
        }
    }
}
