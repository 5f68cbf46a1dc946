use super::{
    mods::Mods,
    structures::{
        difficulty_attribute::DifficultyAttribute, game_mode::GameMode, ranked_status::RankedStatus,
        score_version::ScoreVersion
    }
};
use std::collections::HashMap;
use strum::EnumCount;

/// One value per [`DifficultyAttribute`], indexed by its discriminant.
pub type AttributeVector = [f64; DifficultyAttribute::COUNT];

/// Cached difficulty information for one map.
///
/// Attribute vectors are keyed by the difficulty-relevant subset of a mod
/// mask. Both [`Beatmap::set_attributes`] and [`Beatmap::attribute`] reduce
/// the mask before touching the map so callers may pass raw score mods.
#[derive(Debug, Clone, PartialEq)]
pub struct Beatmap {
    pub id: i32,
    pub ranked_status: RankedStatus,
    pub score_version: ScoreVersion,
    pub play_mode: GameMode,
    pub num_circles: i32,
    pub num_sliders: i32,
    pub num_spinners: i32,
    difficulty: HashMap<Mods, AttributeVector>
}

impl Beatmap {
    pub fn new(id: i32) -> Self {
        Beatmap {
            id,
            ranked_status: RankedStatus::Pending,
            score_version: ScoreVersion::V1,
            play_mode: GameMode::Osu,
            num_circles: 0,
            num_sliders: 0,
            num_spinners: 0,
            difficulty: HashMap::new()
        }
    }

    /// Returns 0 when the map has no attributes for these mods.
    pub fn attribute(&self, mods: Mods, attribute: DifficultyAttribute) -> f64 {
        self.attributes(mods).map_or(0.0, |values| values[attribute.index()])
    }

    pub fn attributes(&self, mods: Mods) -> Option<&AttributeVector> {
        self.difficulty.get(&mods.difficulty_relevant())
    }

    /// Replaces the whole attribute vector stored for `mods`.
    pub fn set_attributes(&mut self, mods: Mods, values: AttributeVector) {
        self.difficulty.insert(mods.difficulty_relevant(), values);
    }

    /// Sets a single attribute, starting from zeroes when the key is new.
    /// Used while assembling a map from query rows, before it is published.
    pub fn set_attribute(&mut self, mods: Mods, attribute: DifficultyAttribute, value: f64) {
        let values = self
            .difficulty
            .entry(mods.difficulty_relevant())
            .or_insert([0.0; DifficultyAttribute::COUNT]);
        values[attribute.index()] = value;
    }

    pub fn difficulty_keys(&self) -> impl Iterator<Item = &Mods> {
        self.difficulty.keys()
    }

    pub fn num_objects(&self) -> i32 {
        self.num_circles + self.num_sliders + self.num_spinners
    }

    /// Copies metadata and every attribute vector of `other` into `self`.
    /// Keys that `other` does not carry are left untouched.
    pub fn merge_from(&mut self, other: Beatmap) {
        self.ranked_status = other.ranked_status;
        self.score_version = other.score_version;
        self.play_mode = other.play_mode;
        self.num_circles = other.num_circles;
        self.num_sliders = other.num_sliders;
        self.num_spinners = other.num_spinners;
        self.difficulty.extend(other.difficulty);
    }
}
