use super::Performance;
use crate::model::{
    beatmap::Beatmap,
    mods::Mods,
    score::ScoreStats,
    structures::{difficulty_attribute::DifficultyAttribute, game_mode::GameMode}
};

pub fn calculate(score: &ScoreStats, beatmap: &Beatmap) -> Performance {
    let accuracy = accuracy(score);
    let total_hits = total_hits(score);
    if total_hits == 0.0 {
        return Performance { value: 0.0, accuracy };
    }

    let successful_hits = f64::from(score.count_300) + f64::from(score.count_100) + f64::from(score.count_50);

    // Short maps are punished harder per miss
    let effective_miss_count = if successful_hits > 0.0 {
        (1000.0 / successful_hits).max(1.0) * f64::from(score.count_miss)
    } else {
        0.0
    };

    let mods = score.mods;
    let attr = |attribute| beatmap.attribute(mods, attribute);
    let native_map = beatmap.play_mode == GameMode::Taiko;

    let strain = attr(DifficultyAttribute::Strain);
    let mut difficulty_value = (5.0 * (strain / 0.115).max(1.0) - 4.0).powf(2.25) / 1150.0;
    let length_bonus = 1.0 + 0.1 * (total_hits / 1500.0).min(1.0);
    difficulty_value *= length_bonus;
    difficulty_value *= 0.986_f64.powf(effective_miss_count);

    if mods.contains(Mods::EASY) {
        difficulty_value *= 0.985;
    }
    if mods.contains(Mods::HIDDEN) && native_map {
        difficulty_value *= 1.025;
    }
    if mods.contains(Mods::HARD_ROCK) {
        difficulty_value *= 1.050;
    }
    if mods.contains(Mods::FLASHLIGHT) {
        difficulty_value *= 1.050 * length_bonus;
    }
    difficulty_value *= accuracy.powi(2);

    let hit_window_300 = attr(DifficultyAttribute::HitWindow300);
    let accuracy_value = if hit_window_300 <= 0.0 {
        0.0
    } else {
        let accuracy_length_bonus = (total_hits / 1500.0).powf(0.3).min(1.15);
        let mut value =
            (60.0 / hit_window_300).powf(1.1) * accuracy.powi(8) * strain.powf(0.4) * 27.0 * accuracy_length_bonus;

        if mods.contains(Mods::HIDDEN | Mods::FLASHLIGHT) && native_map {
            value *= (1.1 * accuracy_length_bonus).max(1.0);
        }
        value
    };

    let mut multiplier = 1.13;
    if mods.contains(Mods::HIDDEN) {
        multiplier *= 1.075;
    }
    if mods.contains(Mods::EASY) {
        multiplier *= 0.975;
    }

    let value = (difficulty_value.powf(1.1) + accuracy_value.powf(1.1)).powf(1.0 / 1.1) * multiplier;

    Performance {
        value: value.max(0.0),
        accuracy
    }
}

pub fn accuracy(score: &ScoreStats) -> f64 {
    let total_hits = total_hits(score);
    if total_hits == 0.0 {
        return 0.0;
    }

    let weighted = f64::from(score.count_100) * 150.0 + f64::from(score.count_300) * 300.0;
    (weighted / (total_hits * 300.0)).clamp(0.0, 1.0)
}

fn total_hits(score: &ScoreStats) -> f64 {
    f64::from(score.count_300) + f64::from(score.count_100) + f64::from(score.count_50) + f64::from(score.count_miss)
}
