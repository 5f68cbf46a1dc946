use super::Performance;
use crate::model::{beatmap::Beatmap, mods::Mods, score::ScoreStats, structures::difficulty_attribute::DifficultyAttribute};

pub fn calculate(score: &ScoreStats, beatmap: &Beatmap) -> Performance {
    let accuracy = accuracy(score);
    let mods = score.mods;
    let attr = |attribute| beatmap.attribute(mods, attribute);
    let total_hits = total_hits(score);

    let score_multiplier = attr(DifficultyAttribute::ScoreMultiplier);
    let (difficulty_value, scaled_score) = if score_multiplier <= 0.0 {
        (0.0, 0.0)
    } else {
        // Bring scores of easier key mods onto the same scale, truncated like the stored multiplier
        let scaled_score = f64::from(score.score) * (1.0 / score_multiplier).trunc();

        let mut value = (5.0 * (attr(DifficultyAttribute::Strain) / 0.2).max(1.0) - 4.0).powf(2.2) / 135.0;
        value *= 1.0 + 0.1 * (total_hits / 1500.0).min(1.0);
        value *= score_scaling(scaled_score);
        (value, scaled_score)
    };

    let hit_window_300 = attr(DifficultyAttribute::HitWindow300);
    let accuracy_value = if hit_window_300 <= 0.0 {
        0.0
    } else {
        (0.2 - (hit_window_300 - 34.0) * 0.006667).max(0.0)
            * difficulty_value
            * ((scaled_score - 960_000.0).max(0.0) / 40_000.0).powf(1.1)
    };

    let mut multiplier = 0.8;
    if mods.contains(Mods::NO_FAIL) {
        multiplier *= 0.90;
    }
    if mods.contains(Mods::SPUN_OUT) {
        multiplier *= 0.95;
    }
    if mods.contains(Mods::EASY) {
        multiplier *= 0.50;
    }

    let value = (difficulty_value.powf(1.1) + accuracy_value.powf(1.1)).powf(1.0 / 1.1) * multiplier;

    Performance {
        value: value.max(0.0),
        accuracy
    }
}

/// Piecewise credit for the raw score, nothing at or below 500k.
fn score_scaling(score: f64) -> f64 {
    if score <= 500_000.0 {
        0.0
    } else if score <= 600_000.0 {
        (score - 500_000.0) / 100_000.0 * 0.3
    } else if score <= 700_000.0 {
        0.3 + (score - 600_000.0) / 100_000.0 * 0.25
    } else if score <= 800_000.0 {
        0.55 + (score - 700_000.0) / 100_000.0 * 0.20
    } else if score <= 900_000.0 {
        0.75 + (score - 800_000.0) / 100_000.0 * 0.15
    } else {
        0.90 + (score - 900_000.0) / 100_000.0 * 0.1
    }
}

pub fn accuracy(score: &ScoreStats) -> f64 {
    let total_hits = total_hits(score);
    if total_hits == 0.0 {
        return 0.0;
    }

    let weighted = f64::from(score.count_50) * 50.0
        + f64::from(score.count_100) * 100.0
        + f64::from(score.count_katu) * 200.0
        + (f64::from(score.count_300) + f64::from(score.count_geki)) * 300.0;
    (weighted / (total_hits * 300.0)).clamp(0.0, 1.0)
}

fn total_hits(score: &ScoreStats) -> f64 {
    [score.count_50, score.count_100, score.count_300, score.count_miss, score.count_geki, score.count_katu]
        .into_iter()
        .map(f64::from)
        .sum()
}
