use super::{osu::combo_scaling, Performance};
use crate::model::{beatmap::Beatmap, mods::Mods, score::ScoreStats, structures::difficulty_attribute::DifficultyAttribute};

pub fn calculate(score: &ScoreStats, beatmap: &Beatmap) -> Performance {
    let accuracy = accuracy(score);
    let mods = score.mods;
    let attr = |attribute| beatmap.attribute(mods, attribute);

    // Catch is almost entirely aim
    let mut value = (5.0 * (attr(DifficultyAttribute::Aim) / 0.0049).max(1.0) - 4.0).powi(2) / 100_000.0;

    // Only fruits and drops contribute to combo
    let combo_hits = f64::from(score.count_300) + f64::from(score.count_100) + f64::from(score.count_miss);
    let length_bonus = 0.95
        + 0.3 * (combo_hits / 2500.0).min(1.0)
        + if combo_hits > 2500.0 {
            (combo_hits / 2500.0).log10() * 0.475
        } else {
            0.0
        };
    value *= length_bonus;

    value *= 0.97_f64.powi(score.count_miss);
    value *= combo_scaling(score.max_combo, attr(DifficultyAttribute::MaxCombo));

    let approach_rate = attr(DifficultyAttribute::ApproachRate);
    let mut approach_rate_factor = 1.0;
    if approach_rate > 9.0 {
        approach_rate_factor += 0.1 * (approach_rate - 9.0);
    }
    if approach_rate > 10.0 {
        approach_rate_factor += 0.1 * (approach_rate - 10.0);
    } else if approach_rate < 8.0 {
        approach_rate_factor += 0.025 * (8.0 - approach_rate);
    }
    value *= approach_rate_factor;

    if mods.contains(Mods::HIDDEN) {
        if approach_rate <= 10.0 {
            value *= 1.05 + 0.075 * (10.0 - approach_rate);
        } else {
            value *= 1.01 + 0.04 * (11.0 - approach_rate.min(11.0));
        }
    }

    if mods.contains(Mods::FLASHLIGHT) {
        value *= 1.35 * length_bonus;
    }

    value *= accuracy.powf(5.5);

    if mods.contains(Mods::NO_FAIL) {
        value *= 0.90;
    }

    if mods.contains(Mods::SPUN_OUT) {
        value *= 0.95;
    }

    Performance {
        value: value.max(0.0),
        accuracy
    }
}

/// Fraction of caught fruits, droplets and tiny droplets. Missed tiny
/// droplets are stored in the katu bucket.
pub fn accuracy(score: &ScoreStats) -> f64 {
    let successful = f64::from(score.count_50) + f64::from(score.count_100) + f64::from(score.count_300);
    let total_hits = successful + f64::from(score.count_miss) + f64::from(score.count_katu);
    if total_hits == 0.0 {
        return 0.0;
    }

    (successful / total_hits).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::{accuracy, calculate};
    use crate::{
        model::{mods::Mods, score::ScoreStats},
        utils::test_utils::{generate_catch_beatmap, generate_score_row}
    };
    use approx::assert_abs_diff_eq;

    fn stats(counts: [i32; 6], combo: i32, mods: Mods) -> ScoreStats {
        ScoreStats::from(&generate_score_row(1, 1, 1, combo, counts, mods))
    }

    #[test]
    fn test_missed_droplets_lower_accuracy() {
        let score = stats([800, 100, 90, 0, 0, 10], 900, Mods::NOMOD);
        assert_abs_diff_eq!(accuracy(&score), 0.99, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_hits() {
        let result = calculate(&stats([0; 6], 0, Mods::NOMOD), &generate_catch_beatmap(3));
        assert_eq!(result.accuracy, 0.0);
        assert_eq!(result.value, 0.0);
    }

    #[test]
    fn test_combo_cap() {
        let beatmap = generate_catch_beatmap(3);
        let at_cap = calculate(&stats([900, 50, 50, 0, 0, 0], 950, Mods::NOMOD), &beatmap);
        let above_cap = calculate(&stats([900, 50, 50, 0, 0, 0], 2000, Mods::NOMOD), &beatmap);
        assert_abs_diff_eq!(at_cap.value, above_cap.value, epsilon = 1e-12);
    }

    #[test]
    fn test_miss_lowers_value() {
        let beatmap = generate_catch_beatmap(3);
        let base = calculate(&stats([900, 50, 50, 0, 0, 0], 950, Mods::NOMOD), &beatmap);
        let missed = calculate(&stats([899, 50, 50, 1, 0, 0], 950, Mods::NOMOD), &beatmap);
        assert!(missed.value < base.value);
    }
}
