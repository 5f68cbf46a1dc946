use super::Performance;
use crate::model::{
    beatmap::Beatmap,
    mods::Mods,
    score::ScoreStats,
    structures::{difficulty_attribute::DifficultyAttribute, score_version::ScoreVersion}
};

const PERFORMANCE_BASE_MULTIPLIER: f64 = 1.14;

pub fn calculate(score: &ScoreStats, beatmap: &Beatmap) -> Performance {
    OsuPerformanceInner::new(score, beatmap).calculate()
}

pub fn accuracy(score: &ScoreStats) -> f64 {
    let total_hits = total_hits(score);
    if total_hits == 0.0 {
        return 0.0;
    }

    let weighted =
        f64::from(score.count_50) * 50.0 + f64::from(score.count_100) * 100.0 + f64::from(score.count_300) * 300.0;
    (weighted / (total_hits * 300.0)).clamp(0.0, 1.0)
}

fn total_hits(score: &ScoreStats) -> f64 {
    f64::from(score.count_300) + f64::from(score.count_100) + f64::from(score.count_50) + f64::from(score.count_miss)
}

struct OsuPerformanceInner<'a> {
    score: &'a ScoreStats,
    beatmap: &'a Beatmap,
    mods: Mods,
    total_hits: f64,
    accuracy: f64,
    effective_miss_count: f64
}

impl<'a> OsuPerformanceInner<'a> {
    fn new(score: &'a ScoreStats, beatmap: &'a Beatmap) -> Self {
        let mut inner = OsuPerformanceInner {
            score,
            beatmap,
            mods: score.mods,
            total_hits: total_hits(score),
            accuracy: accuracy(score),
            effective_miss_count: 0.0
        };
        inner.effective_miss_count = inner.compute_effective_miss_count();
        inner
    }

    fn attr(&self, attribute: DifficultyAttribute) -> f64 {
        self.beatmap.attribute(self.mods, attribute)
    }

    fn calculate(self) -> Performance {
        if self.total_hits == 0.0 {
            return Performance { value: 0.0, accuracy: 0.0 };
        }

        let aim = self.compute_aim_value();
        let speed = self.compute_speed_value();
        let acc = self.compute_accuracy_value();
        let flashlight = self.compute_flashlight_value();

        let mut multiplier = PERFORMANCE_BASE_MULTIPLIER;

        if self.mods.contains(Mods::NO_FAIL) {
            multiplier *= (1.0 - 0.02 * self.effective_miss_count).max(0.9);
        }

        if self.mods.contains(Mods::SPUN_OUT) {
            multiplier *= 1.0 - (f64::from(self.beatmap.num_spinners) / self.total_hits).powf(0.85);
        }

        let value = (aim.powf(1.1) + speed.powf(1.1) + acc.powf(1.1) + flashlight.powf(1.1)).powf(1.0 / 1.1)
            * multiplier;

        Performance {
            value: value.max(0.0),
            accuracy: self.accuracy
        }
    }

    // Guess misses and slider breaks from combo
    fn compute_effective_miss_count(&self) -> f64 {
        let max_combo = self.attr(DifficultyAttribute::MaxCombo);
        let num_sliders = f64::from(self.beatmap.num_sliders);

        let mut combo_based = 0.0;
        if self.beatmap.num_sliders > 0 {
            let full_combo_threshold = max_combo - 0.1 * num_sliders;
            if f64::from(self.score.max_combo) < full_combo_threshold {
                combo_based = full_combo_threshold / f64::from(self.score.max_combo.max(1));
            }
        }

        let possible_breaks =
            f64::from(self.score.count_100) + f64::from(self.score.count_50) + f64::from(self.score.count_miss);
        combo_based.min(possible_breaks).max(f64::from(self.score.count_miss))
    }

    fn length_bonus(&self) -> f64 {
        0.95 + 0.4 * (self.total_hits / 2000.0).min(1.0)
            + if self.total_hits > 2000.0 {
                (self.total_hits / 2000.0).log10() * 0.5
            } else {
                0.0
            }
    }

    fn combo_scaling(&self) -> f64 {
        combo_scaling(self.score.max_combo, self.attr(DifficultyAttribute::MaxCombo))
    }

    fn miss_penalty(&self, exponent: f64) -> f64 {
        0.97 * (1.0 - (self.effective_miss_count / self.total_hits).powf(0.775)).powf(exponent)
    }

    fn compute_aim_value(&self) -> f64 {
        let mut value = (5.0 * (self.attr(DifficultyAttribute::Aim) / 0.0675).max(1.0) - 4.0).powi(3) / 100_000.0;

        let length_bonus = self.length_bonus();
        value *= length_bonus;

        if self.effective_miss_count > 0.0 {
            value *= self.miss_penalty(self.effective_miss_count);
        }

        value *= self.combo_scaling();

        let approach_rate = self.attr(DifficultyAttribute::ApproachRate);
        let approach_rate_factor = if approach_rate > 10.33 {
            0.3 * (approach_rate - 10.33)
        } else if approach_rate < 8.0 {
            0.05 * (8.0 - approach_rate)
        } else {
            0.0
        };
        value *= 1.0 + approach_rate_factor * length_bonus;

        if self.mods.contains(Mods::HIDDEN) {
            value *= 1.0 + 0.04 * (12.0 - approach_rate);
        }

        // Assume 15% of sliders are hard enough to drop their ends
        if self.beatmap.num_sliders > 0 {
            let estimate_difficult_sliders = f64::from(self.beatmap.num_sliders) * 0.15;
            let max_combo = self.attr(DifficultyAttribute::MaxCombo);
            let breaks =
                f64::from(self.score.count_100) + f64::from(self.score.count_50) + f64::from(self.score.count_miss);
            let estimate_slider_ends_dropped = breaks
                .min(max_combo - f64::from(self.score.max_combo))
                .max(0.0)
                .min(estimate_difficult_sliders);
            let slider_factor = self.attr(DifficultyAttribute::SliderFactor);
            let slider_nerf_factor = (1.0 - slider_factor)
                * (1.0 - estimate_slider_ends_dropped / estimate_difficult_sliders).powi(3)
                + slider_factor;
            value *= slider_nerf_factor;
        }

        value *= self.accuracy;
        value *= 0.98 + self.attr(DifficultyAttribute::OverallDifficulty).powi(2) / 2500.0;

        value
    }

    fn compute_speed_value(&self) -> f64 {
        let mut value =
            (5.0 * (self.attr(DifficultyAttribute::Speed) / 0.0675).max(1.0) - 4.0).powi(3) / 100_000.0;

        let length_bonus = self.length_bonus();
        value *= length_bonus;

        if self.effective_miss_count > 0.0 {
            value *= self.miss_penalty(self.effective_miss_count.powf(0.875));
        }

        value *= self.combo_scaling();

        let approach_rate = self.attr(DifficultyAttribute::ApproachRate);
        if approach_rate > 10.33 {
            value *= 1.0 + 0.3 * (approach_rate - 10.33) * length_bonus;
        }

        if self.mods.contains(Mods::HIDDEN) {
            value *= 1.0 + 0.04 * (12.0 - approach_rate);
        }

        // Worst case accuracy over the notes that actually carry speed difficulty
        let speed_note_count = self.attr(DifficultyAttribute::SpeedNoteCount);
        let relevant_accuracy = if speed_note_count == 0.0 {
            0.0
        } else {
            let n300 = f64::from(self.score.count_300);
            let n100 = f64::from(self.score.count_100);
            let n50 = f64::from(self.score.count_50);
            let relevant_total_diff = self.total_hits - speed_note_count;
            let relevant_great = (n300 - relevant_total_diff).max(0.0);
            let relevant_ok = (n100 - (relevant_total_diff - n300).max(0.0)).max(0.0);
            let relevant_meh = (n50 - (relevant_total_diff - n300 - n100).max(0.0)).max(0.0);
            (relevant_great * 6.0 + relevant_ok * 2.0 + relevant_meh) / (speed_note_count * 6.0)
        };

        let od = self.attr(DifficultyAttribute::OverallDifficulty);
        value *= (0.95 + od.powi(2) / 750.0) * ((self.accuracy + relevant_accuracy) / 2.0).powf((14.5 - od.max(8.0)) / 2.0);

        // Punish doubletapping
        let n50 = f64::from(self.score.count_50);
        let allowed_50s = self.total_hits / 500.0;
        value *= 0.99_f64.powf(if n50 < allowed_50s { 0.0 } else { n50 - allowed_50s });

        value
    }

    fn compute_accuracy_value(&self) -> f64 {
        let (better_accuracy, objects_with_accuracy) = match self.beatmap.score_version {
            ScoreVersion::V2 => (self.accuracy, self.total_hits),
            ScoreVersion::V1 => {
                let circles = f64::from(self.beatmap.num_circles);
                let better = if circles > 0.0 {
                    ((f64::from(self.score.count_300) - (self.total_hits - circles)) * 6.0
                        + f64::from(self.score.count_100) * 2.0
                        + f64::from(self.score.count_50))
                        / (circles * 6.0)
                } else {
                    0.0
                };
                (better.max(0.0), circles)
            }
        };

        let mut value = 1.52163_f64.powf(self.attr(DifficultyAttribute::OverallDifficulty))
            * better_accuracy.powi(24)
            * 2.83;

        // Long maps are harder to keep accurate on
        value *= (objects_with_accuracy / 1000.0).powf(0.3).min(1.15);

        if self.mods.contains(Mods::HIDDEN) {
            value *= 1.08;
        }

        if self.mods.contains(Mods::FLASHLIGHT) {
            value *= 1.02;
        }

        value
    }

    fn compute_flashlight_value(&self) -> f64 {
        if !self.mods.contains(Mods::FLASHLIGHT) {
            return 0.0;
        }

        let mut value = self.attr(DifficultyAttribute::Flashlight).powi(2) * 25.0;

        if self.effective_miss_count > 0.0 {
            value *= self.miss_penalty(self.effective_miss_count.powf(0.875));
        }

        value *= self.combo_scaling();

        value *= 0.7
            + 0.1 * (self.total_hits / 200.0).min(1.0)
            + if self.total_hits > 200.0 {
                0.2 * ((self.total_hits - 200.0) / 200.0).min(1.0)
            } else {
                0.0
            };

        value *= 0.5 + self.accuracy / 2.0;
        value *= 0.98 + self.attr(DifficultyAttribute::OverallDifficulty).powi(2) / 2500.0;

        value
    }
}

/// Full credit at the map's max combo and never more.
pub(super) fn combo_scaling(combo: i32, map_max_combo: f64) -> f64 {
    if map_max_combo > 0.0 {
        (f64::from(combo).powf(0.8) / map_max_combo.powf(0.8)).min(1.0)
    } else {
        1.0
    }
}
