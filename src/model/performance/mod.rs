pub mod catch;
pub mod mania;
pub mod osu;
pub mod taiko;

use super::{beatmap::Beatmap, score::ScoreStats, structures::game_mode::GameMode};

/// Output of a calculator: performance value and accuracy in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Performance {
    pub value: f64,
    pub accuracy: f64
}

/// Computes the performance of one score against the difficulty the map has
/// for the score's mods.
///
/// Scores set with relax, autopilot or autoplay are worth nothing. That check
/// runs before any variant specific code.
pub fn calculate(mode: GameMode, score: &ScoreStats, beatmap: &Beatmap) -> Performance {
    if score.mods.is_unranked_assist() {
        return Performance {
            value: 0.0,
            accuracy: accuracy(mode, score)
        };
    }

    match mode {
        GameMode::Osu => osu::calculate(score, beatmap),
        GameMode::Taiko => taiko::calculate(score, beatmap),
        GameMode::Catch => catch::calculate(score, beatmap),
        GameMode::Mania => mania::calculate(score, beatmap)
    }
}

pub fn accuracy(mode: GameMode, score: &ScoreStats) -> f64 {
    match mode {
        GameMode::Osu => osu::accuracy(score),
        GameMode::Taiko => taiko::accuracy(score),
        GameMode::Catch => catch::accuracy(score),
        GameMode::Mania => mania::accuracy(score)
    }
}
