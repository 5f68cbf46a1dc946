use super::{
    constants::{ACCURACY_NORMALIZATION, BONUS_RATING_CAP, BONUS_RATING_DECAY, RATING_WEIGHT_DECAY},
    score::PerformanceRecord
};
use itertools::Itertools;
use std::cmp::Ordering;

/// A player's folded rating.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rating {
    pub value: f64,
    /// Weighted accuracy in percent.
    pub accuracy: f64
}

/// All performance records of one player and the rating folded from them.
///
/// The rating is recomputed from scratch by [`PlayerAggregate::compute_rating`].
/// Records are re-ranked on every pass so arrival order never matters.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerAggregate {
    pub player_id: i64,
    records: Vec<PerformanceRecord>,
    rating: Rating
}

impl PlayerAggregate {
    pub fn new(player_id: i64) -> Self {
        PlayerAggregate {
            player_id,
            records: Vec::new(),
            rating: Rating::default()
        }
    }

    pub fn add_record(&mut self, record: PerformanceRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[PerformanceRecord] {
        &self.records
    }

    pub fn record_for_score(&self, score_id: i64) -> Option<&PerformanceRecord> {
        self.records.iter().find(|r| r.score_id == score_id)
    }

    pub fn rating(&self) -> Rating {
        self.rating
    }

    pub fn compute_rating(&mut self) -> Rating {
        // Best record per map, then highest first
        let best_per_map = self
            .records
            .iter()
            .sorted_by(|a, b| {
                a.map_id
                    .cmp(&b.map_id)
                    .then_with(|| descending(a.value, b.value))
                    .then_with(|| descending(a.accuracy, b.accuracy))
                    .then_with(|| a.score_id.cmp(&b.score_id))
            })
            .dedup_by(|a, b| a.map_id == b.map_id)
            .sorted_by(|a, b| descending(a.value, b.value))
            .collect_vec();

        let mut value = 0.0;
        let mut accuracy = 0.0;
        let mut weight = 1.0;

        for record in &best_per_map {
            value += record.value * weight;
            accuracy += record.accuracy * weight;
            weight *= RATING_WEIGHT_DECAY;
        }

        let n = best_per_map.len() as i32;

        // Bonus for the number of distinct maps played
        value += BONUS_RATING_CAP * (1.0 - BONUS_RATING_DECAY.powi(n));

        if n > 0 {
            accuracy *= 100.0 / (ACCURACY_NORMALIZATION * (1.0 - RATING_WEIGHT_DECAY.powi(n)));
        }

        self.rating = Rating { value, accuracy };
        self.rating
    }
}

fn descending(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}
