use super::{Processor, ProcessorError, ThreadContext};
use crate::{
    database::statements,
    model::{
        aggregate::PlayerAggregate,
        constants::{NOTABLE_EVENT_MINIMUM_DELTA, NOTABLE_EVENT_RATING_FRACTION, SCORE_VALUE_EPSILON},
        performance,
        score::{PerformanceRecord, ScoreStats}
    }
};
use std::collections::VecDeque;
use tracing::{debug, info, warn};

impl Processor {
    /// Recomputes every score of one player, stages the writes that changed
    /// and returns the refolded aggregate.
    ///
    /// `selected` names the score that triggered the run, if any. Only that
    /// score's map is fetched on a cache miss, and only that score can raise
    /// a notable event.
    pub fn process_player(
        &self,
        selected: Option<i64>,
        ctx: &ThreadContext,
        player_id: i64
    ) -> Result<PlayerAggregate, ProcessorError> {
        let rows = ctx.replica.scores_by_player(self.mode, player_id)?;

        let mut aggregate = PlayerAggregate::new(player_id);
        let mut updates: VecDeque<PerformanceRecord> = VecDeque::new();

        let mut guard = self.cache.read();
        for row in &rows {
            if self.is_blacklisted(row.map_id) {
                continue;
            }

            let is_selected = selected == Some(row.score_id);
            if !guard.contains(row.map_id) {
                if !is_selected {
                    continue;
                }

                // The map may have been approved after the last map poll
                drop(guard);
                let fetched = self.fetch_map(ctx.replica.as_ref(), row.map_id);
                guard = self.cache.read();

                match fetched {
                    Ok(true) => {}
                    Ok(false) => continue,
                    Err(e) => {
                        warn!(map_id = row.map_id, error = %e, "Failed to fetch beatmap");
                        continue;
                    }
                }
            }

            let Some(beatmap) = guard.get(row.map_id) else {
                continue;
            };
            if !beatmap.ranked_status.is_accepted() {
                continue;
            }

            let stats = ScoreStats::from(row);
            let result = performance::calculate(self.mode, &stats, beatmap);
            let record = PerformanceRecord {
                score_id: row.score_id,
                map_id: row.map_id,
                value: result.value,
                accuracy: result.accuracy
            };
            aggregate.add_record(record);

            let changed = row.pp.map_or(true, |stored| (stored - record.value).abs() > SCORE_VALUE_EPSILON);
            if changed {
                if is_selected {
                    updates.push_front(record);
                } else {
                    updates.push_back(record);
                }
            }
        }
        drop(guard);

        let statements = updates
            .iter()
            .map(|r| statements::score_update(self.mode, r.score_id, r.value))
            .collect::<Vec<_>>();
        ctx.scores.append_all(statements.iter().map(String::as_str))?;
        debug!(player_id, updated = statements.len(), "Staged score updates");

        let rating = aggregate.compute_rating();

        if let Some(front) = updates.front() {
            if selected == Some(front.score_id) && front.value > rating.value * NOTABLE_EVENT_RATING_FRACTION {
                self.record_notable_event(ctx, player_id, front, rating.value);
            }
        }

        let schema = &self.config.schema;
        ctx.players.append(&statements::player_rating_update(
            self.mode,
            &schema.user_pp_column_name,
            &schema.user_metadata_table_name,
            player_id,
            rating.value,
            rating.accuracy
        ))?;

        Ok(aggregate)
    }

    /// Best effort. Failures are logged and never abort the recomputation.
    fn record_notable_event(&self, ctx: &ThreadContext, player_id: i64, score: &PerformanceRecord, rating: f64) {
        let column = &self.config.schema.user_pp_column_name;
        let previous = match ctx.replica.stored_rating(self.mode, player_id, column) {
            Ok(Some(previous)) => previous,
            Ok(None) => return,
            Err(e) => {
                warn!(player_id, error = %e, "Failed to read previous rating");
                return;
            }
        };

        let change = rating - previous;
        if change < NOTABLE_EVENT_MINIMUM_DELTA {
            return;
        }

        info!(score_id = score.score_id, player_id, map_id = score.map_id, change, "Notable event");
        let insert = statements::notable_event_insert(self.mode, player_id, score.map_id, change);
        if let Err(e) = ctx.connection.execute_background(insert) {
            warn!(player_id, error = %e, "Failed to stage notable event");
        }
    }
}
