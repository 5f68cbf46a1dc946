use super::{Processor, ProcessorError};
use crate::{
    model::{constants::BULK_BATCH_THRESHOLD, mods::Mods},
    utils::progress_utils::progress_bar
};
use std::cmp::Ordering;
use tracing::{info, warn};

const NOT_FOUND: &str = "<not-found>";

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSummary {
    pub player_id: i64,
    pub name: String,
    pub rating: f64,
    /// Percent
    pub accuracy: f64
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreSummary {
    pub score_id: i64,
    pub player_id: i64,
    pub player_name: String,
    pub map_id: i32,
    pub map_name: String,
    pub value: f64,
    /// Fraction in `[0, 1]`
    pub accuracy: f64,
    pub mods: Mods
}

fn descending(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

pub fn player_table(players: &[PlayerSummary]) -> Vec<String> {
    let rule = "=".repeat(45);
    let mut lines = vec![
        rule.clone(),
        format!("{:=<45}", "======= USER SUMMARY "),
        rule.clone(),
        format!("{:>16}  {:>8}  {:>7}  {:>8}", "Name", "Id", "Perf.", "Acc."),
        "-".repeat(45)
    ];

    for player in players {
        lines.push(format!(
            "{:>16}  {:>8}  {:>5}pp  {:>6.2} %",
            player.name,
            player.player_id,
            player.rating.round() as i64,
            player.accuracy
        ));
    }

    lines.push(rule);
    lines
}

pub fn score_table(scores: &[ScoreSummary]) -> Vec<String> {
    let rule = "=".repeat(80);
    let mut lines = vec![
        rule.clone(),
        format!("{:=<80}", "======= SCORE SUMMARY "),
        rule.clone(),
        format!("{:>16}  {:>8}  {:>8}  Beatmap - Mods", "Name", "Perf.", "Acc."),
        "-".repeat(80)
    ];

    for score in scores {
        lines.push(format!(
            "{:>16}  {:>6.1}pp  {:>6.2} %  {} - {}",
            score.player_name,
            score.value,
            score.accuracy * 100.0,
            score.map_name,
            score.mods
        ));
    }

    lines.push(rule);
    lines
}

impl Processor {
    fn player_name(&self, player_id: i64) -> String {
        let table = &self.config.schema.user_metadata_table_name;
        match self.replica.player_name(table, player_id) {
            Ok(Some(name)) => name,
            Ok(None) => NOT_FOUND.to_string(),
            Err(e) => {
                warn!(player_id, error = %e, "Failed to look up player name");
                NOT_FOUND.to_string()
            }
        }
    }

    fn map_name(&self, map_id: i32) -> String {
        match self.replica.map_name(map_id) {
            Ok(Some(name)) => name,
            Ok(None) => NOT_FOUND.to_string(),
            Err(e) => {
                warn!(map_id, error = %e, "Failed to look up beatmap name");
                NOT_FOUND.to_string()
            }
        }
    }

    /// Resolves ids or usernames. Unknown names are dropped.
    pub fn resolve_players(&self, names: &[String]) -> Result<Vec<i64>, ProcessorError> {
        let table = &self.config.schema.user_metadata_table_name;
        let mut ids = Vec::with_capacity(names.len());

        for name in names {
            match name.trim().parse::<i64>() {
                Ok(id) if id != 0 => ids.push(id),
                _ => match self.replica.player_id_by_name(table, name)? {
                    Some(id) => ids.push(id),
                    None => warn!(%name, "No player with this name")
                }
            }
        }

        Ok(ids)
    }

    /// Recomputes the given players, best first in the returned list, and
    /// prints a summary table.
    pub fn process_players(&self, names: &[String]) -> Result<Vec<PlayerSummary>, ProcessorError> {
        let ids = self.resolve_players(names)?;
        info!(count = ids.len(), "Processing players");

        let ctx = self.main_context(BULK_BATCH_THRESHOLD);
        let bar = progress_bar(ids.len() as u64, "players");

        let mut summaries = Vec::with_capacity(ids.len());
        for player_id in ids {
            bar.inc(1);
            let aggregate = match self.process_player(None, &ctx, player_id) {
                Ok(aggregate) => aggregate,
                Err(ProcessorError::Writer(e)) => return Err(ProcessorError::Writer(e)),
                Err(e) => {
                    warn!(player_id, error = %e, "Failed to process player");
                    continue;
                }
            };
            let rating = aggregate.rating();
            summaries.push(PlayerSummary {
                player_id,
                name: String::new(),
                rating: rating.value,
                accuracy: rating.accuracy
            });
        }
        ctx.settle()?;
        bar.finish_and_clear();

        summaries.sort_by(|a, b| descending(a.rating, b.rating).then_with(|| b.player_id.cmp(&a.player_id)));
        for summary in &mut summaries {
            summary.name = self.player_name(summary.player_id);
        }

        info!(count = summaries.len(), elapsed = ?bar.elapsed(), "Processed players");
        for line in player_table(&summaries) {
            println!("{line}");
        }

        Ok(summaries)
    }

    /// Recomputes the owners of the given scores with each score selected,
    /// and prints the scores best first.
    pub fn process_scores(&self, score_ids: &[i64]) -> Result<Vec<ScoreSummary>, ProcessorError> {
        info!(count = score_ids.len(), "Processing scores");

        let ctx = self.main_context(BULK_BATCH_THRESHOLD);
        let bar = progress_bar(score_ids.len() as u64, "scores");

        let mut summaries = Vec::with_capacity(score_ids.len());
        for &score_id in score_ids {
            bar.inc(1);
            let Some(owner) = self.replica.score_owner(self.mode, score_id)? else {
                warn!(score_id, "No such score");
                continue;
            };

            let aggregate = match self.process_player(Some(score_id), &ctx, owner.player_id) {
                Ok(aggregate) => aggregate,
                Err(ProcessorError::Writer(e)) => return Err(ProcessorError::Writer(e)),
                Err(e) => {
                    warn!(score_id, player_id = owner.player_id, error = %e, "Failed to process score");
                    continue;
                }
            };
            let Some(record) = aggregate.record_for_score(score_id) else {
                warn!(score_id, "Could not find score in result set");
                continue;
            };

            summaries.push(ScoreSummary {
                score_id,
                player_id: owner.player_id,
                player_name: String::new(),
                map_id: record.map_id,
                map_name: String::new(),
                value: record.value,
                accuracy: record.accuracy,
                mods: Mods::from(owner.mods)
            });
        }
        ctx.settle()?;
        bar.finish_and_clear();

        summaries.sort_by(|a, b| descending(a.value, b.value).then_with(|| b.score_id.cmp(&a.score_id)));
        for summary in &mut summaries {
            summary.player_name = self.player_name(summary.player_id);
            summary.map_name = self.map_name(summary.map_id);
        }

        info!(count = summaries.len(), elapsed = ?bar.elapsed(), "Processed scores");
        for line in score_table(&summaries) {
            println!("{line}");
        }

        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::{player_table, PlayerSummary};
    use crate::{
        config::ProcessorConfig,
        model::{mods::Mods, structures::game_mode::GameMode},
        processor::Processor,
        utils::test_utils::{generate_osu_beatmap, generate_score_row, MemoryConnector, MemoryStore}
    };
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn setup() -> (Arc<MemoryStore>, Processor) {
        let store = Arc::new(MemoryStore::default());
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        for id in 1..=3 {
            store.add_map(GameMode::Osu, &generate_osu_beatmap(id), date);
        }

        store.add_player(GameMode::Osu, 1, "alice", Some(10.0));
        store.add_player(GameMode::Osu, 2, "bob", Some(10.0));
        // bob plays clean, alice misses a lot
        store.add_score(GameMode::Osu, generate_score_row(11, 1, 1, 200, [400, 50, 10, 40, 0, 0], Mods::NOMOD));
        store.add_score(GameMode::Osu, generate_score_row(21, 2, 1, 700, [500, 0, 0, 0, 0, 0], Mods::NOMOD));
        store.add_score(GameMode::Osu, generate_score_row(22, 2, 2, 700, [498, 2, 0, 0, 0, 0], Mods::HIDDEN));

        let processor = Processor::new(
            GameMode::Osu,
            ProcessorConfig::default(),
            Arc::new(MemoryConnector::new(Arc::clone(&store)))
        )
        .unwrap();
        (store, processor)
    }

    #[test]
    fn test_players_sorted_by_rating() {
        let (store, processor) = setup();

        let summaries = processor
            .process_players(&["alice".to_string(), "2".to_string(), "nobody".to_string()])
            .unwrap();

        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].name, "bob");
        assert_eq!(summaries[1].name, "alice");
        assert!(summaries[0].rating > summaries[1].rating);
        assert_eq!(store.count_executed("UPDATE osu_user_stats"), 2);
    }

    #[test]
    fn test_scores_sorted_by_value() {
        let (_, processor) = setup();

        let summaries = processor.process_scores(&[11, 21, 999]).unwrap();

        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].score_id, 21);
        assert_eq!(summaries[0].player_name, "bob");
        assert_eq!(summaries[0].map_name, "Artist - Title (Mapper) [Diff 1]");
        assert_eq!(summaries[1].score_id, 11);
        assert!(summaries[0].value >= summaries[1].value);
    }

    #[test]
    fn test_failing_player_does_not_stop_the_list() {
        let (store, processor) = setup();
        store.fail_scores_for(1);

        let players = processor.process_players(&["1".to_string(), "2".to_string()]).unwrap();
        assert_eq!(players.len(), 1);
        assert_eq!(players[0].name, "bob");

        let scores = processor.process_scores(&[11, 21]).unwrap();
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].score_id, 21);
    }

    #[test]
    fn test_player_table_layout() {
        let lines = player_table(&[PlayerSummary {
            player_id: 2,
            name: "bob".to_string(),
            rating: 1234.4,
            accuracy: 98.76
        }]);

        assert_eq!(lines.len(), 7);
        assert!(lines[5].ends_with("1234pp   98.76 %"));
        assert!(lines.iter().take(3).all(|l| l.len() == 45));
    }
}
