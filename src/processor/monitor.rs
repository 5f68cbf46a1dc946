use super::{Processor, ProcessorError, ThreadContext};
use crate::{
    database::Store,
    model::constants::{
        MAP_LOOP_IDLE_SLEEP_MS, MAX_SCORES_PER_POLL, SCORE_LOOP_IDLE_SLEEP_MS, SCORE_WATERMARK_STORE_STEP,
        STALL_CHECK_INTERVAL_MS
    }
};
use chrono::NaiveDateTime;
use std::{
    process,
    sync::{Mutex, PoisonError},
    thread,
    time::{Duration, Instant}
};
use tracing::{error, info, warn};

/// Last time the map poll loop did something.
#[derive(Debug)]
pub struct Heartbeat {
    last: Mutex<Instant>
}

impl Heartbeat {
    pub fn new() -> Self {
        Heartbeat {
            last: Mutex::new(Instant::now())
        }
    }

    pub fn beat(&self) {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    pub fn last(&self) -> Instant {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self::new()
    }
}

pub fn is_stalled(last_activity: Instant, now: Instant, threshold: Duration) -> bool {
    now.saturating_duration_since(last_activity) > threshold
}

/// Position of the new-score poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreCursor {
    pub last_id: i64,
    pub processed_since_store: u64
}

impl ScoreCursor {
    pub fn new(last_id: i64) -> Self {
        ScoreCursor {
            last_id,
            processed_since_store: 0
        }
    }
}

impl Processor {
    /// Polls for new maps and new scores until the process is killed.
    /// Exits the process with status 1 when the map poll stalls.
    pub fn monitor(&self) -> Result<(), ProcessorError> {
        self.monitor_with(|| process::exit(1))
    }

    /// [`Processor::monitor`] with a custom stall action. After the action
    /// returns, both poll loops are shut down.
    pub fn monitor_with(&self, on_stall: impl FnOnce() + Send + 'static) -> Result<(), ProcessorError> {
        info!(mode = %self.mode, "Monitoring new scores");

        let key = self.mode.last_score_id_key();
        let last_score_id = match self.primary.store().count(&key)? {
            Some(id) => id,
            None => {
                let id = self.replica.max_score_id(self.mode)?.unwrap_or(0);
                warn!(%key, id, "No score watermark stored, starting from the newest score");
                self.store_count(&key, id)?;
                id
            }
        };

        let last_approved = self
            .replica
            .latest_approval()?
            .ok_or_else(|| ProcessorError::MissingData("maximum approved date".to_string()))?;

        let map_replica = self.connector.replica()?;
        let ctx = self.main_context(0);
        let heartbeat = Heartbeat::new();
        let heartbeat = &heartbeat;

        let mut cursor = ScoreCursor::new(last_score_id);
        let result = thread::scope(|s| {
            let maps = s.spawn(move || self.run_map_loop(map_replica.as_ref(), heartbeat, last_approved));
            let supervisor = s.spawn(move || self.supervise(heartbeat, on_stall));

            let result = self.run_score_loop(&ctx, &mut cursor);
            self.request_shutdown();

            if maps.join().is_err() {
                error!("Map poll thread panicked");
            }
            if supervisor.join().is_err() {
                error!("Stall supervisor panicked");
            }
            result
        });

        self.store_count(&key, cursor.last_id)?;
        ctx.settle()?;
        result
    }

    fn supervise(&self, heartbeat: &Heartbeat, on_stall: impl FnOnce()) {
        let threshold = self.config.stall_threshold();

        while !self.shutdown_requested() {
            let last = heartbeat.last();
            if is_stalled(last, Instant::now(), threshold) {
                error!(
                    idle_ms = last.elapsed().as_millis() as u64,
                    threshold_ms = threshold.as_millis() as u64,
                    "Beatmap poll stalled, shutting down"
                );
                on_stall();
                self.request_shutdown();
                return;
            }

            thread::sleep(Duration::from_millis(STALL_CHECK_INTERVAL_MS));
        }
    }

    fn run_map_loop(&self, replica: &dyn Store, heartbeat: &Heartbeat, mut last_approved: NaiveDateTime) {
        let interval = self.config.map_interval();
        let mut last_poll = Instant::now();

        while !self.shutdown_requested() {
            if last_poll.elapsed() <= interval {
                thread::sleep(Duration::from_millis(MAP_LOOP_IDLE_SLEEP_MS));
                continue;
            }

            last_poll = Instant::now();
            heartbeat.beat();

            if let Err(e) = self.poll_new_maps(replica, &mut last_approved) {
                warn!(error = %e, "Failed to poll new beatmaps");
            }
        }
    }

    /// Loads every map approved after `last_approved`, oldest first.
    ///
    /// A map that fails to load is skipped, and the watermark stops short of
    /// its approval date so the next poll retries it.
    pub fn poll_new_maps(&self, replica: &dyn Store, last_approved: &mut NaiveDateTime) -> Result<usize, ProcessorError> {
        info!("Retrieving new beatmap sets");
        let maps = replica.maps_approved_since(*last_approved)?;
        info!(count = maps.len(), "Retrieved new beatmaps");

        let mut retry_from: Option<NaiveDateTime> = None;
        for map in &maps {
            if let Err(e) = self.fetch_map(replica, map.map_id) {
                warn!(map_id = map.map_id, error = %e, "Failed to load new beatmap");
                retry_from.get_or_insert(map.approved_date);
            }
        }

        let loaded_up_to = maps
            .iter()
            .map(|m| m.approved_date)
            .filter(|date| retry_from.map_or(true, |retry| *date < retry))
            .max();
        if let Some(date) = loaded_up_to {
            *last_approved = (*last_approved).max(date);
        }

        Ok(maps.len())
    }

    fn run_score_loop(&self, ctx: &ThreadContext, cursor: &mut ScoreCursor) -> Result<(), ProcessorError> {
        let interval = self.config.score_interval();
        let mut last_poll = Instant::now();

        while !self.shutdown_requested() {
            if last_poll.elapsed() <= interval {
                thread::sleep(Duration::from_millis(SCORE_LOOP_IDLE_SLEEP_MS));
                continue;
            }

            match self.poll_new_scores(ctx, cursor) {
                // A backlog is worked off without waiting
                Ok(0) => last_poll = Instant::now(),
                Ok(_) => {}
                Err(ProcessorError::Writer(e)) => return Err(ProcessorError::Writer(e)),
                Err(e) => {
                    warn!(error = %e, "Failed to poll new scores");
                    last_poll = Instant::now();
                }
            }
        }

        Ok(())
    }

    /// Processes the owners of scores above the cursor that have no value
    /// yet. Returns how many scores the poll found.
    pub fn poll_new_scores(&self, ctx: &ThreadContext, cursor: &mut ScoreCursor) -> Result<usize, ProcessorError> {
        let scores = ctx.replica.scores_after(self.mode, cursor.last_id, MAX_SCORES_PER_POLL)?;

        for score in &scores {
            cursor.last_id = cursor.last_id.max(score.score_id);
            if score.pp.is_some() {
                continue;
            }

            let aggregate = match self.process_player(Some(score.score_id), ctx, score.player_id) {
                Ok(aggregate) => aggregate,
                Err(ProcessorError::Writer(e)) => return Err(ProcessorError::Writer(e)),
                Err(e) => {
                    warn!(score_id = score.score_id, player_id = score.player_id, error = %e, "Failed to process score");
                    continue;
                }
            };

            let Some(record) = aggregate.record_for_score(score.score_id) else {
                warn!(score_id = score.score_id, "Could not find score in result set");
                continue;
            };

            let rating = aggregate.rating();
            info!(
                score_id = score.score_id,
                value = %format!("{:.1}", record.value),
                accuracy = %format!("{:.2}", record.accuracy * 100.0),
                player_id = score.player_id,
                rating = %format!("{:.1}", rating.value),
                player_accuracy = %format!("{:.2}", rating.accuracy),
                map_id = record.map_id,
                "Processed score"
            );

            cursor.processed_since_store += 1;
            if cursor.processed_since_store > SCORE_WATERMARK_STORE_STEP {
                self.store_count(&self.mode.last_score_id_key(), cursor.last_id)?;
                cursor.processed_since_store = 0;
            }
        }

        Ok(scores.len())
    }
}

#[cfg(test)]
mod tests {
    use super::{is_stalled, ScoreCursor};
    use crate::{
        config::ProcessorConfig,
        model::{mods::Mods, structures::game_mode::GameMode},
        processor::Processor,
        utils::test_utils::{generate_osu_beatmap, generate_score_row, MemoryConnector, MemoryStore}
    };
    use chrono::{Duration as ChronoDuration, NaiveDate, NaiveDateTime};
    use std::{
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc
        },
        time::{Duration, Instant}
    };

    fn date() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    fn processor(store: &Arc<MemoryStore>, config: ProcessorConfig) -> Processor {
        Processor::new(GameMode::Osu, config, Arc::new(MemoryConnector::new(Arc::clone(store)))).unwrap()
    }

    #[test]
    fn test_stall_detection() {
        let start = Instant::now();
        let threshold = Duration::from_millis(500);

        assert!(!is_stalled(start, start + Duration::from_millis(499), threshold));
        assert!(!is_stalled(start, start + threshold, threshold));
        assert!(is_stalled(start, start + Duration::from_millis(501), threshold));
        // A clock reading before the last beat is never a stall
        assert!(!is_stalled(start + threshold, start, threshold));
    }

    #[test]
    fn test_poll_skips_scores_with_values_but_moves_past_them() {
        let store = Arc::new(MemoryStore::default());
        store.add_map(GameMode::Osu, &generate_osu_beatmap(1), date());
        let processor = processor(&store, ProcessorConfig::default());

        store.add_score(GameMode::Osu, generate_score_row(10, 1, 1, 700, [500, 0, 0, 0, 0, 0], Mods::NOMOD));
        let mut done = generate_score_row(11, 2, 1, 700, [500, 0, 0, 0, 0, 0], Mods::NOMOD);
        done.pp = Some(100.0);
        store.add_score(GameMode::Osu, done);
        store.add_score(GameMode::Osu, generate_score_row(12, 3, 1, 700, [490, 10, 0, 0, 0, 0], Mods::HIDDEN));

        let ctx = processor.main_context(0);
        let mut cursor = ScoreCursor::new(9);
        let found = processor.poll_new_scores(&ctx, &mut cursor).unwrap();
        ctx.settle().unwrap();

        assert_eq!(found, 3);
        assert_eq!(cursor.last_id, 12);
        assert_eq!(cursor.processed_since_store, 2);
        assert_eq!(store.count_executed("WHERE user_id = 2 AND"), 0);
        assert_eq!(store.count_executed("UPDATE osu_user_stats"), 2);

        // Nothing new on the next poll
        assert_eq!(processor.poll_new_scores(&ctx, &mut cursor).unwrap(), 0);
    }

    #[test]
    fn test_watermark_is_stored_periodically() {
        let store = Arc::new(MemoryStore::default());
        store.add_map(GameMode::Osu, &generate_osu_beatmap(1), date());
        let processor = processor(&store, ProcessorConfig::default());

        for id in 1..=120 {
            store.add_score(GameMode::Osu, generate_score_row(id, id, 1, 700, [500, 0, 0, 0, 0, 0], Mods::NOMOD));
        }

        let ctx = processor.main_context(0);
        let mut cursor = ScoreCursor::new(0);
        processor.poll_new_scores(&ctx, &mut cursor).unwrap();
        ctx.settle().unwrap();

        // Stored once the 101st score was processed
        assert_eq!(store.stored_count("pp_last_score_id"), Some(101));
        assert_eq!(cursor.processed_since_store, 19);
    }

    #[test]
    fn test_new_maps_are_loaded_in_approval_order() {
        let store = Arc::new(MemoryStore::default());
        store.add_map(GameMode::Osu, &generate_osu_beatmap(1), date());
        let processor = processor(&store, ProcessorConfig::default());

        store.add_map(GameMode::Osu, &generate_osu_beatmap(3), date() + ChronoDuration::hours(2));
        store.add_map(GameMode::Osu, &generate_osu_beatmap(2), date() + ChronoDuration::hours(1));

        let mut last_approved = date();
        let found = processor.poll_new_maps(store.as_ref(), &mut last_approved).unwrap();

        assert_eq!(found, 2);
        assert_eq!(last_approved, date() + ChronoDuration::hours(2));
        assert!(processor.cache().contains(2));
        assert!(processor.cache().contains(3));
    }

    #[test]
    fn test_failed_map_does_not_stop_its_set() {
        let store = Arc::new(MemoryStore::default());
        let processor = processor(&store, ProcessorConfig::default());

        let approved = date() + ChronoDuration::hours(1);
        for id in [10, 11, 12] {
            store.add_map(GameMode::Osu, &generate_osu_beatmap(id), approved);
        }
        store.add_map(GameMode::Osu, &generate_osu_beatmap(13), approved + ChronoDuration::hours(1));
        store.fail_difficulty_for(11);

        let mut last_approved = date();
        assert_eq!(processor.poll_new_maps(store.as_ref(), &mut last_approved).unwrap(), 4);

        assert!(processor.cache().contains(10));
        assert!(!processor.cache().contains(11));
        assert!(processor.cache().contains(12));
        assert!(processor.cache().contains(13));
        // Held back so the failed map comes up again
        assert_eq!(last_approved, date());

        store.restore_difficulty_for(11);
        assert_eq!(processor.poll_new_maps(store.as_ref(), &mut last_approved).unwrap(), 4);

        assert!(processor.cache().contains(11));
        assert_eq!(last_approved, approved + ChronoDuration::hours(1));
    }

    #[test]
    fn test_monitor_processes_scores_until_stall() {
        let store = Arc::new(MemoryStore::default());
        store.add_map(GameMode::Osu, &generate_osu_beatmap(1), date());
        store.set_count("pp_last_score_id", 0);

        let mut config = ProcessorConfig::default();
        // The map poll never runs within the test, so the supervisor fires
        config.poll.map_interval_ms = 60_000;
        config.poll.stall_threshold_ms = 300;
        config.poll.score_interval_ms = 1;
        let processor = processor(&store, config);

        store.add_score(GameMode::Osu, generate_score_row(1, 5, 1, 700, [500, 0, 0, 0, 0, 0], Mods::NOMOD));
        store.add_score(GameMode::Osu, generate_score_row(2, 6, 1, 700, [500, 0, 0, 0, 0, 0], Mods::NOMOD));

        let stalled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stalled);
        processor.monitor_with(move || flag.store(true, Ordering::SeqCst)).unwrap();

        assert!(stalled.load(Ordering::SeqCst));
        assert!(processor.shutdown_requested());
        assert_eq!(store.count_executed("UPDATE osu_scores_high"), 2);
        assert_eq!(store.stored_count("pp_last_score_id"), Some(2));
    }

    #[test]
    fn test_missing_watermark_starts_at_newest_score() {
        let store = Arc::new(MemoryStore::default());
        store.add_map(GameMode::Osu, &generate_osu_beatmap(1), date());
        store.add_score(GameMode::Osu, generate_score_row(40, 5, 1, 700, [500, 0, 0, 0, 0, 0], Mods::NOMOD));

        let mut config = ProcessorConfig::default();
        config.poll.map_interval_ms = 60_000;
        config.poll.stall_threshold_ms = 100;
        let processor = processor(&store, config);

        processor.monitor_with(|| {}).unwrap();

        // The existing score predates the watermark and is left alone
        assert_eq!(store.stored_count("pp_last_score_id"), Some(40));
        assert_eq!(store.count_executed("UPDATE osu_scores_high"), 0);
    }
}
