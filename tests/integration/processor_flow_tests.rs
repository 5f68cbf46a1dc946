use chrono::{NaiveDate, NaiveDateTime};
use pp_processor::{
    config::ProcessorConfig,
    model::{mods::Mods, structures::game_mode::GameMode},
    processor::{Processor, ProcessorError},
    threading::active::ActiveError,
    utils::test_utils::{generate_beatmap_for, generate_score_row, MemoryConnector, MemoryStore}
};
use std::{sync::Arc, time::Duration};

use crate::common::init_test_env;

const PLAYER: i64 = 1000;
const MAP_A: i32 = 1;
const MAP_B: i32 = 2;
const SCORE_A: i64 = 501;
const SCORE_B: i64 = 502;

fn approved() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(12, 0, 0).unwrap()
}

/// One player with a score on each of two ranked maps.
fn two_map_store(mode: GameMode, prior_rating: Option<f64>) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::default());
    store.add_map(mode, &generate_beatmap_for(mode, MAP_A), approved());
    store.add_map(mode, &generate_beatmap_for(mode, MAP_B), approved());
    store.add_player(mode, PLAYER, "TestPlayer", prior_rating);

    store.add_score(mode, generate_score_row(SCORE_A, PLAYER, MAP_A, 350, [450, 30, 5, 3, 40, 10], Mods::NOMOD));
    store.add_score(mode, generate_score_row(SCORE_B, PLAYER, MAP_B, 700, [500, 0, 0, 0, 60, 0], Mods::HIDDEN));
    store
}

fn processor(mode: GameMode, store: &Arc<MemoryStore>) -> Processor {
    Processor::new(mode, ProcessorConfig::default(), Arc::new(MemoryConnector::new(Arc::clone(store))))
        .expect("Processor should start on the in-memory store")
}

#[test]
fn test_player_without_selection_stages_rating_but_no_notable_event() {
    init_test_env();
    let store = two_map_store(GameMode::Osu, Some(1.0));
    let processor = processor(GameMode::Osu, &store);

    let ctx = processor.main_context(0);
    let aggregate = processor.process_player(None, &ctx, PLAYER).unwrap();
    ctx.settle().unwrap();

    assert_eq!(aggregate.records().len(), 2);
    assert_eq!(store.count_executed("UPDATE osu_user_stats"), 1);
    assert_eq!(store.count_executed("UPDATE osu_scores_high"), 2);
    assert_eq!(store.count_executed("osu_user_performance_change"), 0);
}

#[test]
fn test_selected_score_with_low_prior_rating_is_notable() {
    init_test_env();
    let store = two_map_store(GameMode::Osu, Some(1.0));
    let processor = processor(GameMode::Osu, &store);

    let ctx = processor.main_context(0);
    processor.process_player(None, &ctx, PLAYER).unwrap();
    let aggregate = processor.process_player(Some(SCORE_B), &ctx, PLAYER).unwrap();
    ctx.settle().unwrap();

    assert!(aggregate.rating().value - 1.0 >= 5.0);
    assert_eq!(store.count_executed("osu_user_performance_change"), 1);
    assert_eq!(
        store.count_executed(&format!("VALUES ({PLAYER}, 0, {MAP_B}, ")),
        1,
        "the event is recorded against the selected score's map"
    );
}

#[test]
fn test_selected_score_without_prior_rating_is_not_notable() {
    init_test_env();
    let store = two_map_store(GameMode::Osu, None);
    let processor = processor(GameMode::Osu, &store);

    let ctx = processor.main_context(0);
    processor.process_player(Some(SCORE_B), &ctx, PLAYER).unwrap();
    ctx.settle().unwrap();

    assert_eq!(store.count_executed("osu_user_performance_change"), 0);
}

#[test]
fn test_small_rating_change_is_not_notable() {
    init_test_env();
    let store = two_map_store(GameMode::Osu, None);
    let processor = processor(GameMode::Osu, &store);

    let ctx = processor.main_context(0);
    let rating = processor.process_player(None, &ctx, PLAYER).unwrap().rating().value;
    ctx.settle().unwrap();

    // Prior rating just below the fresh one
    let replayed = two_map_store(GameMode::Osu, Some(rating - 1.0));
    let processor = self::processor(GameMode::Osu, &replayed);
    let ctx = processor.main_context(0);
    processor.process_player(Some(SCORE_B), &ctx, PLAYER).unwrap();
    ctx.settle().unwrap();

    assert_eq!(replayed.count_executed("osu_user_performance_change"), 0);
}

#[test]
fn test_every_mode_produces_a_rating() {
    init_test_env();
    for mode in [GameMode::Osu, GameMode::Taiko, GameMode::Catch, GameMode::Mania] {
        let store = two_map_store(mode, None);
        let processor = processor(mode, &store);

        let ctx = processor.main_context(0);
        let aggregate = processor.process_player(None, &ctx, PLAYER).unwrap();
        ctx.settle().unwrap();

        assert_eq!(aggregate.records().len(), 2, "{mode}");
        assert!(aggregate.rating().value > 0.0, "{mode}");
        for record in aggregate.records() {
            assert!(record.value.is_finite() && record.value >= 0.0, "{mode}");
            assert!((0.0..=1.0).contains(&record.accuracy), "{mode}");
        }
        assert_eq!(
            store.count_executed(&format!("UPDATE osu_user_stats{}", mode.suffix())),
            1,
            "{mode}"
        );
    }
}

#[test]
fn test_unranked_assist_scores_are_worthless() {
    init_test_env();
    let store = Arc::new(MemoryStore::default());
    store.add_map(GameMode::Osu, &generate_beatmap_for(GameMode::Osu, MAP_A), approved());
    store.add_score(
        GameMode::Osu,
        generate_score_row(1, PLAYER, MAP_A, 700, [500, 0, 0, 0, 0, 0], Mods::RELAX | Mods::HIDDEN)
    );
    let processor = processor(GameMode::Osu, &store);

    let ctx = processor.main_context(0);
    let aggregate = processor.process_player(None, &ctx, PLAYER).unwrap();

    assert_eq!(aggregate.record_for_score(1).unwrap().value, 0.0);
}

#[test]
fn test_failed_write_stops_bulk_before_checkpoint() {
    init_test_env();
    let store = two_map_store(GameMode::Osu, None);
    let processor = Arc::new(processor(GameMode::Osu, &store));
    store.fail_executes_containing("UPDATE osu_user_stats");

    let result = processor.process_all(false, 2);
    processor.primary().wait_idle(Duration::from_millis(1)).unwrap();

    assert!(matches!(
        result,
        Err(ProcessorError::Writer(ActiveError::Terminated { .. }))
    ));
    assert_eq!(store.stored_count("pp_last_user_id"), Some(0));
}

#[test]
fn test_specific_scores_select_their_score() {
    init_test_env();
    let store = two_map_store(GameMode::Osu, Some(1.0));
    let processor = processor(GameMode::Osu, &store);

    let summaries = processor.process_scores(&[SCORE_A, SCORE_B]).unwrap();

    assert_eq!(summaries.len(), 2);
    assert!(summaries[0].value >= summaries[1].value);
    assert_eq!(summaries[0].player_name, "TestPlayer");
    // Both runs selected a score that was staged first
    assert!(store.count_executed("osu_user_performance_change") >= 1);
}
