use chrono::NaiveDate;
use pp_processor::{
    database::{
        db_structs::{MapRange, NewScore},
        statements, Store
    },
    model::structures::game_mode::GameMode
};
use serial_test::serial;

use super::test_helpers::TestDatabase;
use crate::common::init_test_env;

fn setup() -> TestDatabase {
    init_test_env();
    let test_db = TestDatabase::new().expect("Failed to create test database");
    test_db.seed_test_data().expect("Failed to seed test data");
    test_db
}

#[test]
#[serial]
#[ignore = "requires docker"]
fn test_scores_by_player() {
    let test_db = setup();
    let client = test_db.client().expect("Failed to connect");

    let mut scores = client.scores_by_player(GameMode::Osu, 1).unwrap();
    scores.sort_by_key(|s| s.score_id);

    assert_eq!(scores.len(), 2);
    assert_eq!(scores[0].score_id, 100);
    assert_eq!(scores[0].map_id, 10);
    assert_eq!(scores[0].count_300, 500);
    assert_eq!(scores[0].pp, None);
    assert_eq!(scores[1].mods, 8);

    assert!(client.scores_by_player(GameMode::Osu, 99).unwrap().is_empty());
}

#[test]
#[serial]
#[ignore = "requires docker"]
fn test_scores_after_is_ascending_and_limited() {
    let test_db = setup();
    let client = test_db.client().expect("Failed to connect");

    let scores = client.scores_after(GameMode::Osu, 100, 2).unwrap();

    assert_eq!(
        scores,
        vec![
            NewScore {
                score_id: 101,
                player_id: 1,
                pp: None
            },
            NewScore {
                score_id: 102,
                player_id: 2,
                pp: Some(12.5)
            }
        ]
    );
    assert!(client.scores_after(GameMode::Osu, 104, 1000).unwrap().is_empty());
    assert_eq!(client.max_score_id(GameMode::Osu).unwrap(), Some(104));
}

#[test]
#[serial]
#[ignore = "requires docker"]
fn test_score_owner() {
    let test_db = setup();
    let client = test_db.client().expect("Failed to connect");

    let owner = client.score_owner(GameMode::Osu, 101).unwrap().unwrap();
    assert_eq!(owner.player_id, 1);
    assert_eq!(owner.mods, 8);

    assert!(client.score_owner(GameMode::Osu, 5000).unwrap().is_none());
}

#[test]
#[serial]
#[ignore = "requires docker"]
fn test_difficulty_rows_skip_pending_maps() {
    let test_db = setup();
    let client = test_db.client().expect("Failed to connect");

    let rows = client.difficulty_rows(GameMode::Osu, MapRange::Range(0, 100)).unwrap();
    let mut map_ids = rows.iter().map(|r| r.map_id).collect::<Vec<_>>();
    map_ids.sort();
    map_ids.dedup();

    assert_eq!(map_ids, vec![10, 20]);
    assert!(rows.iter().all(|r| r.num_circles == Some(400)));

    let single = client.difficulty_rows(GameMode::Osu, MapRange::Single(20)).unwrap();
    assert!(!single.is_empty());
    assert!(single.iter().all(|r| r.map_id == 20 && r.approved == 2));

    assert!(client.difficulty_rows(GameMode::Osu, MapRange::Single(30)).unwrap().is_empty());
    assert!(client.difficulty_rows(GameMode::Osu, MapRange::Range(20, 20)).unwrap().is_empty());

    let bounds = client.map_id_bounds(GameMode::Osu).unwrap();
    assert_eq!(bounds.max_id, 20);
    assert_eq!(bounds.count, 2);
}

#[test]
#[serial]
#[ignore = "requires docker"]
fn test_approvals() {
    let test_db = setup();
    let client = test_db.client().expect("Failed to connect");

    let latest = client.latest_approval().unwrap().unwrap();
    let february = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
    assert_eq!(latest, february);

    let since = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap().and_hms_opt(0, 0, 0).unwrap();
    let maps = client.maps_approved_since(since).unwrap();
    assert_eq!(maps.iter().map(|m| m.map_id).collect::<Vec<_>>(), vec![10, 20]);

    // Strictly after
    assert!(client.maps_approved_since(february).unwrap().is_empty());
}

#[test]
#[serial]
#[ignore = "requires docker"]
fn test_blacklist_and_attribute_names() {
    let test_db = setup();
    let client = test_db.client().expect("Failed to connect");

    assert!(client.blacklisted_maps(GameMode::Osu).unwrap().is_empty());
    assert_eq!(client.blacklisted_maps(GameMode::Taiko).unwrap(), vec![20]);

    let names = client.attribute_names().unwrap();
    assert_eq!(names.len(), 12);
    assert_eq!(names[0], (12, "Legacy attribute".to_string()));
    assert!(names.contains(&(5, "Max combo".to_string())));
}

#[test]
#[serial]
#[ignore = "requires docker"]
fn test_players() {
    let test_db = setup();
    let client = test_db.client().expect("Failed to connect");

    assert_eq!(client.player_ids_after(GameMode::Osu, 0, 2).unwrap(), vec![1, 2]);
    assert_eq!(client.player_ids_after(GameMode::Osu, 2, 10).unwrap(), vec![3]);
    assert_eq!(client.player_count_from(GameMode::Osu, 2).unwrap(), 2);

    assert_eq!(client.player_id_by_name("sample_users", "TestPlayer2").unwrap(), Some(2));
    assert_eq!(client.player_id_by_name("sample_users", "nobody").unwrap(), None);
    assert_eq!(client.player_name("sample_users", 1).unwrap(), Some("TestPlayer1".to_string()));
    assert_eq!(
        client.map_name(20).unwrap(),
        Some("Artist - Second (Mapper) [Insane]".to_string())
    );
    assert_eq!(client.map_name(999).unwrap(), None);
}

#[test]
#[serial]
#[ignore = "requires docker"]
fn test_counts_round_trip() {
    let test_db = setup();
    let client = test_db.client().expect("Failed to connect");

    assert_eq!(client.count("pp_last_user_id").unwrap(), None);

    client.execute(&statements::store_count("pp_last_user_id", 10)).unwrap();
    client.execute(&statements::store_count("pp_last_user_id", 42)).unwrap();

    assert_eq!(client.count("pp_last_user_id").unwrap(), Some(42));
}

#[test]
#[serial]
#[ignore = "requires docker"]
fn test_written_statements() {
    let test_db = setup();
    let client = test_db.client().expect("Failed to connect");

    let batch = [
        statements::score_update(GameMode::Osu, 100, 321.5),
        statements::player_rating_update(GameMode::Osu, "rank_score", "sample_users", 1, 500.0, 99.5),
        // Restricted players are written with zero
        statements::player_rating_update(GameMode::Osu, "rank_score", "sample_users", 3, 500.0, 99.5),
        statements::notable_event_insert(GameMode::Osu, 1, 10, 12.5)
    ]
    .concat();
    client.execute(&batch).unwrap();

    let score = client
        .scores_by_player(GameMode::Osu, 1)
        .unwrap()
        .into_iter()
        .find(|s| s.score_id == 100)
        .unwrap();
    assert_eq!(score.pp, Some(321.5));

    assert_eq!(client.stored_rating(GameMode::Osu, 1, "rank_score").unwrap(), Some(500.0));
    assert_eq!(client.stored_rating(GameMode::Osu, 2, "rank_score").unwrap(), Some(0.0));
    assert_eq!(client.stored_rating(GameMode::Osu, 3, "rank_score").unwrap(), Some(0.0));
    assert_eq!(client.stored_rating(GameMode::Osu, 99, "rank_score").unwrap(), None);
}

#[test]
#[serial]
#[ignore = "requires docker"]
fn test_failed_statement_is_reported() {
    let test_db = setup();
    let client = test_db.client().expect("Failed to connect");

    assert!(client.execute("UPDATE missing_table SET x = 1;").is_err());
    // The connection stays usable
    assert_eq!(client.player_count_from(GameMode::Osu, 0).unwrap(), 3);
}
