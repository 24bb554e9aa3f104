use approx::assert_abs_diff_eq;
use chrono::NaiveDate;
use league_rating_processor::{
    database::db_structs::MatchResult,
    error::RatingError,
    utils::test_utils::generate_groups
};
use serial_test::serial;

use super::test_helpers::TestDatabase;
use crate::common::init_test_env;

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn test_recompute_reference_match() {
    init_test_env();
    let test_db = TestDatabase::new().await.expect("Failed to create test database");
    test_db
        .insert_match(2024, date(2024, 10, 1), Some(1), &[(1, 1), (2, 2), (3, 3), (4, 4)])
        .await
        .expect("Failed to seed match");

    let db_client = test_db.db_client().await;
    let summary = db_client.recompute_all().await.expect("Failed to recompute");

    assert_eq!(summary.replayed, 1);
    assert_eq!(summary.skipped, 0);

    assert_eq!(db_client.get_rating(1).await.unwrap(), (1536.0, 1));
    assert_eq!(db_client.get_rating(2).await.unwrap(), (1504.0, 1));
    assert_eq!(db_client.get_rating(3).await.unwrap(), (1488.0, 1));
    assert_eq!(db_client.get_rating(4).await.unwrap(), (1472.0, 1));

    let history = db_client.get_history(1, 50).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, 1);
    assert_eq!(history[0].old_rating, 1500.0);
    assert_eq!(history[0].delta, 36.0);
    assert_eq!(history[0].opponent_ids, vec![2, 3, 4]);
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn test_recompute_skips_incomplete_groups() {
    init_test_env();
    let test_db = TestDatabase::new().await.expect("Failed to create test database");
    test_db.seed_test_data().await.expect("Failed to seed test data");

    let db_client = test_db.db_client().await;
    let summary = db_client.recompute_all().await.expect("Failed to recompute");

    assert_eq!(summary.replayed, 3);
    assert_eq!(summary.skipped, 1);

    // Player 6 only played the rated game on day one
    assert_eq!(db_client.get_rating(6).await.unwrap(), (1504.0, 1));
    assert_eq!(db_client.get_history(6, 50).await.unwrap().len(), 1);

    let check_client = test_db.get_client().await.expect("Failed to get client");
    let unrated_rows: i64 = check_client
        .query_one("SELECT COUNT(*) FROM game_results WHERE NOT rating_calculated", &[])
        .await
        .expect("Failed to query")
        .get(0);
    assert_eq!(unrated_rows, 3);

    let status = db_client.status().await.unwrap();
    assert_eq!(status.match_groups, 4);
    assert_eq!(status.rated_groups, 3);
    assert_eq!(status.pending_groups, 0);
    assert_eq!(status.games_sum, 12);
    assert!(!status.needs_recompute);
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn test_recompute_is_deterministic() {
    init_test_env();
    let test_db = TestDatabase::new().await.expect("Failed to create test database");
    let groups = generate_groups(40, &(1..=9).collect::<Vec<i32>>(), 3);
    test_db.insert_groups(&groups).await.expect("Failed to seed matches");

    let db_client = test_db.db_client().await;
    db_client.recompute_all().await.expect("Failed to recompute");
    let first = test_db.dump_rating_tables().await.unwrap();

    db_client.recompute_all().await.expect("Failed to recompute");
    let second = test_db.dump_rating_tables().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.1.len(), 40 * 4);
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn test_apply_match_for_new_players() {
    init_test_env();
    let test_db = TestDatabase::new().await.expect("Failed to create test database");
    let db_client = test_db.db_client().await;

    assert_eq!(db_client.get_rating(10).await.unwrap(), (1500.0, 0));
    assert!(db_client.get_history(10, 50).await.unwrap().is_empty());

    let result = MatchResult::new(&[10, 11, 12, 13], &[1, 2, 2, 4], 2024, date(2024, 10, 5), None).unwrap();
    let update = db_client.apply_match(&result).await.expect("Failed to apply match");

    assert_eq!(update.entries.len(), 4);
    assert_eq!(db_client.get_rating(11).await.unwrap(), (1496.0, 1));
    assert_eq!(db_client.get_rating(12).await.unwrap(), (1496.0, 1));

    let history = db_client.get_history(10, 50).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].old_rating, 1500.0);
    assert_eq!(history[0].game_number, None);

    let leaderboard = db_client.get_leaderboard().await.unwrap();
    let order: Vec<i32> = leaderboard.iter().map(|r| r.player_id).collect();
    assert_eq!(order, vec![10, 11, 12, 13]);
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn test_apply_match_uses_current_ratings() {
    init_test_env();
    let test_db = TestDatabase::new().await.expect("Failed to create test database");
    let db_client = test_db.db_client().await;

    let first = MatchResult::new(&[1, 2, 3, 4], &[1, 2, 3, 4], 2024, date(2024, 10, 1), Some(1)).unwrap();
    let second = MatchResult::new(&[1, 2, 3, 4], &[4, 3, 2, 1], 2024, date(2024, 10, 1), Some(2)).unwrap();
    db_client.apply_match(&first).await.unwrap();
    let update = db_client.apply_match(&second).await.unwrap();

    assert_eq!(update.entries[0].old_rating, 1536.0);
    let deltas: f64 = update.entries.iter().map(|e| e.delta).sum();
    assert_abs_diff_eq!(deltas, 0.0, epsilon = 1e-9);

    let (_, games) = db_client.get_rating(1).await.unwrap();
    assert_eq!(games, 2);
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn test_apply_pending_marks_groups() {
    init_test_env();
    let test_db = TestDatabase::new().await.expect("Failed to create test database");
    test_db.seed_test_data().await.expect("Failed to seed test data");

    let db_client = test_db.db_client().await;
    let status = db_client.status().await.unwrap();
    assert_eq!(status.pending_groups, 3);
    assert!(status.needs_recompute);

    let summary = db_client.apply_pending().await.expect("Failed to apply pending matches");
    assert_eq!(summary.replayed, 3);
    assert_eq!(summary.skipped, 1);

    // Rated groups are not picked up again
    let summary = db_client.apply_pending().await.expect("Failed to apply pending matches");
    assert_eq!(summary.replayed, 0);
    assert_eq!(summary.skipped, 1);

    // Pending application in chronological order matches a full recompute
    let pending_state = test_db.dump_rating_tables().await.unwrap();
    db_client.recompute_all().await.unwrap();
    assert_eq!(pending_state, test_db.dump_rating_tables().await.unwrap());
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn test_apply_match_rejects_invalid_ranks() {
    init_test_env();
    let test_db = TestDatabase::new().await.expect("Failed to create test database");
    let db_client = test_db.db_client().await;

    let result = MatchResult::new(&[1, 2, 3, 4], &[1, 2, 3, 9], 2024, date(2024, 10, 1), Some(1)).unwrap();
    let error = db_client.apply_match(&result).await.unwrap_err();
    assert!(matches!(error, RatingError::InvalidRank(9)));

    let (ratings, history) = test_db.dump_rating_tables().await.unwrap();
    assert!(ratings.is_empty());
    assert!(history.is_empty());
}
