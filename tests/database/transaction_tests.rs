use chrono::NaiveDate;
use league_rating_processor::{
    database::db_structs::MatchResult, error::RatingError, model::constants::RATING_LOCK_KEY
};
use serial_test::serial;
use std::time::Duration;

use super::test_helpers::TestDatabase;
use crate::common::init_test_env;

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn test_failed_recompute_keeps_previous_state() {
    init_test_env();
    let test_db = TestDatabase::new().await.expect("Failed to create test database");
    test_db.seed_test_data().await.expect("Failed to seed test data");

    let db_client = test_db.db_client().await;
    db_client.recompute_all().await.expect("Failed to recompute");
    let before = test_db.dump_rating_tables().await.unwrap();

    // Make every history insert fail after the tables were truncated
    let check_client = test_db.get_client().await.expect("Failed to get client");
    check_client
        .batch_execute("ALTER TABLE rating_history ADD CONSTRAINT impossible_delta CHECK (delta > 1000) NOT VALID")
        .await
        .expect("Failed to add constraint");

    let error = db_client.recompute_all().await.unwrap_err();
    assert!(matches!(error, RatingError::Storage(_)));

    assert_eq!(before, test_db.dump_rating_tables().await.unwrap());

    let rated_rows: i64 = check_client
        .query_one("SELECT COUNT(*) FROM game_results WHERE rating_calculated", &[])
        .await
        .expect("Failed to query")
        .get(0);
    assert_eq!(rated_rows, 12, "Flags should be rolled back with the ratings");

    let active_transactions: i64 = check_client
        .query_one(
            "SELECT COUNT(*) FROM pg_stat_activity WHERE state = 'idle in transaction' AND datname = current_database()",
            &[]
        )
        .await
        .expect("Failed to query")
        .get(0);
    assert_eq!(active_transactions, 0, "No lingering transactions should exist");
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn test_writers_wait_for_rating_lock() {
    init_test_env();
    let test_db = TestDatabase::new().await.expect("Failed to create test database");
    let db_client = test_db.db_client().await;

    // Another writer holds the rating lock
    let other_writer = test_db.get_client().await.expect("Failed to get client");
    other_writer
        .execute("SELECT pg_advisory_lock($1)", &[&RATING_LOCK_KEY])
        .await
        .expect("Failed to take lock");

    let result = MatchResult::new(
        &[1, 2, 3, 4],
        &[1, 2, 3, 4],
        2024,
        NaiveDate::from_ymd_opt(2024, 10, 1).unwrap(),
        Some(1)
    )
    .unwrap();

    let writer = db_client.clone();
    let handle = tokio::spawn(async move { writer.apply_match(&result).await });

    tokio::time::sleep(Duration::from_millis(300)).await;
    let (ratings, _) = test_db.dump_rating_tables().await.unwrap();
    assert!(ratings.is_empty(), "Match should not be applied while the lock is held");

    other_writer
        .execute("SELECT pg_advisory_unlock($1)", &[&RATING_LOCK_KEY])
        .await
        .expect("Failed to release lock");

    handle.await.expect("Writer task panicked").expect("Failed to apply match");
    let (ratings, history) = test_db.dump_rating_tables().await.unwrap();
    assert_eq!(ratings.len(), 4);
    assert_eq!(history.len(), 4);
}
