use crate::database::db_structs::{MatchGroup, MatchKey, MatchRecord, PlayerRating};
use chrono::{Duration, NaiveDate, NaiveTime};
use rand::{seq::SliceRandom, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub const TEST_TABLE_TYPE: &str = "regular";

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("Expected a valid test date")
}

pub fn generate_player_rating(player_id: i32, rating: f64, games: i32) -> PlayerRating {
    PlayerRating {
        player_id,
        rating,
        games,
        last_updated: date(2024, 1, 1).and_time(NaiveTime::MIN)
    }
}

/// Builds a match group from `(player_id, rank)` seats. Record ids count up from `first_id`.
pub fn generate_group(
    season: i32,
    game_date: NaiveDate,
    game_number: Option<i32>,
    first_id: i64,
    seats: &[(i32, i32)]
) -> MatchGroup {
    let records = seats
        .iter()
        .enumerate()
        .map(|(i, (player_id, rank))| MatchRecord {
            id: first_id + i as i64,
            player_id: *player_id,
            rank: *rank
        })
        .collect();

    MatchGroup {
        key: MatchKey {
            season,
            game_date,
            table_type: TEST_TABLE_TYPE.to_string(),
            game_number
        },
        records
    }
}

/// Generates `n` complete matches between random tables of 4 from `player_ids`,
/// three games per day starting on 2024-01-01. Roughly one in ten matches has a
/// tie for second place. The same seed always gives the same history.
pub fn generate_groups(n: i32, player_ids: &[i32], seed: u64) -> Vec<MatchGroup> {
    if player_ids.len() < 4 {
        panic!("At least 4 players are needed to generate matches");
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut groups = Vec::with_capacity(n as usize);

    for i in 0..n {
        let mut pool = player_ids.to_vec();
        pool.shuffle(&mut rng);

        let mut ranks = if rng.random_range(0..10) == 0 {
            vec![1, 2, 2, 4]
        } else {
            vec![1, 2, 3, 4]
        };
        ranks.shuffle(&mut rng);

        let seats = pool.iter().take(4).copied().zip(ranks).collect::<Vec<_>>();
        let game_date = date(2024, 1, 1) + Duration::days((i / 3) as i64);

        groups.push(generate_group(
            2024,
            game_date,
            Some(i % 3 + 1),
            (i * 4 + 1) as i64,
            &seats
        ));
    }

    groups
}
