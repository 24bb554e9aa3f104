use crate::{error::RatingError, model::constants::PLAYERS_PER_MATCH};
use chrono::{NaiveDate, NaiveDateTime};
use itertools::Itertools;
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerRating {
    pub player_id: i32,
    pub rating: f64,
    pub games: i32,
    /// Midnight of the game date of the match which last moved this rating
    pub last_updated: NaiveDateTime
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingHistoryEntry {
    /// Assigned on insertion
    pub id: i64,
    pub player_id: i32,
    pub game_date: NaiveDate,
    pub game_number: Option<i32>,
    pub old_rating: f64,
    pub new_rating: f64,
    pub delta: f64,
    pub opponent_ids: Vec<i32>,
    pub season: i32
}

impl RatingHistoryEntry {
    /// Comma separated, as stored in `rating_history.opponent_ids`
    pub fn opponent_ids_text(&self) -> String {
        self.opponent_ids.iter().join(",")
    }

    pub fn parse_opponent_ids(text: &str) -> Vec<i32> {
        text.split(',').filter_map(|id| id.trim().parse().ok()).collect()
    }
}

/// Identifies one match in `game_results`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct MatchKey {
    pub season: i32,
    pub game_date: NaiveDate,
    pub table_type: String,
    pub game_number: Option<i32>
}

/// One seat of a match, read from `game_results`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchRecord {
    pub id: i64,
    pub player_id: i32,
    pub rank: i32
}

/// All rows of `game_results` sharing a [`MatchKey`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchGroup {
    pub key: MatchKey,
    pub records: Vec<MatchRecord>
}

impl MatchGroup {
    /// Smallest insertion id in the group. Breaks ordering ties between
    /// matches played on the same date with the same game number.
    pub fn first_record_id(&self) -> i64 {
        self.records.iter().map(|r| r.id).min().unwrap_or(i64::MAX)
    }

    /// Chronological replay order: game date, then game number (none counts as 0),
    /// then insertion order.
    pub fn replay_order(&self) -> (NaiveDate, i32, i64) {
        (
            self.key.game_date,
            self.key.game_number.unwrap_or(0),
            self.first_record_id()
        )
    }

    /// Builds the rateable result of this group. Seats are ordered by player id.
    pub fn to_match_result(&self) -> Result<MatchResult, RatingError> {
        let records = self.records.iter().sorted_by_key(|r| (r.player_id, r.id)).collect_vec();
        let player_ids = records.iter().map(|r| r.player_id).collect_vec();
        let ranks = records.iter().map(|r| r.rank).collect_vec();

        MatchResult::new(
            &player_ids,
            &ranks,
            self.key.season,
            self.key.game_date,
            self.key.game_number
        )
    }
}

/// A decided 4-player match, ready to be rated
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub player_ids: [i32; PLAYERS_PER_MATCH],
    pub ranks: [i32; PLAYERS_PER_MATCH],
    pub season: i32,
    pub game_date: NaiveDate,
    pub game_number: Option<i32>
}

impl MatchResult {
    /// Validates that exactly 4 distinct players are present, each with one rank.
    /// Rank values are checked when the match is scored.
    pub fn new(
        player_ids: &[i32],
        ranks: &[i32],
        season: i32,
        game_date: NaiveDate,
        game_number: Option<i32>
    ) -> Result<Self, RatingError> {
        let distinct = player_ids.iter().collect::<HashSet<_>>().len();

        if player_ids.len() != PLAYERS_PER_MATCH || distinct != PLAYERS_PER_MATCH || ranks.len() != player_ids.len() {
            return Err(RatingError::IncompleteMatch { distinct });
        }

        let mut ids = [0; PLAYERS_PER_MATCH];
        let mut rks = [0; PLAYERS_PER_MATCH];
        ids.copy_from_slice(player_ids);
        rks.copy_from_slice(ranks);

        Ok(MatchResult {
            player_ids: ids,
            ranks: rks,
            season,
            game_date,
            game_number
        })
    }

    /// Player ids of everyone at the table except `seat`
    pub fn opponents_of(&self, seat: usize) -> Vec<i32> {
        self.player_ids
            .iter()
            .enumerate()
            .filter(|(s, _)| *s != seat)
            .map(|(_, id)| *id)
            .collect()
    }
}

/// Aggregate counts of a replay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
    pub replayed: usize,
    pub skipped: usize
}

impl ReplaySummary {
    pub fn total(&self) -> usize {
        self.replayed + self.skipped
    }
}

/// Consistency report of the rating tables against `game_results`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RatingStatus {
    pub record_rows: i64,
    pub match_groups: i64,
    pub rated_groups: i64,
    pub pending_groups: i64,
    pub rated_players: i64,
    pub games_sum: i64,
    pub needs_recompute: bool
}

impl RatingStatus {
    pub fn new(
        record_rows: i64,
        match_groups: i64,
        rated_groups: i64,
        pending_groups: i64,
        rated_players: i64,
        games_sum: i64
    ) -> Self {
        // Every rated group contributes exactly one game to each of its 4 players
        let needs_recompute = pending_groups > 0 || games_sum != rated_groups * PLAYERS_PER_MATCH as i64;

        RatingStatus {
            record_rows,
            match_groups,
            rated_groups,
            pending_groups,
            rated_players,
            games_sum,
            needs_recompute
        }
    }
}
