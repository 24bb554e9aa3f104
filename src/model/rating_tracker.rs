use std::cmp::Ordering;

use indexmap::IndexMap;
use itertools::Itertools;

use crate::{
    database::db_structs::{PlayerRating, RatingHistoryEntry},
    model::constants::{DEFAULT_RATING, PLAYERS_PER_MATCH}
};

/// In-memory rating state: the current rating of every rated player and the
/// append-only history of rating changes.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingTracker {
    // Keyed by player id, in order of first rating
    ratings: IndexMap<i32, PlayerRating>,
    history: Vec<RatingHistoryEntry>,
    next_history_id: i64
}

impl Default for RatingTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl RatingTracker {
    pub fn new() -> RatingTracker {
        RatingTracker {
            ratings: IndexMap::new(),
            history: Vec::new(),
            next_history_id: 1
        }
    }

    /// Seeds the tracker with already persisted ratings. History ids continue after `last_history_id`.
    pub fn from_ratings(ratings: &[PlayerRating], last_history_id: i64) -> RatingTracker {
        let mut tracker = RatingTracker::new();
        for rating in ratings {
            tracker.ratings.insert(rating.player_id, rating.clone());
        }
        tracker.next_history_id = last_history_id + 1;

        tracker
    }

    /// Forgets every rating and history entry. All players return to the default rating.
    pub fn reset(&mut self) {
        *self = RatingTracker::new();
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty() && self.history.is_empty()
    }

    /// Stored rating of a player, `None` if they were never rated
    pub fn get_player_rating(&self, player_id: i32) -> Option<&PlayerRating> {
        self.ratings.get(&player_id)
    }

    /// Returns `(rating, games)`. Unrated players are at the default rating with 0 games.
    pub fn get_rating(&self, player_id: i32) -> (f64, i32) {
        self.ratings
            .get(&player_id)
            .map_or((DEFAULT_RATING, 0), |r| (r.rating, r.games))
    }

    /// Current ratings of all seats, read at once before a match is applied
    pub fn snapshot(&self, player_ids: &[i32; PLAYERS_PER_MATCH]) -> [f64; PLAYERS_PER_MATCH] {
        player_ids.map(|id| self.get_rating(id).0)
    }

    /// Stores the new ratings and appends history entries for one match.
    /// Returns the inserted entries with their ids assigned.
    pub fn insert_or_update(
        &mut self,
        ratings: &[PlayerRating],
        entries: Vec<RatingHistoryEntry>
    ) -> Vec<RatingHistoryEntry> {
        for rating in ratings {
            self.ratings.insert(rating.player_id, rating.clone());
        }

        let mut inserted = Vec::with_capacity(entries.len());
        for mut entry in entries {
            entry.id = self.next_history_id;
            self.next_history_id += 1;
            self.history.push(entry.clone());
            inserted.push(entry);
        }

        inserted
    }

    /// Returns up to `limit` history entries of a player ordered by
    /// (game date, game number, id), oldest first.
    pub fn get_history(&self, player_id: i32, limit: usize) -> Vec<RatingHistoryEntry> {
        self.history
            .iter()
            .filter(|e| e.player_id == player_id)
            .sorted_by(|a, b| Self::history_order(a, b))
            .take(limit)
            .cloned()
            .collect()
    }

    /// All ratings, highest first. Equal ratings are ordered by player id.
    pub fn leaderboard(&self) -> Vec<PlayerRating> {
        self.ratings
            .values()
            .sorted_by(|a, b| {
                b.rating
                    .partial_cmp(&a.rating)
                    .unwrap_or(Ordering::Equal)
                    .then(a.player_id.cmp(&b.player_id))
            })
            .cloned()
            .collect()
    }

    /// All ratings ordered by player id, the order in which they are persisted
    pub fn ratings(&self) -> Vec<PlayerRating> {
        self.ratings.values().sorted_by_key(|r| r.player_id).cloned().collect()
    }

    /// The full history in insertion order
    pub fn history(&self) -> &[RatingHistoryEntry] {
        &self.history
    }

    fn history_order(a: &RatingHistoryEntry, b: &RatingHistoryEntry) -> Ordering {
        a.game_date
            .cmp(&b.game_date)
            .then(a.game_number.unwrap_or(0).cmp(&b.game_number.unwrap_or(0)))
            .then(a.id.cmp(&b.id))
    }
}
