use chrono::NaiveTime;
use tracing::{debug, warn};

use crate::{
    database::db_structs::{MatchGroup, MatchKey, MatchResult, PlayerRating, RatingHistoryEntry, ReplaySummary},
    error::RatingError,
    model::{
        constants::{K_FACTOR, PLAYERS_PER_MATCH},
        expected::expected_scores,
        rating_tracker::RatingTracker,
        scoring::actual_scores
    },
    utils::progress_utils::progress_bar
};

/// Everything one rated match changed
#[derive(Debug, Clone, PartialEq)]
pub struct MatchUpdate {
    pub ratings: Vec<PlayerRating>,
    pub entries: Vec<RatingHistoryEntry>
}

/// Outcome of processing a sequence of match groups
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessResult {
    pub summary: ReplaySummary,
    pub rated: Vec<MatchKey>,
    pub skipped: Vec<MatchKey>,
    pub updates: Vec<MatchUpdate>
}

pub struct RatingModel {
    pub rating_tracker: RatingTracker,
    show_progress: bool
}

impl Default for RatingModel {
    fn default() -> Self {
        Self::new(RatingTracker::new())
    }
}

impl RatingModel {
    pub fn new(rating_tracker: RatingTracker) -> RatingModel {
        RatingModel {
            rating_tracker,
            show_progress: false
        }
    }

    /// Draws a progress bar while processing
    pub fn with_progress(mut self, show_progress: bool) -> RatingModel {
        self.show_progress = show_progress;
        self
    }

    /// Rating changes of the 4 seats of a match.
    ///
    /// Every expected score comes from the same pre-match ratings, so the
    /// order in which seats are updated does not matter.
    pub fn rate(
        ratings: &[f64; PLAYERS_PER_MATCH],
        ranks: &[i32; PLAYERS_PER_MATCH]
    ) -> Result<[f64; PLAYERS_PER_MATCH], RatingError> {
        let actual = actual_scores(ranks)?;
        let expected = expected_scores(ratings);

        let mut deltas = [0.0; PLAYERS_PER_MATCH];
        for seat in 0..PLAYERS_PER_MATCH {
            deltas[seat] = K_FACTOR * (actual[seat] - expected[seat]);
        }

        Ok(deltas)
    }

    /// # Match Processing
    ///
    /// Applies one decided match to the tracker.
    ///
    /// Steps:
    /// 1. Read the current rating of all 4 players as one snapshot.
    /// 2. Compute each player's delta from the snapshot ([`RatingModel::rate`]).
    /// 3. Store the 4 new ratings, each with one more game played, and append one
    ///    history entry per player.
    ///
    /// Invalid ranks are rejected before anything is stored. Applying the same
    /// match twice rates it twice.
    pub fn apply_match(&mut self, result: &MatchResult) -> Result<MatchUpdate, RatingError> {
        let snapshot = self.rating_tracker.snapshot(&result.player_ids);
        let deltas = Self::rate(&snapshot, &result.ranks)?;
        let last_updated = result.game_date.and_time(NaiveTime::MIN);

        let mut ratings = Vec::with_capacity(PLAYERS_PER_MATCH);
        let mut entries = Vec::with_capacity(PLAYERS_PER_MATCH);

        for (seat, player_id) in result.player_ids.iter().enumerate() {
            let (old_rating, games) = self.rating_tracker.get_rating(*player_id);
            let new_rating = old_rating + deltas[seat];

            ratings.push(PlayerRating {
                player_id: *player_id,
                rating: new_rating,
                games: games + 1,
                last_updated
            });

            entries.push(RatingHistoryEntry {
                id: 0,
                player_id: *player_id,
                game_date: result.game_date,
                game_number: result.game_number,
                old_rating,
                new_rating,
                delta: deltas[seat],
                opponent_ids: result.opponents_of(seat),
                season: result.season
            });
        }

        let entries = self.rating_tracker.insert_or_update(&ratings, entries);

        Ok(MatchUpdate { ratings, entries })
    }

    /// Rates the groups in the given order. Each match sees the ratings left by the
    /// previous ones. Groups which are not a complete, valid 4-player match are
    /// skipped and counted.
    pub fn process(&mut self, groups: &[MatchGroup]) -> ProcessResult {
        let bar = if self.show_progress {
            progress_bar(groups.len() as u64, "Replaying matches".to_string())
        } else {
            None
        };
        let mut result = ProcessResult::default();

        for group in groups {
            match group.to_match_result().and_then(|m| self.apply_match(&m)) {
                Ok(update) => {
                    debug!(key = ?group.key, "Rated match");
                    result.summary.replayed += 1;
                    result.rated.push(group.key.clone());
                    result.updates.push(update);
                }
                // The tracker never touches storage, so every error here only concerns this group
                Err(e) => {
                    warn!(key = ?group.key, error = %e, "Skipping match");
                    result.summary.skipped += 1;
                    result.skipped.push(group.key.clone());
                }
            }

            if let Some(bar) = &bar {
                bar.inc(1);
            }
        }

        if let Some(bar) = bar {
            bar.finish();
        }

        result
    }
}
