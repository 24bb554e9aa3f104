use super::db_structs::{
    MatchGroup, MatchKey, MatchRecord, MatchResult, PlayerRating, RatingHistoryEntry, RatingStatus, ReplaySummary
};
use crate::{
    error::RatingError,
    model::{
        constants::{DEFAULT_RATING, RATING_LOCK_KEY},
        rating_model::{MatchUpdate, RatingModel},
        rating_tracker::RatingTracker,
        replay
    }
};
use indexmap::IndexMap;
use postgres_types::ToSql;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_postgres::{Client, Error, NoTls, Row, Transaction};
use tracing::{error, info, warn};

const SCHEMA: &str = include_str!("schema.sql");

const MATCH_RECORDS_QUERY: &str = "
    SELECT id, season, game_date, table_type, game_number, player_id, rank
    FROM game_results
    ORDER BY id";

// Every row of a group which has at least one row not yet rated
const PENDING_MATCH_RECORDS_QUERY: &str = "
    SELECT gr.id, gr.season, gr.game_date, gr.table_type, gr.game_number, gr.player_id, gr.rank
    FROM game_results gr
    WHERE EXISTS (
        SELECT 1 FROM game_results p
        WHERE p.season = gr.season AND p.game_date = gr.game_date AND p.table_type = gr.table_type
          AND p.game_number IS NOT DISTINCT FROM gr.game_number AND NOT p.rating_calculated
    )
    ORDER BY gr.id";

/// Access to the rating tables and the match records they are derived from.
///
/// Every operation runs in its own transaction. Writers additionally take a
/// transaction scoped advisory lock, so rating updates are serialized across
/// processes as well as within this one.
#[derive(Clone)]
pub struct DbClient {
    client: Arc<Mutex<Client>>,
    show_progress: bool
}

impl DbClient {
    // Connect to the database and return a DbClient instance
    pub async fn connect(connection_str: &str) -> Result<Self, Error> {
        let (client, connection) = tokio_postgres::connect(connection_str, NoTls).await?;

        // Spawn the connection object to run in the background
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("connection error: {}", e);
            }
        });

        Ok(DbClient {
            client: Arc::new(Mutex::new(client)),
            show_progress: false
        })
    }

    /// Draws a progress bar while replaying matches
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Creates the rating tables and the match record table if they do not exist
    pub async fn init_schema(&self) -> Result<(), RatingError> {
        let client = self.client.lock().await;
        client.batch_execute(SCHEMA).await?;

        info!("Schema initialized");
        Ok(())
    }

    /// Rates one decided match and persists the 4 new ratings and history entries
    /// in a single transaction. Nothing is written if the match is invalid.
    ///
    /// The caller is responsible for not applying the same match twice.
    pub async fn apply_match(&self, result: &MatchResult) -> Result<MatchUpdate, RatingError> {
        let mut client = self.client.lock().await;
        let tx = client.transaction().await?;
        Self::lock_ratings(&tx).await?;

        let snapshot = Self::ratings_for_update(&tx, Some(result.player_ids.as_slice())).await?;
        let mut model = RatingModel::new(RatingTracker::from_ratings(&snapshot, 0));
        let update = model.apply_match(result)?;
        let update = Self::write_update(&tx, update).await?;

        tx.commit().await?;

        info!(
            players = ?result.player_ids,
            game_date = %result.game_date,
            game_number = ?result.game_number,
            "Applied match"
        );
        Ok(update)
    }

    /// Rates every match group that is not marked `rating_calculated` yet, in
    /// chronological order, on top of the current ratings.
    pub async fn apply_pending(&self) -> Result<ReplaySummary, RatingError> {
        let mut client = self.client.lock().await;
        let tx = client.transaction().await?;
        Self::lock_ratings(&tx).await?;

        let groups = replay::chronological(Self::match_groups(&tx, PENDING_MATCH_RECORDS_QUERY).await?);
        info!("Found {} pending match groups", groups.len());

        let current = Self::ratings_for_update(&tx, None).await?;
        let mut model = RatingModel::new(RatingTracker::from_ratings(&current, 0)).with_progress(self.show_progress);
        let result = model.process(&groups);

        for update in result.updates {
            Self::write_update(&tx, update).await?;
        }
        Self::mark_groups(&tx, &result.rated, true).await?;

        tx.commit().await?;

        info!(
            replayed = result.summary.replayed,
            skipped = result.summary.skipped,
            "Pending matches applied"
        );
        Ok(result.summary)
    }

    /// # Full recompute
    ///
    /// Wipes all ratings and history, replays the complete match history in
    /// chronological order and flags exactly the rated groups as
    /// `rating_calculated`. The whole operation is one transaction: a failure
    /// leaves the previous state untouched and readers never see it half done.
    pub async fn recompute_all(&self) -> Result<ReplaySummary, RatingError> {
        let mut client = self.client.lock().await;
        let tx = client.transaction().await?;
        Self::lock_ratings(&tx).await?;

        let groups = Self::match_groups(&tx, MATCH_RECORDS_QUERY).await?;
        info!("Loaded {} match groups", groups.len());

        tx.batch_execute("TRUNCATE TABLE player_ratings, rating_history RESTART IDENTITY")
            .await?;
        info!("Truncated the player_ratings and rating_history tables!");

        let (tracker, result) = replay::recompute_all(RatingTracker::new(), groups, self.show_progress).into_parts();

        Self::save_ratings(&tx, &tracker.ratings()).await?;
        Self::save_history(&tx, tracker.history()).await?;

        tx.execute("UPDATE game_results SET rating_calculated = FALSE", &[])
            .await?;
        Self::mark_groups(&tx, &result.rated, true).await?;

        tx.commit().await?;

        if result.summary.skipped > 0 {
            warn!(
                "{} match groups were skipped because they are not complete 4 player matches",
                result.summary.skipped
            );
        }
        Ok(result.summary)
    }

    /// Returns `(rating, games)`. Players without a stored rating are at the default rating with 0 games.
    pub async fn get_rating(&self, player_id: i32) -> Result<(f64, i32), RatingError> {
        let client = self.client.lock().await;
        let row = client
            .query_opt(
                "SELECT rating, games FROM player_ratings WHERE player_id = $1",
                &[&player_id]
            )
            .await?;

        Ok(row.map_or((DEFAULT_RATING, 0), |r| (r.get("rating"), r.get("games"))))
    }

    /// The first `limit` history entries of a player, ordered by game date, game number and id
    pub async fn get_history(&self, player_id: i32, limit: i64) -> Result<Vec<RatingHistoryEntry>, RatingError> {
        let client = self.client.lock().await;
        let rows = client
            .query(
                "SELECT id, player_id, game_date, game_number, old_rating, new_rating, delta, opponent_ids, season \
                 FROM rating_history WHERE player_id = $1 \
                 ORDER BY game_date, COALESCE(game_number, 0), id LIMIT $2",
                &[&player_id, &limit]
            )
            .await?;

        Ok(rows.iter().map(Self::history_from_row).collect())
    }

    /// All ratings, highest first
    pub async fn get_leaderboard(&self) -> Result<Vec<PlayerRating>, RatingError> {
        let client = self.client.lock().await;
        let rows = client
            .query(
                "SELECT player_id, rating, games, last_updated FROM player_ratings ORDER BY rating DESC, player_id",
                &[]
            )
            .await?;

        Ok(rows.iter().map(Self::rating_from_row).collect())
    }

    /// Compares the rating tables against the match records
    pub async fn status(&self) -> Result<RatingStatus, RatingError> {
        let client = self.client.lock().await;
        let row = client
            .query_one(
                "SELECT
                    (SELECT COUNT(*) FROM game_results) AS record_rows,
                    COUNT(*) AS match_groups,
                    COUNT(*) FILTER (WHERE rated) AS rated_groups,
                    COUNT(*) FILTER (WHERE NOT rated AND rateable) AS pending_groups,
                    (SELECT COUNT(*) FROM player_ratings WHERE games > 0) AS rated_players,
                    (SELECT COALESCE(SUM(games), 0)::BIGINT FROM player_ratings) AS games_sum
                FROM (
                    SELECT bool_and(rating_calculated) AS rated,
                           COUNT(*) = 4 AND COUNT(DISTINCT player_id) = 4 AND bool_and(rank BETWEEN 1 AND 4) AS rateable
                    FROM game_results
                    GROUP BY season, game_date, table_type, game_number
                ) g",
                &[]
            )
            .await?;

        Ok(RatingStatus::new(
            row.get("record_rows"),
            row.get("match_groups"),
            row.get("rated_groups"),
            row.get("pending_groups"),
            row.get("rated_players"),
            row.get("games_sum")
        ))
    }

    async fn lock_ratings(tx: &Transaction<'_>) -> Result<(), Error> {
        tx.execute("SELECT pg_advisory_xact_lock($1)", &[&RATING_LOCK_KEY])
            .await?;
        Ok(())
    }

    /// Reads and row-locks the stored ratings of the given players, or of everyone
    async fn ratings_for_update(tx: &Transaction<'_>, player_ids: Option<&[i32]>) -> Result<Vec<PlayerRating>, Error> {
        let rows = match player_ids {
            Some(ids) => {
                let ids = ids.to_vec();
                tx.query(
                    "SELECT player_id, rating, games, last_updated FROM player_ratings \
                     WHERE player_id = ANY($1) ORDER BY player_id FOR UPDATE",
                    &[&ids]
                )
                .await?
            }
            None => {
                tx.query(
                    "SELECT player_id, rating, games, last_updated FROM player_ratings \
                     ORDER BY player_id FOR UPDATE",
                    &[]
                )
                .await?
            }
        };

        Ok(rows.iter().map(Self::rating_from_row).collect())
    }

    /// Loads match records and groups them by match key, in order of first appearance
    async fn match_groups(tx: &Transaction<'_>, query: &str) -> Result<Vec<MatchGroup>, Error> {
        let rows = tx.query(query, &[]).await?;
        let mut groups: IndexMap<MatchKey, Vec<MatchRecord>> = IndexMap::new();

        for row in rows {
            let key = MatchKey {
                season: row.get("season"),
                game_date: row.get("game_date"),
                table_type: row.get("table_type"),
                game_number: row.get("game_number")
            };

            groups.entry(key).or_default().push(MatchRecord {
                id: row.get("id"),
                player_id: row.get("player_id"),
                rank: row.get("rank")
            });
        }

        Ok(groups
            .into_iter()
            .map(|(key, records)| MatchGroup { key, records })
            .collect())
    }

    /// Persists one match's ratings and history, returning the entries with their database ids
    async fn write_update(tx: &Transaction<'_>, update: MatchUpdate) -> Result<MatchUpdate, Error> {
        Self::save_ratings(tx, &update.ratings).await?;
        let entries = Self::save_history(tx, &update.entries).await?;

        Ok(MatchUpdate {
            ratings: update.ratings,
            entries
        })
    }

    async fn save_ratings(tx: &Transaction<'_>, ratings: &[PlayerRating]) -> Result<(), Error> {
        let statement = tx
            .prepare(
                "INSERT INTO player_ratings (player_id, rating, games, last_updated) VALUES ($1, $2, $3, $4) \
                 ON CONFLICT (player_id) DO UPDATE SET rating = EXCLUDED.rating, games = EXCLUDED.games, \
                 last_updated = EXCLUDED.last_updated"
            )
            .await?;

        for rating in ratings {
            let values: &[&(dyn ToSql + Sync)] =
                &[&rating.player_id, &rating.rating, &rating.games, &rating.last_updated];
            tx.execute(&statement, values).await?;
        }

        Ok(())
    }

    async fn save_history(tx: &Transaction<'_>, entries: &[RatingHistoryEntry]) -> Result<Vec<RatingHistoryEntry>, Error> {
        let statement = tx
            .prepare(
                "INSERT INTO rating_history (player_id, game_date, old_rating, new_rating, delta, opponent_ids, season, game_number) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING id"
            )
            .await?;

        let mut saved = Vec::with_capacity(entries.len());
        for entry in entries {
            let opponent_ids = entry.opponent_ids_text();
            let values: &[&(dyn ToSql + Sync)] = &[
                &entry.player_id,
                &entry.game_date,
                &entry.old_rating,
                &entry.new_rating,
                &entry.delta,
                &opponent_ids,
                &entry.season,
                &entry.game_number
            ];

            let row = tx.query_one(&statement, values).await?;
            saved.push(RatingHistoryEntry {
                id: row.get("id"),
                ..entry.clone()
            });
        }

        Ok(saved)
    }

    async fn mark_groups(tx: &Transaction<'_>, keys: &[MatchKey], rated: bool) -> Result<(), Error> {
        let statement = tx
            .prepare(
                "UPDATE game_results SET rating_calculated = $5 \
                 WHERE season = $1 AND game_date = $2 AND table_type = $3 AND game_number IS NOT DISTINCT FROM $4"
            )
            .await?;

        for key in keys {
            let values: &[&(dyn ToSql + Sync)] =
                &[&key.season, &key.game_date, &key.table_type, &key.game_number, &rated];
            tx.execute(&statement, values).await?;
        }

        Ok(())
    }

    fn rating_from_row(row: &Row) -> PlayerRating {
        PlayerRating {
            player_id: row.get("player_id"),
            rating: row.get("rating"),
            games: row.get("games"),
            last_updated: row.get("last_updated")
        }
    }

    fn history_from_row(row: &Row) -> RatingHistoryEntry {
        RatingHistoryEntry {
            id: row.get("id"),
            player_id: row.get("player_id"),
            game_date: row.get("game_date"),
            game_number: row.get("game_number"),
            old_rating: row.get("old_rating"),
            new_rating: row.get("new_rating"),
            delta: row.get("delta"),
            opponent_ids: RatingHistoryEntry::parse_opponent_ids(row.get("opponent_ids")),
            season: row.get("season")
        }
    }

    // Access the underlying Client
    pub fn client(&self) -> Arc<Mutex<Client>> {
        Arc::clone(&self.client)
    }
}
