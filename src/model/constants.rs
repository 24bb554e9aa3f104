// Model constants
pub const DEFAULT_RATING: f64 = 1500.0;
pub const K_FACTOR: f64 = 8.0;
/// Rating difference at which the stronger player is 10x as likely to win a pairwise comparison
pub const LOGISTIC_SCALE: f64 = 400.0;
/// Placement scores for 1st through 4th. They sum to 0.
pub const PLACEMENT_SCORES: [f64; 4] = [4.5, 0.5, -1.5, -3.5];
pub const PLAYERS_PER_MATCH: usize = 4;
/// Key for `pg_advisory_xact_lock`, shared by every writer of the rating tables
pub const RATING_LOCK_KEY: i64 = 0x5241_5449_4e47;
