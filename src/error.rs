use thiserror::Error;

#[derive(Debug, Error)]
pub enum RatingError {
    #[error("Match requires 4 distinct players, found {distinct}")]
    IncompleteMatch { distinct: usize },

    #[error("Rank {0} is outside of 1..=4")]
    InvalidRank(i32),

    #[error("Storage error: {0}")]
    Storage(#[from] tokio_postgres::Error)
}
