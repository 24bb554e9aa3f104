use crate::{
    error::RatingError,
    model::{constants::PLAYERS_PER_MATCH, structures::placement::Placement}
};
use itertools::Itertools;
use strum::IntoEnumIterator;

/// Maps the final ranks of a match to actual placement scores, seat by seat.
///
/// Players sharing a rank split the scores of the positions they jointly occupy.
/// Positions are assigned by sorting the ranks, so `[1, 2, 2, 4]` puts the tied
/// players on positions 2 and 3 and both receive `mean(0.5, -1.5) = -0.5`.
/// Because every position is handed out exactly once, the 4 scores always sum to 0.
pub fn actual_scores(ranks: &[i32; PLAYERS_PER_MATCH]) -> Result<[f64; PLAYERS_PER_MATCH], RatingError> {
    for rank in ranks {
        Placement::try_from(*rank).map_err(|_| RatingError::InvalidRank(*rank))?;
    }

    let positions: Vec<f64> = Placement::iter().map(|p| p.score()).collect();
    let seats_by_rank = (0..PLAYERS_PER_MATCH).sorted_by_key(|&seat| ranks[seat]).collect_vec();

    let mut scores = [0.0; PLAYERS_PER_MATCH];
    let mut position = 0;
    for (_, block) in &seats_by_rank.iter().chunk_by(|&&seat| ranks[seat]) {
        let seats = block.copied().collect_vec();
        let occupied = &positions[position..position + seats.len()];
        let score = occupied.iter().sum::<f64>() / occupied.len() as f64;

        for seat in &seats {
            scores[*seat] = score;
        }

        position += seats.len();
    }

    Ok(scores)
}
