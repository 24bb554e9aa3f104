use crate::model::constants::{LOGISTIC_SCALE, PLACEMENT_SCORES, PLAYERS_PER_MATCH};

/// Probability that a player rated `rating` beats a player rated `opponent`
/// in a pairwise comparison.
pub fn win_probability(rating: f64, opponent: f64) -> f64 {
    1.0 / (1.0 + 10f64.powf((opponent - rating) / LOGISTIC_SCALE))
}

/// Average pairwise win probability of every seat against the other three
pub fn seat_win_probabilities(ratings: &[f64; PLAYERS_PER_MATCH]) -> [f64; PLAYERS_PER_MATCH] {
    let mut probabilities = [0.0; PLAYERS_PER_MATCH];

    for (seat, rating) in ratings.iter().enumerate() {
        let total: f64 = ratings
            .iter()
            .enumerate()
            .filter(|(other, _)| *other != seat)
            .map(|(_, opponent)| win_probability(*rating, *opponent))
            .sum();

        probabilities[seat] = total / (PLAYERS_PER_MATCH - 1) as f64;
    }

    probabilities
}

/// # Expected placement scores
///
/// Computes the expected placement score of every seat from one arrangement of ratings.
///
/// 1. Each seat's average pairwise win probability against the other three.
/// 2. The raw score of seat `i` is the win probability vector weighted with the
///    placement scores rotated by `i`: `raw_i = sum_k p_k * S[(k + i) % 4]`.
/// 3. The raw scores are centered on their mean, so the result always sums to 0
///    as the actual placement scores do.
///
/// The function is total: any finite ratings give finite scores. Seats are positional,
/// so callers must pass the players of a match in a stable order.
pub fn expected_scores(ratings: &[f64; PLAYERS_PER_MATCH]) -> [f64; PLAYERS_PER_MATCH] {
    let probabilities = seat_win_probabilities(ratings);

    let mut raw = [0.0; PLAYERS_PER_MATCH];
    for (seat, score) in raw.iter_mut().enumerate() {
        *score = probabilities
            .iter()
            .enumerate()
            .map(|(k, p)| p * PLACEMENT_SCORES[(k + seat) % PLAYERS_PER_MATCH])
            .sum();
    }

    let mean = raw.iter().sum::<f64>() / PLAYERS_PER_MATCH as f64;
    raw.map(|score| score - mean)
}

/// Expected placement score of a player seated first, against three opponents
pub fn expected_score(rating: f64, opponents: &[f64; PLAYERS_PER_MATCH - 1]) -> f64 {
    let ratings = [rating, opponents[0], opponents[1], opponents[2]];
    expected_scores(&ratings)[0]
}
