/// Logistic Elo math for a single two-item duel.
///
/// Pure functions over plain ratings. `RatingEngine` owns the records and
/// decides which outcome to apply.
use crate::constants::ELO_SCALE;

/// Actual score for a duel, from the perspective of the first item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    /// First item won.
    Win,
    /// Neither item won; both score 0.5.
    Draw,
}

impl Outcome {
    fn score(self) -> f64 {
        match self {
            Outcome::Win => 1.0,
            Outcome::Draw => 0.5,
        }
    }
}

/// Expected score of `rating_a` against `rating_b`:
/// `1 / (1 + 10^((Rb - Ra) / 400))`.
pub fn expected_score(rating_a: f64, rating_b: f64) -> f64 {
    1.0 / (1.0 + 10f64.powf((rating_b - rating_a) / ELO_SCALE))
}

/// New ratings for `(a, b)` after a duel that `a` scored `outcome` in.
///
/// `Eb` is derived as `1 - Ea` and b's actual score as `1 - score_a`, so the
/// two deltas are exact negations of each other and the rating sum is kept.
pub fn rate(rating_a: f64, rating_b: f64, outcome: Outcome, k: f64) -> (f64, f64) {
    let expected_a = expected_score(rating_a, rating_b);
    let expected_b = 1.0 - expected_a;
    let score_a = outcome.score();
    let score_b = 1.0 - score_a;

    (
        rating_a + k * (score_a - expected_a),
        rating_b + k * (score_b - expected_b),
    )
}
