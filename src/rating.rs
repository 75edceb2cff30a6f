//! Pure ELO update, independent of any bracket state.

use serde::{Deserialize, Serialize};

pub const DEFAULT_RATING: f64 = 1500.0;

pub const K_FACTOR: f64 = 32.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
  AWins,
  BWins,
  Draw,
}

impl Outcome {
  /// Score from a's side: 1 for a win, 0.5 for a draw, 0 for a loss.
  fn score_a(self) -> f64 {
    match self {
      Outcome::AWins => 1.0,
      Outcome::BWins => 0.0,
      Outcome::Draw => 0.5,
    }
  }
}

/// Expected score of a rated `rating_a` against `rating_b`.
pub fn expected_score(rating_a: f64, rating_b: f64) -> f64 {
  1.0 / (1.0 + 10f64.powf((rating_b - rating_a) / 400.0))
}

/// Returns the new `(rating_a, rating_b)`. The change is zero-sum.
pub fn rate(rating_a: f64, rating_b: f64, outcome: Outcome, k_factor: f64) -> (f64, f64) {
  let delta = k_factor * (outcome.score_a() - expected_score(rating_a, rating_b));
  (rating_a + delta, rating_b - delta)
}
