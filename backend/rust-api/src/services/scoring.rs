//! Points awarded per answer.
//!
//! Human answers are scored deterministically from the time left on the
//! clock. Simulated opponents draw their bonus at random so their scores
//! stay unpredictable.

use rand::Rng;

pub const BASE_POINTS: u32 = 1000;

/// Maximum speed bonus for a human answer given the instant the turn starts.
pub const TIME_BONUS_CAP: u32 = 500;

/// Width of the random bonus band for simulated opponents: a correct
/// opponent answer is worth `BASE_POINTS..BASE_POINTS + OPPONENT_BONUS_SPAN`.
pub const OPPONENT_BONUS_SPAN: u32 = 500;

/// `BASE_POINTS + round(time_remaining / time_limit * TIME_BONUS_CAP)` for a
/// correct answer, zero otherwise.
pub fn score(correct: bool, time_remaining: u32, time_limit: u32) -> u32 {
    if !correct {
        return 0;
    }
    if time_limit == 0 {
        return BASE_POINTS;
    }
    let ratio = time_remaining.min(time_limit) as f64 / time_limit as f64;
    BASE_POINTS + (ratio * TIME_BONUS_CAP as f64).round() as u32
}

pub fn opponent_score<R: Rng>(rng: &mut R, correct: bool) -> u32 {
    if !correct {
        return 0;
    }
    BASE_POINTS + rng.random_range(0..OPPONENT_BONUS_SPAN)
}
