use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::time::Duration;

use super::scoring;
use crate::models::lobby::RoomCode;
use crate::models::player::PlayerId;
use crate::models::Difficulty;

/// Shortest delay before a simulated opponent answers.
pub const MIN_ANSWER_DELAY: Duration = Duration::from_millis(800);

/// Extra delay window per second of the turn's time limit.
pub const DELAY_PER_LIMIT_SECOND: Duration = Duration::from_millis(400);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpponentAnswer {
    pub correct: bool,
    pub points: u32,
}

/// Source of every random decision in a session: opponent timing and
/// correctness, room codes and option order. Seed it to replay a session
/// exactly.
#[derive(Debug)]
pub struct OpponentEngine {
    rng: StdRng,
}

impl OpponentEngine {
    pub fn new(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::seeded(seed),
            None => Self {
                rng: StdRng::from_os_rng(),
            },
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Probability that a simulated opponent answers correctly.
    pub fn accuracy(difficulty: Difficulty) -> f64 {
        match difficulty {
            Difficulty::Hard => 0.4,
            Difficulty::Easy | Difficulty::Medium => 0.7,
        }
    }

    /// Uniform in `[800ms, 800ms + time_limit * 400ms]`.
    pub fn answer_delay(&mut self, time_limit: u32) -> Duration {
        let min = MIN_ANSWER_DELAY.as_millis() as u64;
        let spread = DELAY_PER_LIMIT_SECOND.as_millis() as u64 * time_limit as u64;
        Duration::from_millis(self.rng.random_range(min..=min + spread))
    }

    /// One answer delay per opponent for the turn about to start.
    pub fn plan_turn(&mut self, opponents: &[PlayerId], time_limit: u32) -> Vec<(PlayerId, Duration)> {
        opponents
            .iter()
            .map(|&player| (player, self.answer_delay(time_limit)))
            .collect()
    }

    /// Draws correctness and points at the moment an opponent's timer fires.
    pub fn resolve(&mut self, difficulty: Difficulty) -> OpponentAnswer {
        let correct = self.rng.random_bool(Self::accuracy(difficulty));
        OpponentAnswer {
            correct,
            points: scoring::opponent_score(&mut self.rng, correct),
        }
    }

    pub fn room_code(&mut self) -> RoomCode {
        RoomCode::generate(&mut self.rng)
    }

    /// Display order for a question's options.
    pub fn shuffled_order(&mut self, len: usize) -> Vec<usize> {
        let mut order: Vec<usize> = (0..len).collect();
        order.shuffle(&mut self.rng);
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_stay_inside_window() {
        let mut engine = OpponentEngine::seeded(3);
        for limit in [15, 30, 60] {
            let max = Duration::from_millis(800 + limit as u64 * 400);
            for _ in 0..200 {
                let delay = engine.answer_delay(limit);
                assert!(delay >= MIN_ANSWER_DELAY && delay <= max, "{:?}", delay);
            }
        }
    }

    #[test]
    fn same_seed_replays_same_decisions() {
        let mut first = OpponentEngine::seeded(99);
        let mut second = OpponentEngine::seeded(99);
        let opponents = [PlayerId(1), PlayerId(2), PlayerId(3)];

        assert_eq!(first.plan_turn(&opponents, 30), second.plan_turn(&opponents, 30));
        for _ in 0..10 {
            assert_eq!(
                first.resolve(Difficulty::Hard),
                second.resolve(Difficulty::Hard)
            );
        }
    }

    #[test]
    fn hard_opponents_miss_more_often() {
        let mut engine = OpponentEngine::seeded(11);
        let rounds = 4000;
        let hits = |engine: &mut OpponentEngine, difficulty| {
            (0..rounds)
                .filter(|_| engine.resolve(difficulty).correct)
                .count() as f64
                / rounds as f64
        };

        let hard = hits(&mut engine, Difficulty::Hard);
        let easy = hits(&mut engine, Difficulty::Easy);

        assert!((hard - 0.4).abs() < 0.05, "hard accuracy {}", hard);
        assert!((easy - 0.7).abs() < 0.05, "easy accuracy {}", easy);
    }

    #[test]
    fn points_follow_correctness() {
        let mut engine = OpponentEngine::seeded(5);
        for _ in 0..100 {
            let answer = engine.resolve(Difficulty::Medium);
            if answer.correct {
                assert!((1000..1500).contains(&answer.points));
            } else {
                assert_eq!(answer.points, 0);
            }
        }
    }

    #[test]
    fn shuffled_order_is_a_permutation() {
        let mut engine = OpponentEngine::seeded(8);
        let mut order = engine.shuffled_order(4);
        order.sort_unstable();
        assert_eq!(order, vec![0, 1, 2, 3]);
    }
}
