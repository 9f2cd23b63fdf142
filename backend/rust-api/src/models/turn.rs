use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use super::player::PlayerId;
use super::OPTIONS_PER_QUESTION;
use crate::error::QuizError;
use crate::services::scoring;

/// Identifies one started turn. Every scheduled timer carries the id of the
/// turn that armed it so late deliveries can be recognised and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TurnId(pub u64);

/// Everything that can happen to a turn once it is running.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    HumanAnswered {
        option: usize,
    },
    HumanTimedOut,
    OpponentAnswered {
        player: PlayerId,
        correct: bool,
        points: u32,
        elapsed: Duration,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionTrigger {
    Answered,
    TimedOut,
}

impl ResolutionTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionTrigger::Answered => "answered",
            ResolutionTrigger::TimedOut => "timed_out",
        }
    }
}

/// Outcome of folding one [`TurnEvent`] into a [`TurnState`].
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEffect {
    /// The event arrived after the player was already resolved this turn.
    Ignored,
    OpponentScored {
        player: PlayerId,
        correct: bool,
        points: u32,
        elapsed: Duration,
    },
    /// The human side of the turn is settled; the turn can be advanced.
    Resolved {
        trigger: ResolutionTrigger,
        correct: bool,
        points: u32,
        elapsed: Duration,
    },
}

/// Per-turn state. Created fresh for every question so nothing leaks from
/// one turn into the next.
#[derive(Debug, Clone)]
pub struct TurnState {
    pub id: TurnId,
    pub index: usize,
    pub time_limit: u32,
    pub time_remaining: u32,
    /// Players resolved this turn, in resolution order. Never holds duplicates.
    pub answered_players: Vec<PlayerId>,
    /// Points just awarded, kept only while the gain indicator is visible.
    pub last_gains: BTreeMap<PlayerId, u32>,
    /// Latch preventing a second human submission.
    pub answered: bool,
    pub chosen_option: Option<usize>,
    human: PlayerId,
    correct_option: usize,
}

impl TurnState {
    pub fn new(
        id: TurnId,
        index: usize,
        time_limit: u32,
        human: PlayerId,
        correct_option: usize,
    ) -> Self {
        Self {
            id,
            index,
            time_limit,
            time_remaining: time_limit,
            answered_players: Vec::new(),
            last_gains: BTreeMap::new(),
            answered: false,
            chosen_option: None,
            human,
            correct_option,
        }
    }

    pub fn human(&self) -> PlayerId {
        self.human
    }

    pub fn correct_option(&self) -> usize {
        self.correct_option
    }

    pub fn is_resolved(&self) -> bool {
        self.answered
    }

    pub fn has_answered(&self, player: PlayerId) -> bool {
        self.answered_players.contains(&player)
    }

    pub fn last_gain(&self, player: PlayerId) -> Option<u32> {
        self.last_gains.get(&player).copied()
    }

    /// Mirrors the countdown. Clamped to the turn's limit.
    pub fn sync_clock(&mut self, remaining: u32) {
        if !self.answered {
            self.time_remaining = remaining.min(self.time_limit);
        }
    }

    pub fn clear_gain(&mut self, player: PlayerId) -> bool {
        self.last_gains.remove(&player).is_some()
    }

    fn mark_answered(&mut self, player: PlayerId) -> bool {
        if self.has_answered(player) {
            return false;
        }
        self.answered_players.push(player);
        true
    }

    /// Folds one event into the turn. Deterministic: all randomness is
    /// drawn by the caller before the event is built.
    pub fn apply(&mut self, event: TurnEvent) -> Result<TurnEffect, QuizError> {
        match event {
            TurnEvent::HumanAnswered { option } => {
                if option >= OPTIONS_PER_QUESTION {
                    return Err(QuizError::InvalidOption(option));
                }
                if self.answered {
                    return Err(QuizError::AlreadyAnswered);
                }

                self.answered = true;
                self.chosen_option = Some(option);
                self.mark_answered(self.human);

                let correct = option == self.correct_option;
                let points = scoring::score(correct, self.time_remaining, self.time_limit);
                if points > 0 {
                    self.last_gains.insert(self.human, points);
                }

                Ok(TurnEffect::Resolved {
                    trigger: ResolutionTrigger::Answered,
                    correct,
                    points,
                    elapsed: Duration::from_secs(
                        self.time_limit.saturating_sub(self.time_remaining) as u64,
                    ),
                })
            }
            TurnEvent::HumanTimedOut => {
                if self.answered {
                    return Ok(TurnEffect::Ignored);
                }

                self.answered = true;
                self.time_remaining = 0;
                // Timed-out players still count as resolved for the status indicators.
                self.mark_answered(self.human);

                Ok(TurnEffect::Resolved {
                    trigger: ResolutionTrigger::TimedOut,
                    correct: false,
                    points: 0,
                    elapsed: Duration::from_secs(self.time_limit as u64),
                })
            }
            TurnEvent::OpponentAnswered {
                player,
                correct,
                points,
                elapsed,
            } => {
                if player == self.human || !self.mark_answered(player) {
                    return Ok(TurnEffect::Ignored);
                }

                let points = if correct { points } else { 0 };
                if points > 0 {
                    self.last_gains.insert(player, points);
                }

                Ok(TurnEffect::OpponentScored {
                    player,
                    correct,
                    points,
                    elapsed,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HUMAN: PlayerId = PlayerId(0);
    const BOT: PlayerId = PlayerId(1);

    fn medium_turn() -> TurnState {
        TurnState::new(TurnId(1), 0, 30, HUMAN, 2)
    }

    #[test]
    fn correct_answer_scores_base_plus_time_bonus() {
        let mut turn = medium_turn();
        turn.sync_clock(20);

        let effect = turn.apply(TurnEvent::HumanAnswered { option: 2 }).unwrap();

        assert_eq!(
            effect,
            TurnEffect::Resolved {
                trigger: ResolutionTrigger::Answered,
                correct: true,
                points: 1333,
                elapsed: Duration::from_secs(10),
            }
        );
        assert_eq!(turn.last_gain(HUMAN), Some(1333));
        assert!(turn.has_answered(HUMAN));
    }

    #[test]
    fn second_submission_is_rejected() {
        let mut turn = medium_turn();
        turn.apply(TurnEvent::HumanAnswered { option: 0 }).unwrap();

        let err = turn
            .apply(TurnEvent::HumanAnswered { option: 2 })
            .unwrap_err();

        assert!(matches!(err, QuizError::AlreadyAnswered));
        assert_eq!(turn.chosen_option, Some(0));
        assert_eq!(turn.answered_players, vec![HUMAN]);
    }

    #[test]
    fn out_of_range_option_does_not_latch() {
        let mut turn = medium_turn();

        let err = turn
            .apply(TurnEvent::HumanAnswered { option: 4 })
            .unwrap_err();

        assert!(matches!(err, QuizError::InvalidOption(4)));
        assert!(!turn.answered);
    }

    #[test]
    fn timeout_registers_human_without_points() {
        let mut turn = medium_turn();

        let effect = turn.apply(TurnEvent::HumanTimedOut).unwrap();

        assert!(matches!(
            effect,
            TurnEffect::Resolved {
                trigger: ResolutionTrigger::TimedOut,
                points: 0,
                ..
            }
        ));
        assert_eq!(turn.answered_players, vec![HUMAN]);
        assert_eq!(turn.time_remaining, 0);
        assert!(turn.last_gains.is_empty());
    }

    #[test]
    fn timeout_after_answer_is_ignored() {
        let mut turn = medium_turn();
        turn.apply(TurnEvent::HumanAnswered { option: 1 }).unwrap();

        assert_eq!(
            turn.apply(TurnEvent::HumanTimedOut).unwrap(),
            TurnEffect::Ignored
        );
        assert_eq!(turn.answered_players.len(), 1);
    }

    #[test]
    fn opponent_resolves_once_per_turn() {
        let mut turn = medium_turn();
        let event = TurnEvent::OpponentAnswered {
            player: BOT,
            correct: true,
            points: 1200,
            elapsed: Duration::from_millis(900),
        };

        assert!(matches!(
            turn.apply(event.clone()).unwrap(),
            TurnEffect::OpponentScored { points: 1200, .. }
        ));
        assert_eq!(turn.apply(event).unwrap(), TurnEffect::Ignored);
        assert_eq!(turn.answered_players, vec![BOT]);
        assert_eq!(turn.last_gain(BOT), Some(1200));
    }

    #[test]
    fn wrong_opponent_answer_awards_nothing() {
        let mut turn = medium_turn();

        let effect = turn
            .apply(TurnEvent::OpponentAnswered {
                player: BOT,
                correct: false,
                points: 1100,
                elapsed: Duration::from_secs(3),
            })
            .unwrap();

        assert!(matches!(
            effect,
            TurnEffect::OpponentScored { points: 0, .. }
        ));
        assert!(turn.last_gains.is_empty());
        assert!(turn.has_answered(BOT));
    }

    #[test]
    fn clock_is_clamped_and_frozen_after_resolution() {
        let mut turn = medium_turn();
        turn.sync_clock(45);
        assert_eq!(turn.time_remaining, 30);

        turn.sync_clock(12);
        turn.apply(TurnEvent::HumanAnswered { option: 2 }).unwrap();
        turn.sync_clock(11);
        assert_eq!(turn.time_remaining, 12);
    }

    #[test]
    fn gains_can_be_cleared() {
        let mut turn = medium_turn();
        turn.apply(TurnEvent::HumanAnswered { option: 2 }).unwrap();

        assert!(turn.clear_gain(HUMAN));
        assert!(!turn.clear_gain(HUMAN));
        assert_eq!(turn.last_gain(HUMAN), None);
    }
}
