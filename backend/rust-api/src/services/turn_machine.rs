use std::time::Duration;
use uuid::Uuid;

use super::leaderboard::Leaderboard;
use super::opponent_engine::OpponentAnswer;
use crate::error::QuizError;
use crate::models::history::Verdict;
use crate::models::lobby::{LobbyRole, QuizSettings, RoomCode};
use crate::models::player::{PlayerId, HUMAN_PLAYER_NAME, SIMULATED_OPPONENTS};
use crate::models::session::{
    OptionView, QuestionView, Reveal, SessionPhase, SessionResult, SessionSnapshot, TurnView,
};
use crate::models::turn::{TurnEffect, TurnEvent, TurnId, TurnState};
use crate::models::{Question, QuizMode, OPTIONS_PER_QUESTION};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    Next(TurnId),
    Finished(SessionResult),
}

/// Phase and turn bookkeeping for one quiz session, free of any timers.
///
/// `Idle -> Generating -> Playing -> Results`, with `Generating -> Idle` on
/// failure and `Closed` reachable from anywhere.
#[derive(Debug)]
pub struct TurnMachine {
    settings: QuizSettings,
    phase: SessionPhase,
    questions: Vec<Question>,
    turn: Option<TurnState>,
    next_turn_id: u64,
    leaderboard: Leaderboard,
    human: PlayerId,
    correct_answers: u32,
    option_order: Vec<usize>,
    last_error: Option<String>,
}

impl TurnMachine {
    pub fn new(settings: QuizSettings) -> Self {
        let mut leaderboard = Leaderboard::new();
        let human = leaderboard.add_player(HUMAN_PLAYER_NAME, true);
        if settings.mode == QuizMode::Multi {
            for name in SIMULATED_OPPONENTS {
                leaderboard.add_player(name, false);
            }
        }

        Self {
            settings,
            phase: SessionPhase::Idle,
            questions: Vec::new(),
            turn: None,
            next_turn_id: 0,
            leaderboard,
            human,
            correct_answers: 0,
            option_order: (0..OPTIONS_PER_QUESTION).collect(),
            last_error: None,
        }
    }

    pub fn settings(&self) -> &QuizSettings {
        &self.settings
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn leaderboard(&self) -> &Leaderboard {
        &self.leaderboard
    }

    pub fn current_turn(&self) -> Option<&TurnState> {
        self.turn.as_ref()
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.turn
            .as_ref()
            .and_then(|turn| self.questions.get(turn.index))
    }

    pub fn current_turn_id(&self) -> Option<TurnId> {
        self.turn.as_ref().map(|turn| turn.id)
    }

    pub fn is_current(&self, turn: TurnId) -> bool {
        self.phase == SessionPhase::Playing && self.current_turn_id() == Some(turn)
    }

    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Seats an extra simulated player while still in the lobby.
    pub fn seat_opponent(&mut self, name: &str) -> Result<PlayerId, QuizError> {
        if self.phase != SessionPhase::Idle {
            return Err(QuizError::WrongPhase(self.phase.as_str()));
        }
        Ok(self.leaderboard.add_player(name, false))
    }

    pub fn begin_generation(&mut self) -> Result<(), QuizError> {
        if self.phase != SessionPhase::Idle {
            return Err(QuizError::WrongPhase(self.phase.as_str()));
        }
        self.phase = SessionPhase::Generating;
        self.last_error = None;
        Ok(())
    }

    pub fn generation_failed(&mut self, reason: impl Into<String>) {
        if self.phase == SessionPhase::Generating {
            self.phase = SessionPhase::Idle;
            self.last_error = Some(reason.into());
        }
    }

    /// Moves into `Playing` and starts the first turn.
    pub fn load_questions(&mut self, questions: Vec<Question>) -> Result<TurnId, QuizError> {
        if self.phase != SessionPhase::Generating {
            return Err(QuizError::WrongPhase(self.phase.as_str()));
        }
        if questions.is_empty() {
            self.generation_failed(QuizError::EmptyQuestionSet.to_string());
            return Err(QuizError::EmptyQuestionSet);
        }
        self.questions = questions;
        self.phase = SessionPhase::Playing;
        Ok(self.start_turn(0))
    }

    fn start_turn(&mut self, index: usize) -> TurnId {
        self.next_turn_id += 1;
        let id = TurnId(self.next_turn_id);
        let correct = self.questions[index].correct_answer;
        self.turn = Some(TurnState::new(
            id,
            index,
            self.settings.time_limit(),
            self.human,
            correct,
        ));
        self.option_order = (0..OPTIONS_PER_QUESTION).collect();
        id
    }

    pub fn set_option_order(&mut self, order: Vec<usize>) {
        if order.len() == OPTIONS_PER_QUESTION {
            self.option_order = order;
        }
    }

    pub fn sync_clock(&mut self, turn: TurnId, remaining: u32) -> bool {
        if !self.is_current(turn) {
            return false;
        }
        if let Some(state) = self.turn.as_mut() {
            state.sync_clock(remaining);
        }
        true
    }

    pub fn has_answered(&self, player: PlayerId) -> bool {
        self.leaderboard.has_answered(self.turn.as_ref(), player)
    }

    /// Folds an event into the running turn and mirrors any points onto the
    /// leaderboard.
    pub fn apply(&mut self, event: TurnEvent) -> Result<TurnEffect, QuizError> {
        if self.phase != SessionPhase::Playing {
            return Err(QuizError::WrongPhase(self.phase.as_str()));
        }
        let turn = self
            .turn
            .as_mut()
            .ok_or(QuizError::WrongPhase(SessionPhase::Playing.as_str()))?;
        let effect = turn.apply(event)?;

        match &effect {
            TurnEffect::Resolved {
                correct,
                points,
                elapsed,
                ..
            } => {
                if *correct {
                    self.correct_answers += 1;
                }
                self.leaderboard.award(self.human, *points, *elapsed);
            }
            TurnEffect::OpponentScored {
                player,
                points,
                elapsed,
                ..
            } => {
                self.leaderboard.award(*player, *points, *elapsed);
            }
            TurnEffect::Ignored => {}
        }

        Ok(effect)
    }

    pub fn submit_answer(&mut self, option: usize) -> Result<TurnEffect, QuizError> {
        self.apply(TurnEvent::HumanAnswered { option })
    }

    pub fn record_opponent(
        &mut self,
        player: PlayerId,
        answer: OpponentAnswer,
        elapsed: Duration,
    ) -> Result<TurnEffect, QuizError> {
        self.apply(TurnEvent::OpponentAnswered {
            player,
            correct: answer.correct,
            points: answer.points,
            elapsed,
        })
    }

    pub fn clear_gain(&mut self, turn: TurnId, player: PlayerId) -> bool {
        if !self.is_current(turn) {
            return false;
        }
        self.turn
            .as_mut()
            .is_some_and(|state| state.clear_gain(player))
    }

    /// Leaves a resolved turn: either the next turn starts with a clean
    /// answered set and gain map, or the session reaches `Results`.
    pub fn advance(&mut self, turn: TurnId) -> Result<Advance, QuizError> {
        if !self.is_current(turn) {
            return Err(QuizError::WrongPhase(self.phase.as_str()));
        }
        let index = match self.turn.as_ref() {
            Some(state) if state.is_resolved() => state.index,
            _ => return Err(QuizError::WrongPhase(self.phase.as_str())),
        };

        if index + 1 < self.questions.len() {
            Ok(Advance::Next(self.start_turn(index + 1)))
        } else {
            self.turn = None;
            self.phase = SessionPhase::Results;
            Ok(Advance::Finished(self.result()))
        }
    }

    pub fn close(&mut self) {
        self.turn = None;
        self.phase = SessionPhase::Closed;
    }

    pub fn result(&self) -> SessionResult {
        SessionResult {
            score: self.leaderboard.human().map(|p| p.score).unwrap_or(0),
            total: self.questions.len() as u32,
            correct: self.correct_answers,
            mode: self.settings.mode,
            difficulty: self.settings.difficulty,
        }
    }

    fn turn_view(&self) -> Option<TurnView> {
        let turn = self.turn.as_ref()?;
        let question = self.questions.get(turn.index)?;
        let options = self
            .option_order
            .iter()
            .filter_map(|&index| {
                question.options.get(index).map(|text| OptionView {
                    index,
                    text: text.clone(),
                })
            })
            .collect();

        Some(TurnView {
            index: turn.index,
            total: self.questions.len(),
            time_limit: turn.time_limit,
            time_remaining: turn.time_remaining,
            question: QuestionView {
                id: question.id.clone(),
                category: question.category.clone(),
                text: question.text.clone(),
                options,
            },
            answered: turn.answered,
            reveal: turn.answered.then(|| Reveal {
                correct_option: question.correct_answer,
                chosen_option: turn.chosen_option,
                explanation: question.explanation.clone(),
            }),
        })
    }

    pub fn snapshot(
        &self,
        session_id: Uuid,
        role: Option<LobbyRole>,
        room_code: Option<&RoomCode>,
    ) -> SessionSnapshot {
        let result = self.result();
        let verdict = (self.phase == SessionPhase::Results)
            .then(|| Verdict::from_accuracy(result.correct, result.total));
        SessionSnapshot {
            session_id,
            mode: self.settings.mode,
            difficulty: self.settings.difficulty,
            question_count: self.settings.question_count,
            phase: self.phase,
            role,
            room_code: room_code.map(|code| code.to_string()),
            turn: self.turn_view(),
            standings: self.leaderboard.standings(self.turn.as_ref()),
            score: result.score,
            correct_answers: result.correct,
            last_error: self.last_error.clone(),
            verdict,
            verdict_message: verdict.map(|verdict| verdict.message().to_string()),
        }
    }
}
