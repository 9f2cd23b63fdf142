use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::history::Verdict;
use super::lobby::LobbyRole;
use super::player::PlayerId;
use super::{Difficulty, QuizMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Lobby / configuration. Also where a failed generation lands.
    Idle,
    Generating,
    Playing,
    Results,
    /// The player left; no further commands are accepted.
    Closed,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Idle => "idle",
            SessionPhase::Generating => "generating",
            SessionPhase::Playing => "playing",
            SessionPhase::Results => "results",
            SessionPhase::Closed => "closed",
        }
    }
}

/// Final numbers of a session, also what gets persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionResult {
    pub score: u32,
    pub total: u32,
    pub correct: u32,
    pub mode: QuizMode,
    pub difficulty: Difficulty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOutcome {
    pub session_id: Uuid,
    pub completed: bool,
    pub result: SessionResult,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionView {
    /// Index in the question's original option list; answers are submitted
    /// with this value regardless of display order.
    pub index: usize,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionView {
    pub id: String,
    pub category: String,
    pub text: String,
    pub options: Vec<OptionView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reveal {
    pub correct_option: usize,
    pub chosen_option: Option<usize>,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnView {
    pub index: usize,
    pub total: usize,
    pub time_limit: u32,
    pub time_remaining: u32,
    pub question: QuestionView,
    pub answered: bool,
    pub reveal: Option<Reveal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standing {
    pub rank: usize,
    pub player_id: PlayerId,
    pub name: String,
    pub score: u32,
    pub total_time_ms: u64,
    pub is_me: bool,
    pub answered_this_turn: bool,
    pub last_gain: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub mode: QuizMode,
    pub difficulty: Difficulty,
    pub question_count: u32,
    pub phase: SessionPhase,
    pub role: Option<LobbyRole>,
    pub room_code: Option<String>,
    pub turn: Option<TurnView>,
    pub standings: Vec<Standing>,
    pub score: u32,
    pub correct_answers: u32,
    pub last_error: Option<String>,
    pub verdict: Option<Verdict>,
    /// Headline text for the results screen.
    pub verdict_message: Option<String>,
}

impl SessionSnapshot {
    /// True when `previous` and `self` differ only by the countdown value.
    pub fn is_clock_update_of(&self, previous: &SessionSnapshot) -> bool {
        match (&self.turn, &previous.turn) {
            (Some(current), Some(before)) if current.time_remaining != before.time_remaining => {
                let mut rewound = self.clone();
                if let Some(turn) = rewound.turn.as_mut() {
                    turn.time_remaining = before.time_remaining;
                }
                rewound == *previous
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerReceipt {
    pub correct: bool,
    pub points: u32,
    pub correct_option: usize,
    pub explanation: String,
    pub total_score: u32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSoloRequest {
    #[validate(range(min = 5, max = 100, message = "Solo quizzes take 5-100 questions"))]
    pub question_count: u32,
    #[serde(default)]
    pub difficulty: Difficulty,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRoomRequest {
    #[validate(range(min = 5, max = 30, message = "Rooms take 5-30 questions"))]
    pub question_count: u32,
    #[serde(default)]
    pub difficulty: Difficulty,
}

#[derive(Debug, Deserialize, Validate)]
pub struct JoinRoomRequest {
    #[validate(length(min = 4, message = "Room codes are at least 4 characters"))]
    pub room_code: String,
}

#[derive(Debug, Deserialize)]
pub struct SubmitAnswerRequest {
    pub option: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionCreatedResponse {
    pub session_id: Uuid,
    pub room_code: Option<String>,
    pub snapshot: SessionSnapshot,
}
