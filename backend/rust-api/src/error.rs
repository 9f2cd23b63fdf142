use axum::http::StatusCode;
use thiserror::Error;

/// Errors surfaced by the quiz core.
///
/// None of these are fatal: a session that hits one can always be restarted
/// from the idle phase.
#[derive(Error, Debug)]
pub enum QuizError {
    #[error("Question generation failed: {0}")]
    Generation(String),

    #[error("Question generator returned an empty batch ({requested} requested)")]
    EmptyBatch { requested: u32 },

    #[error("Question generation produced no questions")]
    EmptyQuestionSet,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Answer already submitted for this turn")]
    AlreadyAnswered,

    #[error("Option {0} is out of range")]
    InvalidOption(usize),

    #[error("Operation not allowed while session is {0}")]
    WrongPhase(&'static str),

    #[error("Only the room host can start the session")]
    NotHost,

    #[error("Session not found")]
    SessionNotFound,

    #[error("Session is closed")]
    SessionClosed,

    #[error("Storage error: {0}")]
    Storage(String),
}

impl QuizError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            QuizError::InvalidConfig(_) | QuizError::InvalidOption(_) => StatusCode::BAD_REQUEST,
            QuizError::AlreadyAnswered | QuizError::WrongPhase(_) => StatusCode::CONFLICT,
            QuizError::NotHost => StatusCode::FORBIDDEN,
            QuizError::SessionNotFound => StatusCode::NOT_FOUND,
            QuizError::SessionClosed => StatusCode::GONE,
            QuizError::Generation(_)
            | QuizError::EmptyBatch { .. }
            | QuizError::EmptyQuestionSet => StatusCode::BAD_GATEWAY,
            QuizError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<anyhow::Error> for QuizError {
    fn from(err: anyhow::Error) -> Self {
        QuizError::Storage(format!("{:#}", err))
    }
}
