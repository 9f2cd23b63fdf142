use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::session::SessionSnapshot;

/// Events pushed to SSE subscribers of a quiz session.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SessionEvent {
    TimerTick(TimerTick),
    TimeExpired(TimeExpired),
    SessionUpdate(Box<SessionSnapshot>),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TimerTick {
    pub session_id: Uuid,
    pub question_index: usize,
    pub remaining_seconds: u32,
    pub total_seconds: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TimeExpired {
    pub session_id: Uuid,
    pub question_index: usize,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl SessionEvent {
    /// Picks the lightest event describing the move from `previous` to `current`.
    pub fn between(previous: Option<&SessionSnapshot>, current: &SessionSnapshot) -> Self {
        if let (Some(previous), Some(turn)) = (previous, current.turn.as_ref()) {
            if current.is_clock_update_of(previous) {
                if turn.time_remaining == 0 {
                    return SessionEvent::TimeExpired(TimeExpired {
                        session_id: current.session_id,
                        question_index: turn.index,
                        timestamp: Utc::now(),
                        message: "Time limit exceeded".to_string(),
                    });
                }
                return SessionEvent::TimerTick(TimerTick {
                    session_id: current.session_id,
                    question_index: turn.index,
                    remaining_seconds: turn.time_remaining,
                    total_seconds: turn.time_limit,
                    timestamp: Utc::now(),
                });
            }
        }
        SessionEvent::SessionUpdate(Box::new(current.clone()))
    }

    pub fn to_sse_data(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            SessionEvent::TimerTick(_) => "timer-tick",
            SessionEvent::TimeExpired(_) => "time-expired",
            SessionEvent::SessionUpdate(_) => "session-update",
        }
    }
}
