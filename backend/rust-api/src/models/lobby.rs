use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

use super::{Difficulty, QuizMode};
use crate::error::QuizError;

pub const SOLO_QUESTION_RANGE: RangeInclusive<u32> = 5..=100;
pub const MULTI_QUESTION_RANGE: RangeInclusive<u32> = 5..=30;

/// Question count a guest plays with, since the host's lobby settings are
/// never actually transmitted.
pub const GUEST_DEFAULT_QUESTION_COUNT: u32 = 10;

pub const ROOM_CODE_LEN: usize = 6;
pub const ROOM_CODE_MIN_LEN: usize = 4;
const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LobbyRole {
    Host,
    Guest,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomCode(String);

impl RoomCode {
    pub fn generate<R: Rng>(rng: &mut R) -> Self {
        let code = (0..ROOM_CODE_LEN)
            .map(|_| ROOM_CODE_ALPHABET[rng.random_range(0..ROOM_CODE_ALPHABET.len())] as char)
            .collect();
        RoomCode(code)
    }

    /// Normalises a code typed by a joining player.
    pub fn parse(input: &str) -> Result<Self, QuizError> {
        let code = input.trim().to_ascii_uppercase();
        if code.chars().count() < ROOM_CODE_MIN_LEN {
            return Err(QuizError::InvalidConfig(format!(
                "room code must be at least {} characters",
                ROOM_CODE_MIN_LEN
            )));
        }
        Ok(RoomCode(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validated parameters of one quiz session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizSettings {
    pub mode: QuizMode,
    pub question_count: u32,
    pub difficulty: Difficulty,
}

impl QuizSettings {
    pub fn solo(question_count: u32, difficulty: Difficulty) -> Result<Self, QuizError> {
        Self::checked(QuizMode::Solo, question_count, difficulty, SOLO_QUESTION_RANGE)
    }

    pub fn multi(question_count: u32, difficulty: Difficulty) -> Result<Self, QuizError> {
        Self::checked(QuizMode::Multi, question_count, difficulty, MULTI_QUESTION_RANGE)
    }

    fn checked(
        mode: QuizMode,
        question_count: u32,
        difficulty: Difficulty,
        range: RangeInclusive<u32>,
    ) -> Result<Self, QuizError> {
        if !range.contains(&question_count) {
            return Err(QuizError::InvalidConfig(format!(
                "{} quiz needs between {} and {} questions, got {}",
                mode.as_str(),
                range.start(),
                range.end(),
                question_count
            )));
        }
        Ok(Self {
            mode,
            question_count,
            difficulty,
        })
    }

    pub fn time_limit(&self) -> u32 {
        self.difficulty.time_limit_seconds()
    }
}
