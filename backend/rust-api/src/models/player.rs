use serde::{Deserialize, Serialize};
use std::fmt;

/// Display name of the local human player.
pub const HUMAN_PLAYER_NAME: &str = "You";

/// Simulated opponents seated in every multiplayer room.
pub const SIMULATED_OPPONENTS: [&str; 3] = ["Cyber_Hunter", "NetGuardian", "Root_Access"];

/// Simulated host that appears in the lobby of a joined room.
pub const SIMULATED_HOST_NAME: &str = "Admin_Host";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u32);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player-{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerScore {
    pub id: PlayerId,
    pub name: String,
    pub score: u32,
    pub total_time_ms: u64,
    pub is_me: bool,
}

impl PlayerScore {
    pub fn new(id: PlayerId, name: impl Into<String>, is_me: bool) -> Self {
        Self {
            id,
            name: name.into(),
            score: 0,
            total_time_ms: 0,
            is_me,
        }
    }
}
