use std::time::Duration;

use crate::models::player::{PlayerId, PlayerScore};
use crate::models::session::Standing;
use crate::models::turn::TurnState;

/// Scores of everyone seated in a session. Scores only ever grow while the
/// session runs; the roster is never reset mid-session.
#[derive(Debug, Clone, Default)]
pub struct Leaderboard {
    players: Vec<PlayerScore>,
}

impl Leaderboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_player(&mut self, name: impl Into<String>, is_me: bool) -> PlayerId {
        let id = PlayerId(self.players.len() as u32);
        self.players.push(PlayerScore::new(id, name, is_me));
        id
    }

    /// Adds `points` and the response time to a player's totals.
    pub fn award(&mut self, player: PlayerId, points: u32, elapsed: Duration) -> Option<u32> {
        let entry = self.players.iter_mut().find(|p| p.id == player)?;
        entry.score = entry.score.saturating_add(points);
        entry.total_time_ms = entry
            .total_time_ms
            .saturating_add(elapsed.as_millis() as u64);
        Some(entry.score)
    }

    pub fn get(&self, player: PlayerId) -> Option<&PlayerScore> {
        self.players.iter().find(|p| p.id == player)
    }

    pub fn human(&self) -> Option<&PlayerScore> {
        self.players.iter().find(|p| p.is_me)
    }

    pub fn opponents(&self) -> Vec<PlayerId> {
        self.players
            .iter()
            .filter(|p| !p.is_me)
            .map(|p| p.id)
            .collect()
    }

    pub fn players(&self) -> &[PlayerScore] {
        &self.players
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Score descending. `sort_by` is stable, so equal scores keep seating
    /// order rather than falling back to names.
    pub fn ranking(&self) -> Vec<&PlayerScore> {
        let mut ranked: Vec<&PlayerScore> = self.players.iter().collect();
        ranked.sort_by(|a, b| b.score.cmp(&a.score));
        ranked
    }

    pub fn has_answered(&self, turn: Option<&TurnState>, player: PlayerId) -> bool {
        turn.is_some_and(|turn| turn.has_answered(player))
    }

    pub fn standings(&self, turn: Option<&TurnState>) -> Vec<Standing> {
        self.ranking()
            .into_iter()
            .enumerate()
            .map(|(position, player)| Standing {
                rank: position + 1,
                player_id: player.id,
                name: player.name.clone(),
                score: player.score,
                total_time_ms: player.total_time_ms,
                is_me: player.is_me,
                answered_this_turn: self.has_answered(turn, player.id),
                last_gain: turn.and_then(|turn| turn.last_gain(player.id)),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::turn::{TurnEvent, TurnId};

    fn seated(names: &[&str]) -> Leaderboard {
        let mut board = Leaderboard::new();
        for (i, name) in names.iter().enumerate() {
            board.add_player(*name, i == 0);
        }
        board
    }

    #[test]
    fn ties_keep_insertion_order() {
        let mut board = seated(&["player1", "player2", "player3"]);
        board.award(PlayerId(0), 500, Duration::ZERO);
        board.award(PlayerId(1), 500, Duration::ZERO);
        board.award(PlayerId(2), 300, Duration::ZERO);

        let names: Vec<&str> = board.ranking().iter().map(|p| p.name.as_str()).collect();

        assert_eq!(names, vec!["player1", "player2", "player3"]);
    }

    #[test]
    fn ties_are_not_alphabetical() {
        let mut board = seated(&["zulu", "alpha"]);
        board.award(PlayerId(0), 700, Duration::ZERO);
        board.award(PlayerId(1), 700, Duration::ZERO);

        assert_eq!(board.ranking()[0].name, "zulu");
    }

    #[test]
    fn awards_accumulate_score_and_time() {
        let mut board = seated(&["You", "NetGuardian"]);
        board.award(PlayerId(1), 1200, Duration::from_millis(1500));
        let total = board.award(PlayerId(1), 1100, Duration::from_millis(2500));

        assert_eq!(total, Some(2300));
        let bot = board.get(PlayerId(1)).unwrap();
        assert_eq!(bot.total_time_ms, 4000);
        assert_eq!(board.award(PlayerId(9), 10, Duration::ZERO), None);
    }

    #[test]
    fn standings_reflect_turn_indicators() {
        let mut board = seated(&["You", "Cyber_Hunter", "NetGuardian"]);
        let mut turn = TurnState::new(TurnId(1), 0, 30, PlayerId(0), 1);
        turn.apply(TurnEvent::OpponentAnswered {
            player: PlayerId(2),
            correct: true,
            points: 1300,
            elapsed: Duration::from_secs(2),
        })
        .unwrap();
        board.award(PlayerId(2), 1300, Duration::from_secs(2));

        let standings = board.standings(Some(&turn));

        assert_eq!(standings[0].name, "NetGuardian");
        assert_eq!(standings[0].rank, 1);
        assert!(standings[0].answered_this_turn);
        assert_eq!(standings[0].last_gain, Some(1300));
        assert!(!standings[1].answered_this_turn);
        assert_eq!(board.opponents(), vec![PlayerId(1), PlayerId(2)]);
    }
}
