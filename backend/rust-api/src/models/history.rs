use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{Difficulty, QuizMode};

/// One finished quiz, as persisted in the history list (newest first).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizHistoryEntry {
    pub date: DateTime<Utc>,
    pub score: u32,
    pub total: u32,
    #[serde(default)]
    pub correct: u32,
    pub mode: QuizMode,
    pub difficulty: Option<Difficulty>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditCategory {
    Security,
    Quiz,
    System,
    Tool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditLevel {
    Info,
    Warning,
    Alert,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub event: String,
    pub category: AuditCategory,
    pub level: AuditLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

/// Stored preferences are merged over these defaults, so older records
/// missing a field still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct UserPreferences {
    pub theme: Theme,
    #[validate(length(min = 1, max = 40, message = "User name must be 1-40 characters"))]
    pub user_name: String,
    pub user_avatar: Option<String>,
    #[validate(range(min = 5, max = 100, message = "Default question count must be 5-100"))]
    pub default_quiz_count: u32,
    pub default_quiz_difficulty: Difficulty,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            theme: Theme::Dark,
            user_name: "Guardian".to_string(),
            user_avatar: None,
            default_quiz_count: 10,
            default_quiz_difficulty: Difficulty::Medium,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizStats {
    pub total_quizzes: usize,
    /// Mean share of correctly answered questions, in whole percent.
    pub average_accuracy: u32,
    pub best_solo: u32,
}

impl QuizStats {
    pub fn from_history(history: &[QuizHistoryEntry]) -> Self {
        let total_quizzes = history.len();
        let average_accuracy = if total_quizzes == 0 {
            0
        } else {
            let sum: f64 = history
                .iter()
                .filter(|entry| entry.total > 0)
                .map(|entry| entry.correct as f64 / entry.total as f64)
                .sum();
            ((sum / total_quizzes as f64) * 100.0).round() as u32
        };
        let best_solo = history
            .iter()
            .filter(|entry| entry.mode == QuizMode::Solo)
            .map(|entry| entry.score)
            .max()
            .unwrap_or(0);

        Self {
            total_quizzes,
            average_accuracy,
            best_solo,
        }
    }
}

/// Headline shown on the results screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Excellent,
    Solid,
    Alert,
}

impl Verdict {
    pub fn from_accuracy(correct: u32, total: u32) -> Self {
        let percentage = if total == 0 {
            0.0
        } else {
            (correct as f64 / total as f64 * 100.0).round()
        };
        if percentage >= 80.0 {
            Verdict::Excellent
        } else if percentage >= 50.0 {
            Verdict::Solid
        } else {
            Verdict::Alert
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Verdict::Excellent => "Excellent defense! Your network is airtight.",
            Verdict::Solid => "Good work, agent. The basics are in place.",
            Verdict::Alert => "Intrusion alert: sharpen your knowledge right away!",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(mode: QuizMode, score: u32, correct: u32, total: u32) -> QuizHistoryEntry {
        QuizHistoryEntry {
            date: Utc::now(),
            score,
            total,
            correct,
            mode,
            difficulty: Some(Difficulty::Medium),
        }
    }

    #[test]
    fn stats_average_accuracy_and_best_solo() {
        let history = vec![
            entry(QuizMode::Solo, 4200, 3, 4),
            entry(QuizMode::Multi, 9000, 1, 4),
            entry(QuizMode::Solo, 1333, 1, 1),
        ];

        let stats = QuizStats::from_history(&history);

        assert_eq!(stats.total_quizzes, 3);
        assert_eq!(stats.average_accuracy, 67);
        assert_eq!(stats.best_solo, 4200);
    }

    #[test]
    fn stats_on_empty_history() {
        let stats = QuizStats::from_history(&[]);
        assert_eq!(stats.total_quizzes, 0);
        assert_eq!(stats.average_accuracy, 0);
        assert_eq!(stats.best_solo, 0);
    }

    #[test]
    fn verdict_thresholds() {
        assert_eq!(Verdict::from_accuracy(8, 10), Verdict::Excellent);
        assert_eq!(Verdict::from_accuracy(5, 10), Verdict::Solid);
        assert_eq!(Verdict::from_accuracy(4, 10), Verdict::Alert);
        assert_eq!(Verdict::from_accuracy(0, 0), Verdict::Alert);
    }

    #[test]
    fn partial_preferences_fall_back_to_defaults() {
        let prefs: UserPreferences = serde_json::from_str(r#"{"user_name":"Neo"}"#).unwrap();
        assert_eq!(prefs.user_name, "Neo");
        assert_eq!(prefs.default_quiz_count, 10);
        assert_eq!(prefs.default_quiz_difficulty, Difficulty::Medium);
        assert_eq!(prefs.theme, Theme::Dark);
    }
}
