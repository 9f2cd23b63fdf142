use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use super::store::{ResultStore, AUDIT_LOG_KEY, HISTORY_KEY, PREFERENCES_KEY};
use crate::config::HistoryConfig;
use crate::error::QuizError;
use crate::metrics::track_history_operation;
use crate::models::history::{
    AuditCategory, AuditLevel, AuditLogEntry, QuizHistoryEntry, QuizStats, UserPreferences,
};
use crate::models::session::SessionResult;

/// Quiz history, audit trail and preferences on top of a [`ResultStore`].
#[derive(Clone)]
pub struct HistoryService {
    store: Arc<dyn ResultStore>,
    history_cap: usize,
    audit_cap: usize,
}

impl HistoryService {
    pub fn new(store: Arc<dyn ResultStore>, config: &HistoryConfig) -> Self {
        Self {
            store,
            history_cap: config.history_cap,
            audit_cap: config.audit_cap,
        }
    }

    /// Persists a finished quiz and notes it in the audit trail.
    pub async fn record_result(
        &self,
        result: &SessionResult,
        date: DateTime<Utc>,
    ) -> Result<QuizHistoryEntry, QuizError> {
        let entry = QuizHistoryEntry {
            date,
            score: result.score,
            total: result.total,
            correct: result.correct,
            mode: result.mode,
            difficulty: Some(result.difficulty),
        };
        let value = serde_json::to_string(&entry)
            .map_err(|e| QuizError::Storage(format!("Failed to encode history entry: {}", e)))?;

        track_history_operation(
            "record_result",
            self.store.push_capped(HISTORY_KEY, value, self.history_cap),
        )
        .await?;

        tracing::info!(
            "Recorded {} quiz: score={}, correct={}/{}",
            result.mode.as_str(),
            result.score,
            result.correct,
            result.total
        );

        let event = format!(
            "Quiz completed ({}, {}): {}/{} correct, {} points",
            result.mode.as_str(),
            result.difficulty,
            result.correct,
            result.total,
            result.score
        );
        if let Err(e) = self
            .add_audit_log(event, AuditCategory::Quiz, AuditLevel::Info)
            .await
        {
            tracing::warn!("Failed to audit quiz completion: {}", e);
        }

        Ok(entry)
    }

    /// Newest first, at most the history cap.
    pub async fn read_history(&self) -> Result<Vec<QuizHistoryEntry>, QuizError> {
        let raw = track_history_operation(
            "read_history",
            self.store.read_list(HISTORY_KEY, self.history_cap),
        )
        .await?;
        Ok(decode_all(raw, "history entry"))
    }

    pub async fn clear_history(&self) -> Result<(), QuizError> {
        track_history_operation("clear_history", self.store.delete(HISTORY_KEY)).await?;
        tracing::info!("Quiz history cleared");
        Ok(())
    }

    pub async fn stats(&self) -> Result<QuizStats, QuizError> {
        Ok(QuizStats::from_history(&self.read_history().await?))
    }

    pub async fn add_audit_log(
        &self,
        event: impl Into<String>,
        category: AuditCategory,
        level: AuditLevel,
    ) -> Result<AuditLogEntry, QuizError> {
        let entry = AuditLogEntry {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event: event.into(),
            category,
            level,
        };
        let value = serde_json::to_string(&entry)
            .map_err(|e| QuizError::Storage(format!("Failed to encode audit entry: {}", e)))?;

        track_history_operation(
            "add_audit_log",
            self.store.push_capped(AUDIT_LOG_KEY, value, self.audit_cap),
        )
        .await?;
        Ok(entry)
    }

    pub async fn audit_logs(&self) -> Result<Vec<AuditLogEntry>, QuizError> {
        let raw = track_history_operation(
            "read_audit_logs",
            self.store.read_list(AUDIT_LOG_KEY, self.audit_cap),
        )
        .await?;
        Ok(decode_all(raw, "audit entry"))
    }

    pub async fn clear_audit_logs(&self) -> Result<(), QuizError> {
        track_history_operation("clear_audit_logs", self.store.delete(AUDIT_LOG_KEY)).await?;
        tracing::info!("Audit log cleared");
        Ok(())
    }

    /// Stored preferences over the defaults. Unreadable records fall back to
    /// the defaults.
    pub async fn preferences(&self) -> Result<UserPreferences, QuizError> {
        let raw =
            track_history_operation("read_preferences", self.store.get(PREFERENCES_KEY)).await?;

        Ok(raw
            .and_then(|value| match serde_json::from_str(&value) {
                Ok(prefs) => Some(prefs),
                Err(e) => {
                    tracing::warn!("Ignoring unreadable preferences: {}", e);
                    None
                }
            })
            .unwrap_or_default())
    }

    pub async fn save_preferences(
        &self,
        prefs: UserPreferences,
    ) -> Result<UserPreferences, QuizError> {
        prefs
            .validate()
            .map_err(|e| QuizError::InvalidConfig(e.to_string()))?;
        let value = serde_json::to_string(&prefs)
            .map_err(|e| QuizError::Storage(format!("Failed to encode preferences: {}", e)))?;

        track_history_operation("save_preferences", self.store.put(PREFERENCES_KEY, value))
            .await?;
        Ok(prefs)
    }
}

fn decode_all<T: DeserializeOwned>(raw: Vec<String>, what: &str) -> Vec<T> {
    raw.into_iter()
        .filter_map(|value| match serde_json::from_str(&value) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::warn!("Skipping unreadable {}: {}", what, e);
                None
            }
        })
        .collect()
}
