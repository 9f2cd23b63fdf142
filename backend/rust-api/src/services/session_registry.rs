use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use super::session_service::SessionHandle;
use crate::config::SessionLifetime;
use crate::error::QuizError;
use crate::models::session::SessionPhase;

struct Entry {
    handle: SessionHandle,
    last_seen: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant, finished_grace: Duration, idle_ttl: Duration) -> bool {
        let idle = now.saturating_duration_since(self.last_seen);
        if idle >= idle_ttl {
            return true;
        }
        matches!(
            self.handle.snapshot().phase,
            SessionPhase::Results | SessionPhase::Closed
        ) && idle >= finished_grace
    }
}

/// Live sessions reachable over HTTP, by session id.
///
/// Dropping an entry drops the registry's handle; once no other handle is
/// left the session task sees its command channel close and abandons the quiz.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<Uuid, Entry>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, handle: SessionHandle) {
        self.sessions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(
                handle.id(),
                Entry {
                    handle,
                    last_seen: Instant::now(),
                },
            );
    }

    /// Looks a session up and marks it as recently used.
    pub fn get(&self, id: Uuid) -> Result<SessionHandle, QuizError> {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        let entry = sessions.get_mut(&id).ok_or(QuizError::SessionNotFound)?;
        entry.last_seen = Instant::now();
        Ok(entry.handle.clone())
    }

    pub fn remove(&self, id: Uuid) -> Option<SessionHandle> {
        self.sessions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id)
            .map(|entry| entry.handle)
    }

    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops finished sessions past their grace period and any session idle
    /// longer than `idle_ttl`. Returns how many were dropped.
    pub fn evict_expired(&self, finished_grace: Duration, idle_ttl: Duration) -> usize {
        let now = Instant::now();
        let expired: Vec<Entry> = {
            let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
            let ids: Vec<Uuid> = sessions
                .iter()
                .filter(|(_, entry)| entry.is_expired(now, finished_grace, idle_ttl))
                .map(|(id, _)| *id)
                .collect();
            ids.iter().filter_map(|id| sessions.remove(id)).collect()
        };

        for entry in &expired {
            tracing::debug!("Evicting session {}", entry.handle.id());
        }
        expired.len()
    }

    /// Sweeps the registry every `sweep_interval` until the registry itself
    /// is dropped.
    pub fn spawn_sweeper(&self, lifetime: &SessionLifetime) -> JoinHandle<()> {
        let sessions: Weak<RwLock<HashMap<Uuid, Entry>>> = Arc::downgrade(&self.sessions);
        let every = lifetime.sweep_interval();
        let finished_grace = lifetime.finished_grace();
        let idle_ttl = lifetime.idle_ttl();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(live) = sessions.upgrade() else {
                    break;
                };
                let registry = SessionRegistry { sessions: live };
                let evicted = registry.evict_expired(finished_grace, idle_ttl);
                if evicted > 0 {
                    tracing::info!("Session sweep evicted {} session(s)", evicted);
                }
            }
        })
    }
}
