use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

pub const HISTORY_KEY: &str = "cybershield:history";
pub const AUDIT_LOG_KEY: &str = "cybershield:audit_logs";
pub const PREFERENCES_KEY: &str = "cybershield:prefs";

/// Key-value persistence for JSON documents. Lists are newest first.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Prepends `value` and drops everything past `cap` entries.
    async fn push_capped(&self, key: &str, value: String, cap: usize) -> Result<()>;
    async fn read_list(&self, key: &str, limit: usize) -> Result<Vec<String>>;
    async fn put(&self, key: &str, value: String) -> Result<()>;
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn delete(&self, key: &str) -> Result<()>;
}

pub struct RedisStore {
    redis: ConnectionManager,
}

impl RedisStore {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl ResultStore for RedisStore {
    async fn push_capped(&self, key: &str, value: String, cap: usize) -> Result<()> {
        let mut conn = self.redis.clone();
        redis::pipe()
            .atomic()
            .cmd("LPUSH")
            .arg(key)
            .arg(value)
            .ignore()
            .cmd("LTRIM")
            .arg(key)
            .arg(0)
            .arg(cap.max(1) as isize - 1)
            .ignore()
            .query_async::<()>(&mut conn)
            .await
            .with_context(|| format!("Failed to push to {}", key))
    }

    async fn read_list(&self, key: &str, limit: usize) -> Result<Vec<String>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.redis.clone();
        redis::cmd("LRANGE")
            .arg(key)
            .arg(0)
            .arg(limit as isize - 1)
            .query_async(&mut conn)
            .await
            .with_context(|| format!("Failed to read {}", key))
    }

    async fn put(&self, key: &str, value: String) -> Result<()> {
        let mut conn = self.redis.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .query_async::<()>(&mut conn)
            .await
            .with_context(|| format!("Failed to write {}", key))
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.redis.clone();
        redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .with_context(|| format!("Failed to read {}", key))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.redis.clone();
        redis::cmd("DEL")
            .arg(key)
            .query_async::<()>(&mut conn)
            .await
            .with_context(|| format!("Failed to delete {}", key))
    }
}

/// Process-local store, used when no Redis is configured and in tests.
#[derive(Default)]
pub struct InMemoryStore {
    lists: Mutex<HashMap<String, VecDeque<String>>>,
    values: Mutex<HashMap<String, String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResultStore for InMemoryStore {
    async fn push_capped(&self, key: &str, value: String, cap: usize) -> Result<()> {
        let mut lists = self.lists.lock().unwrap_or_else(|e| e.into_inner());
        let list = lists.entry(key.to_string()).or_default();
        list.push_front(value);
        list.truncate(cap.max(1));
        Ok(())
    }

    async fn read_list(&self, key: &str, limit: usize) -> Result<Vec<String>> {
        let lists = self.lists.lock().unwrap_or_else(|e| e.into_inner());
        Ok(lists
            .get(key)
            .map(|list| list.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn put(&self, key: &str, value: String) -> Result<()> {
        self.values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.lists
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
        self.values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
        Ok(())
    }
}
