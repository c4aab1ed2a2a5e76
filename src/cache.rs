use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::Context;
use axum::async_trait;
use redis::AsyncCommands;

/// Key-value store for revoked-token blacklisting and current-user caching.
///
/// Entries are advisory: callers must treat every failure as a cache miss
/// and fall back to the database.
#[async_trait]
pub trait TokenCache: Send + Sync {
    async fn set_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> anyhow::Result<()>;
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn exists(&self, key: &str) -> anyhow::Result<bool>;
}

pub fn blacklist_key(token: &str) -> String {
    format!("bl:{token}")
}

pub fn user_key(token: &str) -> String {
    format!("user:{token}")
}

#[derive(Clone)]
pub struct RedisCache {
    conn: redis::aio::ConnectionManager,
}

impl RedisCache {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(url).context("parse redis url")?;
        let conn = redis::aio::ConnectionManager::new(client)
            .await
            .context("connect to redis")?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl TokenCache for RedisCache {
    async fn set_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl_secs)
            .await
            .context("redis setex")?;
        Ok(())
    }

    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await.context("redis get")?;
        Ok(value)
    }

    async fn exists(&self, key: &str) -> anyhow::Result<bool> {
        let mut conn = self.conn.clone();
        let found: bool = conn.exists(key).await.context("redis exists")?;
        Ok(found)
    }
}

/// In-process fallback used when Redis is unreachable at startup and in tests.
#[derive(Default)]
pub struct InMemoryCache {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenCache for InMemoryCache {
    async fn set_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> anyhow::Result<()> {
        let deadline = Instant::now() + Duration::from_secs(ttl_secs);
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (value.to_string(), deadline));
        Ok(())
    }

    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some((value, deadline)) if *deadline > Instant::now() => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn exists(&self, key: &str) -> anyhow::Result<bool> {
        Ok(self.get(key).await?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_roundtrip() {
        let cache = InMemoryCache::new();
        cache.set_with_ttl("user:abc", "{}", 60).await.unwrap();
        assert_eq!(cache.get("user:abc").await.unwrap(), Some("{}".into()));
        assert!(cache.exists("user:abc").await.unwrap());
        assert!(!cache.exists("user:other").await.unwrap());
    }

    #[tokio::test]
    async fn in_memory_expires() {
        let cache = InMemoryCache::new();
        cache.set_with_ttl("bl:tok", "1", 0).await.unwrap();
        assert_eq!(cache.get("bl:tok").await.unwrap(), None);
        assert!(!cache.exists("bl:tok").await.unwrap());
    }

    #[test]
    fn key_formats() {
        assert_eq!(blacklist_key("t"), "bl:t");
        assert_eq!(user_key("t"), "user:t");
    }
}
