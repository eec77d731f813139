use anyhow::{Context, Result};
use redis::{aio::ConnectionManager, AsyncCommands};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// External key-value store holding the last rendered feed document.
///
/// Two operations are all the pipeline needs: read a key, and write a key
/// with a fixed expiry. Entries disappear on expiry; there is no other
/// invalidation.
#[async_trait::async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<()>;
}

/// Redis-backed store.
///
/// Uses a `ConnectionManager` for automatic reconnection and resilience.
pub struct RedisStore {
    conn_manager: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        info!(url = redis_url, "initializing redis connection manager");
        let client = redis::Client::open(redis_url).context("invalid redis URL")?;
        let conn_manager = ConnectionManager::new(client)
            .await
            .context("failed to create redis connection manager")?;
        Ok(Self { conn_manager })
    }
}

#[async_trait::async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn_manager.clone();
        let value: Option<String> = conn
            .get(key)
            .await
            .with_context(|| format!("redis GET failed for key {key}"))?;
        match &value {
            Some(_) => debug!(key, "cache HIT"),
            None => debug!(key, "cache MISS"),
        }
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl_seconds)
            .await
            .with_context(|| format!("redis SETEX failed for key {key}"))?;
        debug!(key, ttl = ttl_seconds, "cache SETEX");
        Ok(())
    }
}

/// In-process store for single-instance deployments and tests.
/// Entries expire on read once their deadline passes.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.entries.lock().await;
        if let Some((value, deadline)) = entries.get(key) {
            if Instant::now() < *deadline {
                debug!(key, "cache HIT");
                return Ok(Some(value.clone()));
            }
        }
        entries.remove(key);
        debug!(key, "cache MISS");
        Ok(None)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<()> {
        let deadline = Instant::now() + Duration::from_secs(ttl_seconds);
        self.entries
            .lock()
            .await
            .insert(key.to_string(), (value.to_string(), deadline));
        debug!(key, ttl = ttl_seconds, "cache SET");
        Ok(())
    }
}
