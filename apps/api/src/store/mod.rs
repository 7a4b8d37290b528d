//! Key-value persistence seam.
//!
//! Everything the service persists outside the export directory goes through
//! the [`KeyValueStore`] trait: string keys, string-serialized values,
//! `get`/`set`/`remove`. Production uses Redis when `REDIS_URL` is set;
//! otherwise (and in tests) the in-memory store is used.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::AsyncCommands;
use tokio::sync::RwLock;
use tracing::info;

/// Minimal persistence interface: string keys and values only.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Creates the store backend selected by configuration.
pub async fn create_store(redis_url: Option<&str>) -> Result<Arc<dyn KeyValueStore>> {
    match redis_url {
        Some(url) => {
            info!("Connecting to Redis...");
            let store = RedisStore::connect(url).await?;
            info!("Redis key-value store ready");
            Ok(Arc::new(store))
        }
        None => {
            info!("REDIS_URL not set, using in-memory key-value store");
            Ok(Arc::new(MemoryStore::default()))
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// In-memory backend
// ────────────────────────────────────────────────────────────────────────────

/// Process-local store. Default backend for tests and single-node setups.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Redis backend
// ────────────────────────────────────────────────────────────────────────────

pub struct RedisStore {
    connection: redis::aio::MultiplexedConnection,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).context("invalid REDIS_URL")?;
        let connection = client
            .get_multiplexed_async_connection()
            .await
            .context("failed to connect to Redis")?;
        Ok(Self { connection })
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut con = self.connection.clone();
        let value: Option<String> = con.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut con = self.connection.clone();
        let _: () = con.set(key, value).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut con = self.connection.clone();
        let _: () = con.del(key).await?;
        Ok(())
    }
}
