//! # Key-Value Store
//!
//! Short-lived shared state: OTP records and admin notification feeds.
//!
//! ```text
//! ┌──────────────────┐        ┌─────────────────────────────────────┐
//! │  OtpService      │───────►│  KvStore                            │
//! │  NotificationFeed│        │   ├── Memory (single instance, dev) │
//! └──────────────────┘        │   └── Redis  (multi-instance)       │
//!                             └─────────────────────────────────────┘
//! ```
//!
//! Values are strings; [`KvStore::get_json`] and [`KvStore::set_json`]
//! wrap them with serde.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::info;

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum KvError {
    #[error("Key-value backend error: {0}")]
    Backend(String),

    #[error("Stored value is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<redis::RedisError> for KvError {
    fn from(err: redis::RedisError) -> Self {
        KvError::Backend(err.to_string())
    }
}

pub type KvResult<T> = Result<T, KvError>;

// =============================================================================
// Trait
// =============================================================================

/// Minimal string store with optional expiry.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> impl Future<Output = KvResult<Option<String>>> + Send;

    /// Stores `value`. With `ttl` the key disappears after that duration.
    fn set(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> impl Future<Output = KvResult<()>> + Send;

    /// Removes `key`. Missing keys are not an error.
    fn delete(&self, key: &str) -> impl Future<Output = KvResult<()>> + Send;

    /// Sets a fresh expiry on an existing key without touching its value.
    /// Returns whether the key existed.
    fn expire(&self, key: &str, ttl: Duration) -> impl Future<Output = KvResult<bool>> + Send;
}

/// Whole seconds for Redis expiries, rounded up and at least 1.
fn whole_secs(ttl: Duration) -> u64 {
    (ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0)).max(1)
}

// =============================================================================
// In-memory backend
// =============================================================================

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// Process-local store. Expired keys are dropped lazily on write.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> KvResult<Option<String>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|entry| entry.is_live(Instant::now()))
            .map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> KvResult<()> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| entry.is_live(now));
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: ttl.map(|ttl| now + ttl),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> KvResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> KvResult<bool> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        match entries.get_mut(key).filter(|entry| entry.is_live(now)) {
            Some(entry) => {
                entry.expires_at = Some(now + ttl);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

// =============================================================================
// Redis backend
// =============================================================================

/// Redis-backed store sharing one `ConnectionManager` across clones.
#[derive(Clone)]
pub struct RedisStore {
    conn_manager: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> KvResult<Self> {
        let client = Client::open(redis_url)?;
        let conn_manager = ConnectionManager::new(client).await?;
        info!("Connected to Redis");
        Ok(RedisStore { conn_manager })
    }
}

impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> KvResult<Option<String>> {
        let mut conn = self.conn_manager.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> KvResult<()> {
        let mut conn = self.conn_manager.clone();
        match ttl {
            Some(ttl) => {
                let () = conn.set_ex(key, value, whole_secs(ttl)).await?;
            }
            None => {
                let () = conn.set(key, value).await?;
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> KvResult<()> {
        let mut conn = self.conn_manager.clone();
        let _: i64 = conn.del(key).await?;
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> KvResult<bool> {
        let mut conn = self.conn_manager.clone();
        let secs = i64::try_from(whole_secs(ttl)).unwrap_or(i64::MAX);
        let existed: bool = conn.expire(key, secs).await?;
        Ok(existed)
    }
}

// =============================================================================
// Configured store
// =============================================================================

/// The store selected at startup.
#[derive(Clone)]
pub enum KvStore {
    Memory(MemoryStore),
    Redis(RedisStore),
}

impl KvStore {
    pub fn memory() -> Self {
        KvStore::Memory(MemoryStore::new())
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> KvResult<Option<T>> {
        match self.get(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn set_json<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> KvResult<()> {
        let raw = serde_json::to_string(value)?;
        self.set(key, raw, ttl).await
    }
}

impl KeyValueStore for KvStore {
    async fn get(&self, key: &str) -> KvResult<Option<String>> {
        match self {
            KvStore::Memory(store) => store.get(key).await,
            KvStore::Redis(store) => store.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> KvResult<()> {
        match self {
            KvStore::Memory(store) => store.set(key, value, ttl).await,
            KvStore::Redis(store) => store.set(key, value, ttl).await,
        }
    }

    async fn delete(&self, key: &str) -> KvResult<()> {
        match self {
            KvStore::Memory(store) => store.delete(key).await,
            KvStore::Redis(store) => store.delete(key).await,
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> KvResult<bool> {
        match self {
            KvStore::Memory(store) => store.expire(key, ttl).await,
            KvStore::Redis(store) => store.expire(key, ttl).await,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
