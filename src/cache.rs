//! Translation cache: one hash per target language, mapping word to translation.
//!
//! [`RedisStore`] is the production backend. [`MemoryStore`] keeps the same
//! layout in process and is selected with a `memory://` cache URL, which is
//! handy for local runs and tests.

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::AsyncCommands;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::info;

/// Upper bound for one store call, connecting included
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("redis did not answer within {0:?}")]
    Timeout(Duration),
}

/// Hash-of-hashes store keyed by (language, word).
///
/// Every operation touches a single key and is atomic on its own; callers
/// never rely on multi-key consistency.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Cached translation, `None` when the field does not exist
    async fn get(&self, language: &str, word: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, language: &str, word: &str, translation: &str) -> Result<(), CacheError>;

    async fn delete(&self, language: &str, word: &str) -> Result<(), CacheError>;

    /// Every language that currently has a hash
    async fn languages(&self) -> Result<Vec<String>, CacheError>;

    /// All word -> translation pairs for one language
    async fn entries(&self, language: &str) -> Result<HashMap<String, String>, CacheError>;
}

/// Open the store named by a cache URL.
///
/// Only URL parsing happens here; the Redis connection is established on
/// first use so the service can start while Redis is still coming up.
pub fn open_store(url: &str) -> Result<Arc<dyn CacheStore>, CacheError> {
    if url.starts_with("memory:") {
        info!("Using in-memory translation cache");
        return Ok(Arc::new(MemoryStore::new()));
    }
    Ok(Arc::new(RedisStore::open(url)?))
}

pub struct RedisStore {
    client: redis::Client,
    connection: OnceCell<ConnectionManager>,
    timeout: Duration,
}

impl RedisStore {
    pub fn open(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        Ok(Self {
            client,
            connection: OnceCell::new(),
            timeout: DEFAULT_OPERATION_TIMEOUT,
        })
    }

    /// Fail any call (including the connect it may trigger) that takes
    /// longer than `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Shared multiplexed connection. It reconnects internally once the first
    /// connect succeeded; until then every call makes one fresh attempt.
    async fn conn(&self) -> Result<ConnectionManager, CacheError> {
        let manager = self
            .connection
            .get_or_try_init(|| async {
                let config = ConnectionManagerConfig::new()
                    .set_number_of_retries(1)
                    .set_connection_timeout(self.timeout)
                    .set_response_timeout(self.timeout);
                let manager =
                    ConnectionManager::new_with_config(self.client.clone(), config).await?;
                info!("Connected to Redis");
                Ok::<_, CacheError>(manager)
            })
            .await?;
        Ok(manager.clone())
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, CacheError>>,
    ) -> Result<T, CacheError> {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| CacheError::Timeout(self.timeout))?
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, language: &str, word: &str) -> Result<Option<String>, CacheError> {
        self.bounded(async {
            let mut conn = self.conn().await?;
            Ok::<_, CacheError>(conn.hget(language, word).await?)
        })
        .await
    }

    async fn set(&self, language: &str, word: &str, translation: &str) -> Result<(), CacheError> {
        self.bounded(async {
            let mut conn = self.conn().await?;
            conn.hset::<_, _, _, ()>(language, word, translation).await?;
            Ok::<_, CacheError>(())
        })
        .await
    }

    async fn delete(&self, language: &str, word: &str) -> Result<(), CacheError> {
        self.bounded(async {
            let mut conn = self.conn().await?;
            conn.hdel::<_, _, ()>(language, word).await?;
            Ok::<_, CacheError>(())
        })
        .await
    }

    async fn languages(&self) -> Result<Vec<String>, CacheError> {
        self.bounded(async {
            let mut conn = self.conn().await?;
            Ok::<_, CacheError>(conn.keys("*").await?)
        })
        .await
    }

    async fn entries(&self, language: &str) -> Result<HashMap<String, String>, CacheError> {
        self.bounded(async {
            let mut conn = self.conn().await?;
            Ok::<_, CacheError>(conn.hgetall(language).await?)
        })
        .await
    }
}

/// In-process store with the same layout as the Redis one
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<HashMap<String, HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_data<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, HashMap<String, String>>) -> T,
    ) -> T {
        let mut data = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut data)
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, language: &str, word: &str) -> Result<Option<String>, CacheError> {
        Ok(self.with_data(|data| data.get(language).and_then(|hash| hash.get(word).cloned())))
    }

    async fn set(&self, language: &str, word: &str, translation: &str) -> Result<(), CacheError> {
        self.with_data(|data| {
            data.entry(language.to_string())
                .or_default()
                .insert(word.to_string(), translation.to_string());
        });
        Ok(())
    }

    async fn delete(&self, language: &str, word: &str) -> Result<(), CacheError> {
        self.with_data(|data| {
            if let Some(hash) = data.get_mut(language) {
                hash.remove(word);
                // Redis drops a hash once its last field is gone
                if hash.is_empty() {
                    data.remove(language);
                }
            }
        });
        Ok(())
    }

    async fn languages(&self) -> Result<Vec<String>, CacheError> {
        Ok(self.with_data(|data| data.keys().cloned().collect()))
    }

    async fn entries(&self, language: &str) -> Result<HashMap<String, String>, CacheError> {
        Ok(self.with_data(|data| data.get(language).cloned().unwrap_or_default()))
    }
}
