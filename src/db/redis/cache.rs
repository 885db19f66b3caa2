use redis::AsyncCommands;
use redis::Client;
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use crate::error::AppError;
use crate::error::AppResult;
use crate::models::MediaType;

/// TTL for TMDB search results, in seconds
pub const SEARCH_TTL: u64 = 60 * 60;

/// TTL for TMDB title details, in seconds
pub const DETAILS_TTL: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    TmdbSearch(String),
    TmdbDetails(MediaType, i64),
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::TmdbSearch(query) => {
                write!(f, "tmdb:search:{}", query.trim().to_lowercase())
            }
            CacheKey::TmdbDetails(media_type, id) => write!(f, "tmdb:{}:{}", media_type, id),
        }
    }
}

/// Creates a Redis client for caching
///
/// Uses connection pooling via the connection-manager feature.
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

/// Message for asynchronous cache writes
struct CacheWriteMessage {
    key: String,
    value: String,
    ttl: u64,
}

type MemoryEntries = Arc<Mutex<HashMap<String, (String, Instant)>>>;

#[derive(Clone)]
enum Backend {
    Redis {
        client: Client,
        write_tx: mpsc::UnboundedSender<CacheWriteMessage>,
    },
    Memory(MemoryEntries),
}

/// JSON value cache in front of slow upstream APIs
///
/// Backed by Redis in production. The in-process backend is used with
/// `memory://` URLs and in tests.
#[derive(Clone)]
pub struct Cache {
    backend: Backend,
}

/// Handle for gracefully shutting down the cache writer
pub struct CacheWriterHandle {
    shutdown_tx: Option<mpsc::Sender<()>>,
}

impl CacheWriterHandle {
    /// Signals the writer task to flush pending writes and stop
    pub async fn shutdown(self) {
        if let Some(tx) = self.shutdown_tx {
            let _ = tx.send(()).await;
            tracing::info!("Cache writer shutdown signal sent");
        }
    }
}

impl Cache {
    /// Creates a Redis-backed cache with a background write task
    pub async fn new(redis_client: Client) -> (Self, CacheWriterHandle) {
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let client = redis_client.clone();
        tokio::spawn(async move {
            Self::cache_writer_task(client, write_rx, shutdown_rx).await;
        });

        let cache = Self {
            backend: Backend::Redis {
                client: redis_client,
                write_tx,
            },
        };

        let handle = CacheWriterHandle {
            shutdown_tx: Some(shutdown_tx),
        };

        (cache, handle)
    }

    /// Creates an in-process cache with the same expiry semantics
    pub fn in_memory() -> (Self, CacheWriterHandle) {
        let cache = Self {
            backend: Backend::Memory(Arc::new(Mutex::new(HashMap::new()))),
        };
        (cache, CacheWriterHandle { shutdown_tx: None })
    }

    /// Picks the backend from a URL: `memory://` or a Redis URL
    pub async fn connect(url: &str) -> anyhow::Result<(Self, CacheWriterHandle)> {
        if url.starts_with("memory://") {
            return Ok(Self::in_memory());
        }
        let client = create_redis_client(url)?;
        Ok(Self::new(client).await)
    }

    async fn cache_writer_task(
        client: Client,
        mut write_rx: mpsc::UnboundedReceiver<CacheWriteMessage>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        tracing::info!("Cache writer task started");

        loop {
            tokio::select! {
                Some(msg) = write_rx.recv() => {
                    if let Err(e) = Self::write_to_redis(&client, msg).await {
                        tracing::error!(error = %e, "Failed to write to Redis cache");
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Cache writer shutting down, flushing remaining writes");

                    // Drain without waiting on senders that are still alive
                    while let Ok(msg) = write_rx.try_recv() {
                        if let Err(e) = Self::write_to_redis(&client, msg).await {
                            tracing::error!(error = %e, "Failed to flush cache write during shutdown");
                        }
                    }

                    tracing::info!("Cache writer task stopped");
                    break;
                }
            }
        }
    }

    async fn write_to_redis(client: &Client, msg: CacheWriteMessage) -> AppResult<()> {
        let mut conn = client.get_multiplexed_async_connection().await?;
        let _: () = conn.set_ex(msg.key, msg.value, msg.ttl).await?;
        Ok(())
    }

    async fn read_raw(&self, key: &str) -> AppResult<Option<String>> {
        match &self.backend {
            Backend::Redis { client, .. } => {
                let mut conn = client.get_multiplexed_async_connection().await?;
                let cached: Option<String> = conn.get(key).await?;
                Ok(cached)
            }
            Backend::Memory(entries) => {
                let mut entries = entries
                    .lock()
                    .map_err(|_| AppError::Internal("cache lock poisoned".to_string()))?;
                match entries.get(key) {
                    Some((value, expires)) if *expires > Instant::now() => Ok(Some(value.clone())),
                    Some(_) => {
                        entries.remove(key);
                        Ok(None)
                    }
                    None => Ok(None),
                }
            }
        }
    }

    /// Retrieves a value from the cache by key
    ///
    /// An unreachable Redis is treated as a miss so callers fall through to
    /// the upstream API.
    pub async fn get_from_cache<T: serde::de::DeserializeOwned>(
        &self,
        key: &CacheKey,
    ) -> AppResult<Option<T>> {
        let cached = match self.read_raw(&key.to_string()).await {
            Ok(cached) => cached,
            Err(e) => {
                tracing::warn!(error = %e, key = %key, "Cache read failed, treating as miss");
                None
            }
        };

        match cached {
            Some(json) => {
                let data = serde_json::from_str(&json).map_err(|e| {
                    AppError::Internal(format!("Cache deserialization error: {}", e))
                })?;
                Ok(Some(data))
            }
            None => Ok(None),
        }
    }

    /// Stores a value without waiting for the write to land
    pub fn set_in_background<T: serde::Serialize>(&self, key: &CacheKey, value: &T, ttl: u64) {
        let json = match serde_json::to_string(value) {
            Ok(j) => j,
            Err(e) => {
                tracing::error!(error = %e, "Cache serialization error");
                return;
            }
        };

        match &self.backend {
            Backend::Redis { write_tx, .. } => {
                let msg = CacheWriteMessage {
                    key: key.to_string(),
                    value: json,
                    ttl,
                };
                if let Err(e) = write_tx.send(msg) {
                    tracing::error!(error = %e, "Failed to send cache write message");
                }
            }
            Backend::Memory(entries) => {
                if let Ok(mut entries) = entries.lock() {
                    let expires = Instant::now() + Duration::from_secs(ttl);
                    entries.insert(key.to_string(), (json, expires));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_display_search_is_normalized() {
        let key = CacheKey::TmdbSearch("  THE Matrix ".to_string());
        assert_eq!(key.to_string(), "tmdb:search:the matrix");
    }

    #[test]
    fn test_cache_key_display_details() {
        assert_eq!(
            CacheKey::TmdbDetails(MediaType::Tv, 1396).to_string(),
            "tmdb:tv:1396"
        );
        assert_eq!(
            CacheKey::TmdbDetails(MediaType::Movie, 603).to_string(),
            "tmdb:movie:603"
        );
    }

    #[tokio::test]
    async fn test_memory_cache_round_trip() {
        let (cache, _handle) = Cache::in_memory();
        let key = CacheKey::TmdbSearch("inception".to_string());

        let miss: Option<Vec<String>> = cache.get_from_cache(&key).await.unwrap();
        assert_eq!(miss, None);

        cache.set_in_background(&key, &vec!["a".to_string()], 60);
        let hit: Option<Vec<String>> = cache.get_from_cache(&key).await.unwrap();
        assert_eq!(hit, Some(vec!["a".to_string()]));
    }

    #[tokio::test]
    async fn test_memory_cache_expires() {
        let (cache, _handle) = Cache::in_memory();
        let key = CacheKey::TmdbDetails(MediaType::Movie, 1);

        cache.set_in_background(&key, &1u32, 0);
        let expired: Option<u32> = cache.get_from_cache(&key).await.unwrap();
        assert_eq!(expired, None);
    }

    #[tokio::test]
    async fn test_connect_memory_url() {
        let (cache, handle) = Cache::connect("memory://").await.unwrap();
        let key = CacheKey::TmdbSearch("x".to_string());
        cache.set_in_background(&key, &"y", 60);
        let value: Option<String> = cache.get_from_cache(&key).await.unwrap();
        assert_eq!(value.as_deref(), Some("y"));
        handle.shutdown().await;
    }

    #[tokio::test]
    #[ignore = "requires a running Redis"]
    async fn test_redis_background_write() {
        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());

        let client = create_redis_client(&redis_url).unwrap();
        let (cache, handle) = Cache::new(client.clone()).await;

        let key = CacheKey::TmdbSearch("test_async_write".to_string());
        let value = vec!["item1".to_string(), "item2".to_string()];
        cache.set_in_background(&key, &value, 60);

        handle.shutdown().await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        let retrieved: Option<Vec<String>> = cache.get_from_cache(&key).await.unwrap();
        assert_eq!(retrieved, Some(value));

        let mut conn = client.get_multiplexed_async_connection().await.unwrap();
        let _: () = conn.del(key.to_string()).await.unwrap();
    }
}
