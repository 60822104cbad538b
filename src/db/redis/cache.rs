use std::fmt::Display;

use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::mpsc;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Generation session, already rendered as "profile:occasion:generation"
    Session(String),
    /// Liveness verdict for an external URL
    Liveness(String),
    /// Mutual-exclusion lease for one session, same rendering as `Session`
    SessionLock(String),
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::Session(key) => write!(f, "session:{}", key),
            CacheKey::Liveness(url) => write!(f, "live:{}", url.trim_end_matches('/')),
            CacheKey::SessionLock(key) => write!(f, "session-lock:{}", key),
        }
    }
}

/// Opens a Redis client backing session state and liveness memoization
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    Ok(Client::open(redis_url)?)
}

fn encode<T: Serialize>(value: &T) -> AppResult<String> {
    serde_json::to_string(value)
        .map_err(|e| AppError::Internal(format!("Cache serialization error: {}", e)))
}

fn decode<T: DeserializeOwned>(raw: &str) -> AppResult<T> {
    serde_json::from_str(raw)
        .map_err(|e| AppError::Internal(format!("Cache deserialization error: {}", e)))
}

/// Deletes the lock only while it still holds the caller's token
const RELEASE_LOCK_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
end
return 0
"#;

/// A fire-and-forget write queued for the background writer
struct PendingWrite {
    key: String,
    payload: String,
    ttl_secs: u64,
}

/// JSON-over-Redis store with an acknowledged write path and a background one
#[derive(Clone)]
pub struct Cache {
    client: Client,
    queue: mpsc::UnboundedSender<PendingWrite>,
}

/// Stops the background writer once queued writes are flushed
pub struct CacheWriterHandle {
    stop: mpsc::Sender<()>,
}

impl CacheWriterHandle {
    pub async fn shutdown(self) {
        if self.stop.send(()).await.is_err() {
            tracing::warn!("Cache writer already stopped");
            return;
        }
        tracing::info!("Cache writer asked to stop");
    }
}

impl Cache {
    /// Builds the cache and spawns its background writer on the current runtime
    pub fn new(client: Client) -> (Self, CacheWriterHandle) {
        let (queue, pending) = mpsc::unbounded_channel();
        let (stop, stop_rx) = mpsc::channel(1);

        tokio::spawn(run_writer(client.clone(), pending, stop_rx));

        (Self { client, queue }, CacheWriterHandle { stop })
    }

    async fn connection(&self) -> AppResult<MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    /// Reads and decodes `key`, `None` on a miss
    pub async fn get_from_cache<T: DeserializeOwned>(&self, key: &CacheKey) -> AppResult<Option<T>> {
        let raw: Option<String> = self.connection().await?.get(key.to_string()).await?;
        raw.as_deref().map(decode::<T>).transpose()
    }

    /// Writes `value` and waits for Redis to acknowledge it
    ///
    /// Session state goes through here so the next request observes it.
    pub async fn set<T: Serialize>(&self, key: &CacheKey, value: &T, ttl_secs: u64) -> AppResult<()> {
        let payload = encode(value)?;
        let _: () = self
            .connection()
            .await?
            .set_ex(key.to_string(), payload, ttl_secs)
            .await?;
        Ok(())
    }

    /// Takes `key` for `token` unless someone else holds it; expires after `ttl_ms`
    pub async fn try_lock(&self, key: &CacheKey, token: &str, ttl_ms: u64) -> AppResult<bool> {
        let reply: Option<String> = redis::cmd("SET")
            .arg(key.to_string())
            .arg(token)
            .arg("NX")
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut self.connection().await?)
            .await?;
        Ok(reply.is_some())
    }

    /// Releases `key` if `token` still owns it; `false` when the lease had already lapsed
    pub async fn unlock(&self, key: &CacheKey, token: &str) -> AppResult<bool> {
        let deleted: i64 = redis::Script::new(RELEASE_LOCK_SCRIPT)
            .key(key.to_string())
            .arg(token)
            .invoke_async(&mut self.connection().await?)
            .await?;
        Ok(deleted == 1)
    }

    /// Queues `value` for the background writer and returns immediately
    pub fn set_in_background<T: Serialize>(&self, key: &CacheKey, value: &T, ttl_secs: u64) {
        let payload = match encode(value) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(key = %key, error = %e, "Dropping cache write");
                return;
            }
        };

        let write = PendingWrite {
            key: key.to_string(),
            payload,
            ttl_secs,
        };
        if self.queue.send(write).is_err() {
            tracing::warn!(key = %key, "Cache writer stopped, write dropped");
        }
    }
}

/// Drains the write queue over one reused connection, reconnecting after a failure
async fn run_writer(
    client: Client,
    mut pending: mpsc::UnboundedReceiver<PendingWrite>,
    mut stop: mpsc::Receiver<()>,
) {
    let mut conn: Option<MultiplexedConnection> = None;
    tracing::debug!("Cache writer started");

    loop {
        tokio::select! {
            Some(write) = pending.recv() => {
                flush_one(&client, &mut conn, write).await;
            }
            _ = stop.recv() => {
                // Cloned Cache handles keep the sender alive, so drain what is queued now
                let mut flushed = 0usize;
                while let Ok(write) = pending.try_recv() {
                    flush_one(&client, &mut conn, write).await;
                    flushed += 1;
                }
                tracing::info!(flushed, "Cache writer stopped");
                break;
            }
        }
    }
}

async fn flush_one(client: &Client, conn: &mut Option<MultiplexedConnection>, write: PendingWrite) {
    if conn.is_none() {
        match client.get_multiplexed_async_connection().await {
            Ok(fresh) => *conn = Some(fresh),
            Err(e) => {
                tracing::error!(key = %write.key, error = %e, "Cache writer could not connect");
                return;
            }
        }
    }

    let Some(active) = conn.as_mut() else {
        return;
    };
    let result: redis::RedisResult<()> = active
        .set_ex(&write.key, write.payload, write.ttl_secs)
        .await;
    if let Err(e) = result {
        tracing::error!(key = %write.key, error = %e, "Background cache write failed");
        *conn = None;
    }
}
