/// Generation sessions
///
/// A session holds everything a refresh round needs: the aggregated pool, the
/// search parameters to re-aggregate with, what was last delivered and the
/// cumulative rejection log. Sessions are keyed per (profile, occasion,
/// generation) and expire after a TTL; nothing here is process-global.
use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

use crate::{
    db::{Cache, CacheKey},
    error::{AppError, AppResult},
    models::{
        CandidateRecommendation, OccasionType, RejectionEvent, ScoredCandidate, SearchParams,
        VibeTag,
    },
    services::scorer::VibeCache,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub profile_id: Uuid,
    pub occasion: OccasionType,
    pub generation_id: Uuid,
}

impl SessionKey {
    pub fn new(profile_id: Uuid, occasion: OccasionType, generation_id: Uuid) -> Self {
        Self {
            profile_id,
            occasion,
            generation_id,
        }
    }
}

impl Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.profile_id, self.occasion, self.generation_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub params: SearchParams,
    pub pool: Vec<CandidateRecommendation>,
    /// The most recently delivered triple
    pub delivered: Vec<ScoredCandidate>,
    /// Every rejection in this session, oldest first
    pub rejections: Vec<RejectionEvent>,
    /// Replaces the profile's vibe set for this and later rounds
    #[serde(default)]
    pub vibe_override: Option<Vec<VibeTag>>,
    /// Vibe tags classified so far, by candidate id
    #[serde(default)]
    pub vibe_cache: VibeCache,
    /// Completed refresh rounds
    pub round: u32,
    pub created_at: DateTime<Utc>,
}

impl SessionState {
    pub fn new(
        params: SearchParams,
        pool: Vec<CandidateRecommendation>,
        delivered: Vec<ScoredCandidate>,
        vibe_cache: VibeCache,
    ) -> Self {
        Self {
            params,
            pool,
            delivered,
            rejections: Vec::new(),
            vibe_override: None,
            vibe_cache,
            round: 0,
            created_at: Utc::now(),
        }
    }

    /// Ids that must never be shown again in this session
    pub fn excluded_ids(&self) -> HashSet<String> {
        self.rejections
            .iter()
            .map(|r| r.candidate_id.clone())
            .collect()
    }

    pub fn candidate(&self, id: &str) -> Option<&CandidateRecommendation> {
        self.pool.iter().find(|c| c.id == id)
    }

    /// Adds fresh candidates, skipping ids and (title, merchant) keys already pooled
    pub fn merge_pool(&mut self, fresh: Vec<CandidateRecommendation>) -> usize {
        let mut ids: HashSet<String> = self.pool.iter().map(|c| c.id.clone()).collect();
        let mut keys: HashSet<(String, String)> = self.pool.iter().map(|c| c.dedup_key()).collect();

        let before = self.pool.len();
        for candidate in fresh {
            if ids.insert(candidate.id.clone()) && keys.insert(candidate.dedup_key()) {
                self.pool.push(candidate);
            }
        }
        self.pool.len() - before
    }

    /// Records the vibe tags the scorer assigned
    pub fn remember_vibes(&mut self, scored: &[ScoredCandidate]) {
        for candidate in scored {
            self.vibe_cache
                .insert(candidate.id().to_string(), candidate.vibe_tag);
        }
    }
}

/// Redis lease lifetime; bounds how long a crashed holder blocks the session
const LEASE_TTL_MS: u64 = 30_000;
/// How long a refresh waits for a session another refresh holds
const LEASE_WAIT: Duration = Duration::from_secs(15);
const LEASE_RETRY: Duration = Duration::from_millis(50);

/// Exclusive hold on one session for a read-modify-write cycle
///
/// Dropping the lease frees the in-process lock; `SessionStore::release`
/// also frees any cross-process lock.
pub struct SessionLease {
    _local: OwnedMutexGuard<()>,
    token: Option<String>,
}

/// One async mutex per live session key
#[derive(Default)]
struct KeyedLocks {
    locks: Mutex<HashMap<SessionKey, Weak<Mutex<()>>>>,
}

impl KeyedLocks {
    async fn acquire(&self, key: &SessionKey) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.retain(|_, lock| lock.strong_count() > 0);
            match locks.get(key).and_then(Weak::upgrade) {
                Some(lock) => lock,
                None => {
                    let lock = Arc::new(Mutex::new(()));
                    locks.insert(*key, Arc::downgrade(&lock));
                    lock
                }
            }
        };
        lock.lock_owned().await
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    /// `None` when the session never existed or has expired
    async fn get(&self, key: &SessionKey) -> AppResult<Option<SessionState>>;

    async fn put(&self, key: &SessionKey, state: &SessionState) -> AppResult<()>;

    /// Waits until no other caller holds `key`
    async fn acquire(&self, key: &SessionKey) -> AppResult<SessionLease>;

    async fn release(&self, key: &SessionKey, lease: SessionLease) -> AppResult<()>;
}

/// Sessions in Redis; writes are awaited so the next refresh sees them
///
/// Leases combine a per-process mutex with a `SET NX PX` lock key, so
/// refreshes of one session are serialized across instances too.
pub struct RedisSessionStore {
    cache: Cache,
    ttl_secs: u64,
    local: KeyedLocks,
}

impl RedisSessionStore {
    pub fn new(cache: Cache, ttl_secs: u64) -> Self {
        Self {
            cache,
            ttl_secs,
            local: KeyedLocks::default(),
        }
    }
}

#[async_trait::async_trait]
impl SessionStore for RedisSessionStore {
    async fn get(&self, key: &SessionKey) -> AppResult<Option<SessionState>> {
        self.cache
            .get_from_cache(&CacheKey::Session(key.to_string()))
            .await
    }

    async fn put(&self, key: &SessionKey, state: &SessionState) -> AppResult<()> {
        self.cache
            .set(&CacheKey::Session(key.to_string()), state, self.ttl_secs)
            .await?;
        tracing::debug!(session = %key, pool_size = state.pool.len(), "Session stored");
        Ok(())
    }

    async fn acquire(&self, key: &SessionKey) -> AppResult<SessionLease> {
        let local = self.local.acquire(key).await;
        let lock_key = CacheKey::SessionLock(key.to_string());
        let token = Uuid::new_v4().to_string();
        let deadline = Instant::now() + LEASE_WAIT;

        while !self.cache.try_lock(&lock_key, &token, LEASE_TTL_MS).await? {
            if Instant::now() >= deadline {
                tracing::warn!(session = %key, "Timed out waiting for session lease");
                return Err(AppError::SessionBusy(key.to_string()));
            }
            tokio::time::sleep(LEASE_RETRY).await;
        }

        Ok(SessionLease {
            _local: local,
            token: Some(token),
        })
    }

    async fn release(&self, key: &SessionKey, lease: SessionLease) -> AppResult<()> {
        if let Some(token) = &lease.token {
            let released = self
                .cache
                .unlock(&CacheKey::SessionLock(key.to_string()), token)
                .await?;
            if !released {
                tracing::warn!(session = %key, "Session lease expired before release");
            }
        }
        Ok(())
    }
}

/// In-process sessions with the same TTL semantics, for single-node runs and tests
pub struct MemorySessionStore {
    entries: RwLock<HashMap<SessionKey, (Instant, SessionState)>>,
    ttl: Duration,
    locks: KeyedLocks,
}

impl MemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            locks: KeyedLocks::default(),
        }
    }
}

#[async_trait::async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, key: &SessionKey) -> AppResult<Option<SessionState>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|(stored_at, _)| stored_at.elapsed() < self.ttl)
            .map(|(_, state)| state.clone()))
    }

    async fn put(&self, key: &SessionKey, state: &SessionState) -> AppResult<()> {
        let mut entries = self.entries.write().await;
        let ttl = self.ttl;
        entries.retain(|_, (stored_at, _)| stored_at.elapsed() < ttl);
        entries.insert(*key, (Instant::now(), state.clone()));
        Ok(())
    }

    async fn acquire(&self, key: &SessionKey) -> AppResult<SessionLease> {
        Ok(SessionLease {
            _local: self.locks.acquire(key).await,
            token: None,
        })
    }

    async fn release(&self, _key: &SessionKey, lease: SessionLease) -> AppResult<()> {
        drop(lease);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::models::{BudgetRange, VibeTag};

    pub fn params() -> SearchParams {
        SearchParams {
            interests: vec!["Wine".to_string(), "Art".to_string()],
            vibes: vec![VibeTag::Romantic],
            keywords: vec![],
            budget: BudgetRange::new(1_000, 10_000, "USD"),
            location: None,
            occasion: OccasionType::MinorOccasion,
            limit: 10,
        }
    }
}
