//! Session table: lazily created, bounded, per-session exclusive access.
//!
//! Each session lives behind its own `tokio::sync::Mutex`. The controller
//! holds that lock for a whole turn, so two requests for the same session id
//! run one after the other while different sessions proceed in parallel.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lru::LruCache;
use tokio::sync::Mutex;
use tracing::debug;

use cybvector_hygiene::HygieneState;
use cybvector_shared::{SessionId, SessionsConfig};

/// One conversation.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub created_at: DateTime<Utc>,
    pub hygiene: HygieneState,
}

impl Session {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            hygiene: HygieneState::default(),
        }
    }
}

/// Shared handle; lock it for exclusive access to the session.
pub type SessionHandle = Arc<Mutex<Session>>;

/// Where the controller keeps sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetch the session for `id`, creating it if unknown or expired.
    async fn checkout(&self, id: &SessionId) -> SessionHandle;

    /// Number of sessions currently held.
    async fn len(&self) -> usize;

    /// Drop every expired session. Returns how many were removed.
    async fn prune_expired(&self) -> usize;
}

struct Slot {
    handle: SessionHandle,
    last_seen: Instant,
}

/// In-process store bounded by capacity (LRU) and idle time (TTL).
pub struct InMemorySessionStore {
    slots: Mutex<LruCache<SessionId, Slot>>,
    ttl: Duration,
}

impl InMemorySessionStore {
    /// `capacity` is clamped to at least one session.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            slots: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    pub fn from_config(config: &SessionsConfig) -> Self {
        Self::new(config.max_sessions, Duration::from_secs(config.ttl_secs))
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::from_config(&SessionsConfig::default())
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn checkout(&self, id: &SessionId) -> SessionHandle {
        let mut slots = self.slots.lock().await;
        let now = Instant::now();

        if let Some(slot) = slots.get_mut(id) {
            if now.duration_since(slot.last_seen) < self.ttl {
                slot.last_seen = now;
                return Arc::clone(&slot.handle);
            }
            debug!(session = %id, "session expired, starting fresh");
        }

        let handle = Arc::new(Mutex::new(Session::new(id.clone())));
        if let Some((evicted, _)) = slots.push(
            id.clone(),
            Slot {
                handle: Arc::clone(&handle),
                last_seen: now,
            },
        ) {
            if &evicted != id {
                debug!(session = %evicted, "evicted least recently used session");
            }
        }
        handle
    }

    async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }

    async fn prune_expired(&self) -> usize {
        let mut slots = self.slots.lock().await;
        let now = Instant::now();

        let expired: Vec<SessionId> = slots
            .iter()
            .filter(|(_, slot)| now.duration_since(slot.last_seen) >= self.ttl)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &expired {
            slots.pop(id);
        }
        expired.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> SessionId {
        SessionId::from_client(Some(raw))
    }

    #[tokio::test]
    async fn checkout_creates_then_reuses() {
        let store = InMemorySessionStore::new(10, Duration::from_secs(60));

        let first = store.checkout(&id("a")).await;
        first.lock().await.hygiene.start();

        let again = store.checkout(&id("a")).await;
        assert!(Arc::ptr_eq(&first, &again));
        assert!(again.lock().await.hygiene.is_active());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn expired_session_is_replaced() {
        let store = InMemorySessionStore::new(10, Duration::from_millis(50));

        let first = store.checkout(&id("a")).await;
        first.lock().await.hygiene.start();
        tokio::time::sleep(Duration::from_millis(80)).await;

        let fresh = store.checkout(&id("a")).await;
        assert!(!Arc::ptr_eq(&first, &fresh));
        assert!(!fresh.lock().await.hygiene.is_active());
    }

    #[tokio::test]
    async fn capacity_evicts_least_recently_used() {
        let store = InMemorySessionStore::new(2, Duration::from_secs(60));

        let a = store.checkout(&id("a")).await;
        store.checkout(&id("b")).await;
        store.checkout(&id("a")).await; // a is now most recent
        store.checkout(&id("c")).await; // evicts b

        assert_eq!(store.len().await, 2);
        assert!(Arc::ptr_eq(&a, &store.checkout(&id("a")).await));
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn prune_removes_only_expired() {
        let store = InMemorySessionStore::new(10, Duration::from_millis(50));

        store.checkout(&id("old")).await;
        tokio::time::sleep(Duration::from_millis(80)).await;
        store.checkout(&id("new")).await;

        assert_eq!(store.prune_expired().await, 1);
        assert_eq!(store.len().await, 1);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let store = InMemorySessionStore::new(0, Duration::from_secs(1));
        assert_eq!(store.slots.try_lock().unwrap().cap().get(), 1);
    }
}
