//! Session store for finished debates

use crate::error::Result;
use crate::model::DebateSession;
use async_trait::async_trait;
use cached::{Cached, TimedCache};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// Default lifespan of a stored session
pub const DEFAULT_TTL: Duration = Duration::from_secs(600);

/// Storage for finished sessions, keyed by subject
///
/// Owned by the caller and injected into the service; agents never touch it.
#[async_trait]
pub trait DebateStore: Send + Sync {
    /// A fresh session for `subject`, if any
    async fn get(&self, subject: &str) -> Result<Option<DebateSession>>;

    /// Store a session under its subject, replacing any previous one
    async fn put(&self, session: DebateSession) -> Result<()>;

    /// Forget the session for `subject`
    async fn invalidate(&self, subject: &str) -> Result<()>;
}

/// Store keys are case-insensitive subjects
pub fn store_key(subject: &str) -> String {
    subject.trim().to_uppercase()
}

/// In-memory store whose entries expire after a fixed lifespan
#[derive(Clone)]
pub struct TimedDebateStore {
    cache: Arc<RwLock<TimedCache<String, DebateSession>>>,
    ttl: Duration,
}

impl TimedDebateStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Arc::new(RwLock::new(TimedCache::with_lifespan(ttl))),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of stored entries, expired ones included until evicted
    pub async fn len(&self) -> usize {
        let cache = self.cache.read().await;
        cache.cache_size()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop every entry
    pub async fn clear(&self) {
        let mut cache = self.cache.write().await;
        cache.cache_clear();
    }
}

impl Default for TimedDebateStore {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

#[async_trait]
impl DebateStore for TimedDebateStore {
    async fn get(&self, subject: &str) -> Result<Option<DebateSession>> {
        let key = store_key(subject);
        let mut cache = self.cache.write().await;
        let hit = cache.cache_get(&key).cloned();
        debug!(key = %key, hit = hit.is_some(), "Debate store lookup");
        Ok(hit)
    }

    async fn put(&self, session: DebateSession) -> Result<()> {
        let key = store_key(&session.subject);
        let mut cache = self.cache.write().await;
        let _ = cache.cache_set(key, session);
        Ok(())
    }

    async fn invalidate(&self, subject: &str) -> Result<()> {
        let mut cache = self.cache.write().await;
        let _ = cache.cache_remove(&store_key(subject));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_and_get_case_insensitive() {
        let store = TimedDebateStore::default();
        let session = DebateSession::unavailable("aapl", "offline");
        store.put(session.clone()).await.unwrap();

        assert_eq!(store.get("AAPL").await.unwrap(), Some(session.clone()));
        assert_eq!(store.get(" aapl ").await.unwrap(), Some(session));
        assert_eq!(store.get("MSFT").await.unwrap(), None);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_put_replaces_previous() {
        let store = TimedDebateStore::default();
        store.put(DebateSession::unavailable("TSLA", "first")).await.unwrap();
        store.put(DebateSession::unavailable("TSLA", "second")).await.unwrap();

        let stored = store.get("TSLA").await.unwrap().unwrap();
        assert!(stored.summary.ends_with("second"));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_invalidate_and_clear() {
        let store = TimedDebateStore::default();
        store.put(DebateSession::unavailable("NVDA", "x")).await.unwrap();
        store.put(DebateSession::unavailable("AMD", "x")).await.unwrap();

        store.invalidate("nvda").await.unwrap();
        assert!(store.get("NVDA").await.unwrap().is_none());
        assert!(store.get("AMD").await.unwrap().is_some());

        store.clear().await;
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let store = TimedDebateStore::new(Duration::from_millis(50));
        store.put(DebateSession::unavailable("GOOG", "x")).await.unwrap();
        assert!(store.get("GOOG").await.unwrap().is_some());

        std::thread::sleep(Duration::from_millis(120));
        assert!(store.get("GOOG").await.unwrap().is_none());
    }

    #[test]
    fn test_default_ttl() {
        assert_eq!(TimedDebateStore::default().ttl(), Duration::from_secs(600));
        assert_eq!(store_key(" brk.b "), "BRK.B");
    }
}
