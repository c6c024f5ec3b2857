//! In-memory cache store.
//!
//! Uses a HashMap behind a tokio RwLock. Entries carry their own deadline and
//! read as misses once it passes; the sweeper removes them for good.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::CacheStore;
use crate::Error;

struct Entry {
    value: Vec<u8>,
    stored_at: Instant,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }
}

/// Process-local [`CacheStore`]. Cloning shares the underlying map.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<Vec<u8>, Entry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired or not.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        let entries = self.entries.read().await;
        let now = Instant::now();
        Ok(entries.get(key).filter(|entry| !entry.is_expired(now)).map(|entry| entry.value.clone()))
    }

    async fn put(&self, key: &[u8], value: &[u8], ttl: Option<Duration>) -> Result<(), Error> {
        let stored_at = Instant::now();
        let entry = Entry { value: value.to_vec(), stored_at, expires_at: ttl.and_then(|ttl| stored_at.checked_add(ttl)) };
        self.entries.write().await.insert(key.to_vec(), entry);
        Ok(())
    }

    async fn delete(&self, key: &[u8]) -> Result<(), Error> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, Error> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        Ok((before - entries.len()) as u64)
    }

    async fn purge_oldest(&self, max_entries: usize) -> Result<u64, Error> {
        let mut entries = self.entries.write().await;
        if entries.len() <= max_entries {
            return Ok(0);
        }

        let mut by_age: Vec<(Instant, Vec<u8>)> =
            entries.iter().map(|(key, entry)| (entry.stored_at, key.clone())).collect();
        by_age.sort_by_key(|(stored_at, _)| *stored_at);

        let to_delete = entries.len() - max_entries;
        for (_, key) in by_age.into_iter().take(to_delete) {
            entries.remove(&key);
        }
        Ok(to_delete as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = MemoryStore::new();
        store.put(b"k", b"v", None).await.unwrap();
        assert_eq!(store.get(b"k").await.unwrap().as_deref(), Some(&b"v"[..]));

        store.delete(b"k").await.unwrap();
        assert!(store.get(b"k").await.unwrap().is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let store = MemoryStore::new();
        store.put(b"short", b"v", Some(Duration::from_millis(1))).await.unwrap();
        store.put(b"long", b"v", Some(Duration::from_secs(3600))).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(store.get(b"short").await.unwrap().is_none());
        assert!(store.get(b"long").await.unwrap().is_some());
        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_purge_oldest() {
        let store = MemoryStore::new();
        for key in [b"a", b"b", b"c"] {
            store.put(key, b"v", None).await.unwrap();
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        assert_eq!(store.purge_oldest(1).await.unwrap(), 2);
        assert!(store.get(b"c").await.unwrap().is_some());
        assert!(store.get(b"a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reads_do_not_delay_eviction() {
        let store = MemoryStore::new();
        store.put(b"old", b"v", None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
        store.put(b"new", b"v", None).await.unwrap();
        assert!(store.get(b"old").await.unwrap().is_some());

        assert_eq!(store.purge_oldest(1).await.unwrap(), 1);
        assert!(store.get(b"old").await.unwrap().is_none());
        assert!(store.get(b"new").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_clones_share_entries() {
        let store = MemoryStore::new();
        let other = store.clone();
        store.put(b"k", b"v", None).await.unwrap();
        assert!(other.get(b"k").await.unwrap().is_some());
    }
}
