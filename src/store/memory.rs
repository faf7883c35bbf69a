use super::{HostRecord, HostStore, OpenHostStore, StoreFuture};
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Thread-safe in-memory record store.
#[derive(Clone, Default)]
pub struct MemoryHostStore {
    records: Arc<DashMap<String, HostRecord>>,
}

impl MemoryHostStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current record for a host, without going through the async API.
    pub fn snapshot(&self, hostname: &str) -> Option<HostRecord> {
        self.records.get(hostname).map(|r| r.clone())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl HostStore for MemoryHostStore {
    fn get(&self, hostname: &str) -> StoreFuture<Option<HostRecord>> {
        let record = self.snapshot(hostname);
        Box::pin(async move { Ok(record) })
    }

    fn put(&self, record: HostRecord) -> StoreFuture<()> {
        self.records.insert(record.hostname.clone(), record);
        Box::pin(async { Ok(()) })
    }
}

/// Hands out one shared [`MemoryHostStore`] and counts `open` calls.
#[derive(Clone, Default)]
pub struct MemoryStoreOpener {
    store: MemoryHostStore,
    opened: Arc<AtomicUsize>,
}

impl MemoryStoreOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `store` from `open`, e.g. to pre-seed records.
    pub fn with_store(store: MemoryHostStore) -> Self {
        Self {
            store,
            opened: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn store(&self) -> &MemoryHostStore {
        &self.store
    }

    /// Number of times `open` has been called.
    pub fn open_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl OpenHostStore for MemoryStoreOpener {
    fn open(&self) -> StoreFuture<Arc<dyn HostStore>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let store: Arc<dyn HostStore> = Arc::new(self.store.clone());
        Box::pin(async move { Ok(store) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_replaces() {
        let store = MemoryHostStore::new();
        store
            .put(HostRecord::new("a.io", None, None, 1))
            .await
            .unwrap();
        store
            .put(HostRecord::new("a.io", None, None, 2))
            .await
            .unwrap();

        assert_eq!(store.len(), 1);
        let record = store.get("a.io").await.unwrap().unwrap();
        assert_eq!(record.resolved_at_epoch_millis, 2);
    }

    #[tokio::test]
    async fn test_get_missing() {
        let store = MemoryHostStore::new();
        assert!(store.get("missing.io").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_opener_shares_store() {
        let opener = MemoryStoreOpener::new();
        let handle = opener.open().await.unwrap();
        handle
            .put(HostRecord::new("b.io", None, None, 7))
            .await
            .unwrap();

        assert_eq!(opener.open_count(), 1);
        assert!(opener.store().snapshot("b.io").is_some());
    }
}
