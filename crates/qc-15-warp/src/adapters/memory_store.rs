//! In-memory Key-Value Store Adapter
//!
//! Implements `KeyValueStore` over an ordered map. Used for tests and for
//! nodes that do not persist warp messages.

use crate::domain::KVStoreError;
use crate::ports::KeyValueStore;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// Ordered in-memory store.
#[derive(Default)]
pub struct InMemoryKVStore {
    entries: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
    closed: AtomicBool,
}

impl InMemoryKVStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// True if no entries are stored.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Reject every later operation with [`KVStoreError::Closed`].
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    fn ensure_open(&self) -> Result<(), KVStoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(KVStoreError::Closed);
        }
        Ok(())
    }
}

impl KeyValueStore for InMemoryKVStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        self.ensure_open()?;
        Ok(self.entries.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        self.ensure_open()?;
        self.entries.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), KVStoreError> {
        self.ensure_open()?;
        self.entries.write().remove(key);
        Ok(())
    }

    fn iter_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError> {
        self.ensure_open()?;
        Ok(self
            .entries
            .read()
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_delete() {
        let store = InMemoryKVStore::new();
        store.put(b"a", b"1").unwrap();
        assert_eq!(store.get(b"a").unwrap(), Some(b"1".to_vec()));
        store.delete(b"a").unwrap();
        assert_eq!(store.get(b"a").unwrap(), None);
        store.delete(b"missing").unwrap();
    }

    #[test]
    fn test_prefix_scan_ordered() {
        let store = InMemoryKVStore::new();
        store.put(b"ab2", b"x").unwrap();
        store.put(b"ab1", b"y").unwrap();
        store.put(b"b", b"z").unwrap();
        store.put(b"aa", b"w").unwrap();

        let keys: Vec<_> = store
            .iter_prefix(b"ab")
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec![b"ab1".to_vec(), b"ab2".to_vec()]);
        assert_eq!(store.iter_prefix(&[]).unwrap().len(), 4);
    }

    #[test]
    fn test_closed_store_rejects() {
        let store = InMemoryKVStore::new();
        store.close();
        assert_eq!(store.put(b"a", b"1"), Err(KVStoreError::Closed));
        assert_eq!(store.get(b"a"), Err(KVStoreError::Closed));
    }
}
