//! Mutex-guarded storage engine coupling the hash index and the LRU list.
//!
//! The engine owns the record arena; the index and the recency list only
//! hold handles into it. Every public operation takes the one mutex, and at
//! every quiescent point the set of records in the index equals the set in
//! the list (when the LRU is enabled). A record is released in exactly three
//! places: `del`, eviction, and `clear`.

use parking_lot::Mutex;
use std::sync::atomic::Ordering;
use tracing::debug;

use super::RECORDS_EVICTED;
use super::hash_index::HashIndex;
use super::lru::LruList;
use super::record::{Record, RecordArena, UserRecord};
use crate::config::StorageConfig;
use crate::error::StorageError;

#[derive(Debug)]
pub struct StorageEngine {
    inner: Mutex<EngineState>,
}

#[derive(Debug)]
struct EngineState {
    arena: RecordArena,
    index: HashIndex,
    lru: Option<LruList>,
}

/// Point-in-time sizes reported by [`StorageEngine::stats`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StorageStats {
    pub hash_capacity: usize,
    pub hash_len: usize,
    pub load_factor: f64,
    /// `None` when the engine runs without a recency window.
    pub lru_capacity: Option<usize>,
    pub lru_len: Option<usize>,
    /// Live records in the arena.
    pub records: usize,
}

impl StorageEngine {
    pub fn new(config: &StorageConfig) -> Result<Self, StorageError> {
        if config.hash_capacity == 0 {
            return Err(StorageError::InvalidHashCapacity);
        }
        if config.enable_lru && config.lru_capacity == 0 {
            return Err(StorageError::InvalidLruCapacity);
        }

        Ok(Self {
            inner: Mutex::new(EngineState {
                arena: RecordArena::default(),
                index: HashIndex::with_capacity(config.hash_capacity),
                lru: config
                    .enable_lru
                    .then(|| LruList::with_capacity(config.lru_capacity)),
            }),
        })
    }

    /// Insert or overwrite the record under `key`. Never fails on a
    /// duplicate key; empty keys are rejected.
    pub fn set(&self, key: &str, value: UserRecord) -> Result<(), StorageError> {
        if key.is_empty() {
            return Err(StorageError::EmptyKey);
        }
        self.inner.lock().set(key, value);
        Ok(())
    }

    /// Value under `key`, touching the recency window on the way. A hit that
    /// sits in the index but outside the window is re-admitted (promotion),
    /// which may evict the current head from both structures.
    pub fn get(&self, key: &str) -> Option<UserRecord> {
        self.inner.lock().get(key)
    }

    /// Remove `key` from both structures and release the record. True iff at
    /// least one structure held the key.
    pub fn del(&self, key: &str) -> bool {
        self.inner.lock().del(key)
    }

    pub fn stats(&self) -> StorageStats {
        let state = self.inner.lock();
        StorageStats {
            hash_capacity: state.index.capacity(),
            hash_len: state.index.len(),
            load_factor: state.index.load_factor(),
            lru_capacity: state.lru.as_ref().map(LruList::capacity),
            lru_len: state.lru.as_ref().map(LruList::len),
            records: state.arena.len(),
        }
    }

    /// Empty both structures and release every record.
    pub fn clear(&self) {
        let mut state = self.inner.lock();
        state.index.clear();
        if let Some(lru) = state.lru.as_mut() {
            lru.clear();
        }
        state.arena.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EngineState {
    fn set(&mut self, key: &str, value: UserRecord) {
        let Some(lru) = self.lru.as_mut() else {
            let node = self.arena.insert(Record::new(key, value));
            if let Some(displaced) = self.index.insert(&mut self.arena, node)
                && displaced != node
            {
                self.arena.remove(displaced);
            }
            return;
        };

        // The list goes first: it either updates in place or creates the
        // record, possibly pushing out its head.
        let (node, evicted) = lru.put(&mut self.arena, key, value);
        if let Some(victim) = evicted {
            let victim_key = self.arena[victim].key.clone();
            self.index.remove(&mut self.arena, &victim_key);
            self.arena.remove(victim);
            RECORDS_EVICTED.fetch_add(1, Ordering::Relaxed);
            debug!(key = %victim_key, "evicted record");
        }

        // Mirror the record in the index. Replacing the same node is a no-op;
        // a distinct displaced record is stale and gets released.
        if let Some(displaced) = self.index.insert(&mut self.arena, node)
            && displaced != node
        {
            self.arena.remove(displaced);
        }
    }

    fn get(&mut self, key: &str) -> Option<UserRecord> {
        let Some(lru) = self.lru.as_mut() else {
            let node = self.index.find(&self.arena, key)?;
            return Some(self.arena[node].value.clone());
        };

        if let Some(node) = lru.get(&mut self.arena, key) {
            return Some(self.arena[node].value.clone());
        }

        // Index-only records exist transiently (post-eviction windows); a
        // read re-admits them. The record is detached, linked at the list
        // tail, then reinserted under the unchanged key with no early return
        // in between, so the detachment is never observable.
        let node = self.index.remove(&mut self.arena, key)?;
        if let Some(victim) = lru.admit(&mut self.arena, node) {
            let victim_key = self.arena[victim].key.clone();
            self.index.remove(&mut self.arena, &victim_key);
            self.arena.remove(victim);
            RECORDS_EVICTED.fetch_add(1, Ordering::Relaxed);
            debug!(key = %victim_key, "evicted record during promotion");
        }
        self.index.insert(&mut self.arena, node);
        Some(self.arena[node].value.clone())
    }

    fn del(&mut self, key: &str) -> bool {
        let from_index = self.index.remove(&mut self.arena, key);
        let from_lru = self
            .lru
            .as_mut()
            .and_then(|lru| lru.remove(&mut self.arena, key));

        match (from_index, from_lru) {
            (None, None) => false,
            (Some(a), Some(b)) if a != b => {
                // Divergent duplicates must not survive a delete.
                self.arena.remove(a);
                self.arena.remove(b);
                true
            }
            (Some(node), _) | (None, Some(node)) => {
                self.arena.remove(node);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(hash: usize, lru: usize, enable_lru: bool) -> StorageEngine {
        StorageEngine::new(&StorageConfig {
            hash_capacity: hash,
            lru_capacity: lru,
            enable_lru,
        })
        .unwrap()
    }

    fn user(id: i64, name: &str, cash: i64) -> UserRecord {
        UserRecord::new(id, name).with_cash(cash)
    }

    /// The coupling invariant: same key set in index and list.
    fn assert_coupled(engine: &StorageEngine) {
        let state = engine.inner.lock();
        let Some(lru) = state.lru.as_ref() else {
            return;
        };
        assert_eq!(state.index.len(), lru.len());
        assert_eq!(state.arena.len(), state.index.len());
        for (_, rec) in state.arena.iter() {
            assert!(rec.in_index(), "record {} missing from index", rec.key);
            assert!(lru.contains(&rec.key), "record {} missing from lru", rec.key);
        }
    }

    #[test]
    fn test_set_get_roundtrip() {
        let engine = engine(10, 5, true);
        engine.set("user1", user(1, "张三", 1000)).unwrap();

        let got = engine.get("user1").unwrap();
        assert_eq!(got.id, 1);
        assert_eq!(got.name, "张三");
        assert_eq!(got.cash, 1000);
        assert!(engine.get("nonexistent").is_none());
        assert_coupled(&engine);
    }

    #[test]
    fn test_last_writer_wins() {
        let engine = engine(10, 5, true);
        engine.set("k", user(1, "a", 0)).unwrap();
        engine.set("k", user(2, "b", 5)).unwrap();

        let got = engine.get("k").unwrap();
        assert_eq!((got.id, got.name.as_str(), got.cash), (2, "b", 5));
        assert_eq!(engine.len(), 1);
        assert_coupled(&engine);
    }

    #[test]
    fn test_set_is_structurally_idempotent() {
        let engine = engine(10, 5, true);
        engine.set("k", user(1, "a", 0)).unwrap();
        let before = engine.stats();
        engine.set("k", user(1, "a", 0)).unwrap();
        assert_eq!(engine.stats(), before);
    }

    #[test]
    fn test_delete_removes_from_both() {
        let engine = engine(10, 5, true);
        engine.set("k", user(1, "a", 0)).unwrap();

        assert!(engine.del("k"));
        assert!(engine.get("k").is_none());
        assert!(!engine.del("k"));
        let stats = engine.stats();
        assert_eq!(stats.hash_len, 0);
        assert_eq!(stats.lru_len, Some(0));
        assert_eq!(stats.records, 0);
    }

    #[test]
    fn test_empty_key_rejected() {
        let engine = engine(10, 5, true);
        assert_eq!(
            engine.set("", UserRecord::default()),
            Err(StorageError::EmptyKey)
        );
        assert!(engine.get("").is_none());
        assert!(!engine.del(""));
    }

    #[test]
    fn test_invalid_capacities_rejected() {
        let bad_hash = StorageConfig {
            hash_capacity: 0,
            lru_capacity: 5,
            enable_lru: true,
        };
        assert_eq!(
            StorageEngine::new(&bad_hash).unwrap_err(),
            StorageError::InvalidHashCapacity
        );

        let bad_lru = StorageConfig {
            hash_capacity: 8,
            lru_capacity: 0,
            enable_lru: true,
        };
        assert_eq!(
            StorageEngine::new(&bad_lru).unwrap_err(),
            StorageError::InvalidLruCapacity
        );

        // A zero lru capacity is fine while the window is disabled.
        let disabled = StorageConfig {
            hash_capacity: 8,
            lru_capacity: 0,
            enable_lru: false,
        };
        assert!(StorageEngine::new(&disabled).is_ok());
    }

    #[test]
    fn test_eviction_applies_to_index_too() {
        // Scenario: lru capacity 3, touch A, insert D; B is the victim.
        let engine = engine(20, 3, true);
        engine.set("A", user(1, "用户A", 100)).unwrap();
        engine.set("B", user(2, "用户B", 200)).unwrap();
        engine.set("C", user(3, "用户C", 300)).unwrap();

        assert!(engine.get("A").is_some());
        engine.set("D", user(4, "用户D", 400)).unwrap();

        assert!(engine.get("A").is_some());
        assert!(engine.get("B").is_none());
        assert!(engine.get("C").is_some());
        assert!(engine.get("D").is_some());
        assert_coupled(&engine);
    }

    #[test]
    fn test_promotion_restores_coupling() {
        let engine = engine(16, 2, true);
        engine.set("a", user(1, "a", 0)).unwrap();
        engine.set("b", user(2, "b", 0)).unwrap();

        // Force an index-only record: drop "a" from the window but leave it
        // in the index, the transient state promotion is meant to repair.
        {
            let mut guard = engine.inner.lock();
            let state = &mut *guard;
            let lru = state.lru.as_mut().unwrap();
            lru.remove(&mut state.arena, "a").unwrap();
        }

        // The read finds it in the index, re-admits it, and the engine is
        // coupled again.
        assert_eq!(engine.get("a").unwrap().id, 1);
        assert_coupled(&engine);

        // A promotion into a full window evicts from both structures: detach
        // "b", fill the window with "c", then read "b" back. The admission
        // pushes out the current head ("a") everywhere.
        {
            let mut guard = engine.inner.lock();
            let state = &mut *guard;
            let lru = state.lru.as_mut().unwrap();
            lru.remove(&mut state.arena, "b").unwrap();
        }
        engine.set("c", user(3, "c", 0)).unwrap();

        assert_eq!(engine.get("b").unwrap().id, 2);
        assert_coupled(&engine);
        assert_eq!(engine.stats().lru_len, Some(2));
        assert!(engine.get("a").is_none());
    }

    #[test]
    fn test_lru_disabled_unbounded_retention() {
        let engine = engine(4, 1, false);
        for i in 0..100 {
            engine.set(&format!("k{i}"), user(i, "u", 0)).unwrap();
        }
        for i in 0..100 {
            assert!(engine.get(&format!("k{i}")).is_some());
        }
        let stats = engine.stats();
        assert_eq!(stats.hash_len, 100);
        assert!(stats.lru_len.is_none());
        assert!(stats.load_factor <= 0.75);
    }

    #[test]
    fn test_rehash_preserves_records() {
        let engine = engine(16, 100_000, true);
        let initial_capacity = engine.stats().hash_capacity;

        for i in 0..10_000 {
            engine.set(&format!("user_{i}"), user(i, "测试用户", i * 100)).unwrap();
        }

        let stats = engine.stats();
        // 16 → …: doubling at 0.75 load happens well more than twice.
        assert!(stats.hash_capacity >= initial_capacity * 4);
        assert_eq!(stats.hash_len, 10_000);
        assert!(stats.load_factor <= 0.75);

        for i in 0..10_000 {
            let got = engine.get(&format!("user_{i}")).unwrap();
            assert_eq!(got.cash, i * 100);
        }
        assert_coupled(&engine);
    }

    #[test]
    fn test_clear_empties_everything() {
        let engine = engine(10, 5, true);
        for i in 0..5 {
            engine.set(&format!("k{i}"), user(i, "u", 0)).unwrap();
        }
        engine.clear();

        let stats = engine.stats();
        assert_eq!(stats.hash_len, 0);
        assert_eq!(stats.lru_len, Some(0));
        assert_eq!(stats.records, 0);
        assert!(engine.is_empty());
        assert!(engine.get("k0").is_none());

        // The engine is usable after a clear.
        engine.set("fresh", user(9, "u", 0)).unwrap();
        assert!(engine.get("fresh").is_some());
        assert_coupled(&engine);
    }

    #[test]
    fn test_mutex_serializes_writers() {
        use std::sync::Arc;
        use std::thread;

        let engine = Arc::new(engine(64, 10_000, true));
        let mut handles = Vec::new();
        for t in 0..8 {
            let engine = Arc::clone(&engine);
            handles.push(thread::spawn(move || {
                for i in 0..200 {
                    let key = format!("k-{t}-{i}");
                    engine.set(&key, user(i, "u", i)).unwrap();
                    assert!(engine.get(&key).is_some());
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(engine.len(), 8 * 200);
        assert_coupled(&engine);
    }
}
