//! Intrusive LRU recency list over arena handles.
//!
//! Head is the least recently used record, tail the most recent. The list
//! threads through each record's `lru_prev`/`lru_next` slots and keeps its
//! own key→handle map so touch-on-access stays O(1). Eviction unlinks and
//! returns the head; releasing the record is the engine's call.

use std::collections::HashMap;

use super::record::{Record, RecordArena, RecordKey, UserRecord};

#[derive(Debug)]
pub struct LruList {
    head: Option<RecordKey>,
    tail: Option<RecordKey>,
    map: HashMap<String, RecordKey>,
    max_size: usize,
}

impl LruList {
    pub fn with_capacity(max_size: usize) -> Self {
        Self {
            head: None,
            tail: None,
            map: HashMap::new(),
            max_size: max_size.max(1),
        }
    }

    /// Insert or overwrite `key`. An overwrite updates the value in place and
    /// touches the record; a fresh insert allocates into the arena, evicting
    /// the head first when the list is full. Returns the record's handle and
    /// the evicted handle, if any, with its links cleared.
    pub fn put(
        &mut self,
        arena: &mut RecordArena,
        key: &str,
        value: UserRecord,
    ) -> (RecordKey, Option<RecordKey>) {
        if let Some(&existing) = self.map.get(key) {
            arena[existing].value = value;
            self.move_to_tail(arena, existing);
            return (existing, None);
        }

        let evicted = if self.map.len() >= self.max_size {
            self.evict_head(arena)
        } else {
            None
        };

        let node = arena.insert(Record::new(key, value));
        self.push_tail(arena, node);
        self.map.insert(key.to_string(), node);
        (node, evicted)
    }

    /// Link an existing record at the tail, evicting the head first when
    /// full. This is the re-admission hook used when a read finds a record
    /// in the hash index but outside the recency window.
    pub fn admit(&mut self, arena: &mut RecordArena, node: RecordKey) -> Option<RecordKey> {
        debug_assert!(
            !self.map.contains_key(&arena[node].key),
            "admit of a key already in the recency window"
        );

        let evicted = if self.map.len() >= self.max_size {
            self.evict_head(arena)
        } else {
            None
        };

        let key = arena[node].key.clone();
        self.push_tail(arena, node);
        self.map.insert(key, node);
        evicted
    }

    /// Touch and return the record under `key`.
    pub fn get(&mut self, arena: &mut RecordArena, key: &str) -> Option<RecordKey> {
        let node = *self.map.get(key)?;
        self.move_to_tail(arena, node);
        Some(node)
    }

    /// Whether `key` sits in the recency window (no touch).
    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// Unlink and return the record under `key`; links are cleared, the
    /// record stays in the arena.
    pub fn remove(&mut self, arena: &mut RecordArena, key: &str) -> Option<RecordKey> {
        let node = self.map.remove(key)?;
        self.unlink(arena, node);
        let rec = &mut arena[node];
        rec.lru_prev = None;
        rec.lru_next = None;
        Some(node)
    }

    /// Forget every entry. Records are left in the arena for the engine to
    /// release.
    pub fn clear(&mut self) {
        self.head = None;
        self.tail = None;
        self.map.clear();
    }

    /// Current eviction candidate.
    pub fn oldest(&self) -> Option<RecordKey> {
        self.head
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_size
    }

    fn evict_head(&mut self, arena: &mut RecordArena) -> Option<RecordKey> {
        let victim = self.head?;
        self.map.remove(arena[victim].key.as_str());
        self.unlink(arena, victim);
        let rec = &mut arena[victim];
        rec.lru_prev = None;
        rec.lru_next = None;
        Some(victim)
    }

    /// Splice `node` out of the list without touching its own links.
    fn unlink(&mut self, arena: &mut RecordArena, node: RecordKey) {
        let (prev, next) = {
            let rec = &arena[node];
            (rec.lru_prev, rec.lru_next)
        };
        match prev {
            Some(p) => arena[p].lru_next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => arena[n].lru_prev = prev,
            None => self.tail = prev,
        }
    }

    fn push_tail(&mut self, arena: &mut RecordArena, node: RecordKey) {
        {
            let rec = &mut arena[node];
            rec.lru_prev = self.tail;
            rec.lru_next = None;
        }
        match self.tail {
            Some(t) => arena[t].lru_next = Some(node),
            None => self.head = Some(node),
        }
        self.tail = Some(node);
    }

    fn move_to_tail(&mut self, arena: &mut RecordArena, node: RecordKey) {
        if self.tail == Some(node) {
            return;
        }
        self.unlink(arena, node);
        self.push_tail(arena, node);
    }
}
