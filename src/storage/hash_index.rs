//! Open-chaining hash index over arena handles.
//!
//! Buckets hold the head of a singly-linked chain threaded through each
//! record's `hash_next` slot. The index never owns a record: insert and
//! remove only relink handles, and the displaced/removed record is handed
//! back to the caller for the engine to release.

use std::sync::atomic::Ordering;

use super::INDEX_REHASHES;
use super::record::{RecordArena, RecordKey};

/// Chains grow until the table crosses this load, then capacity doubles.
const MAX_LOAD_FACTOR: f64 = 0.75;

/// djb2 over the key bytes, 32-bit wrapping. Rehashing walks the same
/// function, so bucket placement is deterministic for a given capacity.
fn hash_key(key: &str) -> u32 {
    let mut h: u32 = 5381;
    for &b in key.as_bytes() {
        // h * 33 + b
        h = (h << 5).wrapping_add(h).wrapping_add(u32::from(b));
    }
    h
}

#[derive(Debug)]
pub struct HashIndex {
    buckets: Vec<Option<RecordKey>>,
    len: usize,
}

impl HashIndex {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buckets: vec![None; capacity.max(1)],
            len: 0,
        }
    }

    fn bucket_of(&self, key: &str) -> usize {
        hash_key(key) as usize % self.buckets.len()
    }

    /// Link `node` into its chain. An existing record under the same key is
    /// replaced in place (the new node takes over its chain position and
    /// successor) and returned without being released. Crossing the load
    /// threshold doubles capacity and rehashes before returning.
    pub fn insert(&mut self, arena: &mut RecordArena, node: RecordKey) -> Option<RecordKey> {
        let bucket = self.bucket_of(&arena[node].key);

        let mut prev: Option<RecordKey> = None;
        let mut cur = self.buckets[bucket];
        while let Some(c) = cur {
            if arena[c].key == arena[node].key {
                let successor = arena[c].hash_next;
                {
                    let rec = &mut arena[node];
                    rec.hash_next = successor;
                    rec.bucket = Some(bucket);
                }
                match prev {
                    Some(p) => arena[p].hash_next = Some(node),
                    None => self.buckets[bucket] = Some(node),
                }
                if c != node {
                    let old = &mut arena[c];
                    old.hash_next = None;
                    old.bucket = None;
                }
                return Some(c);
            }
            prev = Some(c);
            cur = arena[c].hash_next;
        }

        // Fresh key: head-insert into the chain.
        {
            let rec = &mut arena[node];
            rec.hash_next = self.buckets[bucket];
            rec.bucket = Some(bucket);
        }
        self.buckets[bucket] = Some(node);
        self.len += 1;

        if self.len as f64 > self.buckets.len() as f64 * MAX_LOAD_FACTOR {
            self.rehash(arena, self.buckets.len() * 2);
        }
        None
    }

    /// Handle of the record stored under `key`, if any.
    pub fn find(&self, arena: &RecordArena, key: &str) -> Option<RecordKey> {
        let mut cur = self.buckets[self.bucket_of(key)];
        while let Some(c) = cur {
            let rec = &arena[c];
            if rec.key == key {
                return Some(c);
            }
            cur = rec.hash_next;
        }
        None
    }

    /// Unlink and return the record stored under `key`. Its chain link and
    /// cached bucket are cleared; the record itself stays in the arena.
    pub fn remove(&mut self, arena: &mut RecordArena, key: &str) -> Option<RecordKey> {
        let bucket = self.bucket_of(key);

        let mut prev: Option<RecordKey> = None;
        let mut cur = self.buckets[bucket];
        while let Some(c) = cur {
            if arena[c].key == key {
                let successor = arena[c].hash_next;
                match prev {
                    Some(p) => arena[p].hash_next = successor,
                    None => self.buckets[bucket] = successor,
                }
                let rec = &mut arena[c];
                rec.hash_next = None;
                rec.bucket = None;
                self.len -= 1;
                return Some(c);
            }
            prev = Some(c);
            cur = arena[c].hash_next;
        }
        None
    }

    /// Relink every record into `new_capacity` buckets. Chain order within a
    /// bucket reverses (head-insert); chain order is not observable.
    fn rehash(&mut self, arena: &mut RecordArena, new_capacity: usize) {
        let old = std::mem::replace(&mut self.buckets, vec![None; new_capacity]);

        for head in old {
            let mut cur = head;
            while let Some(c) = cur {
                let next = arena[c].hash_next;
                let bucket = hash_key(&arena[c].key) as usize % self.buckets.len();
                let rec = &mut arena[c];
                rec.hash_next = self.buckets[bucket];
                rec.bucket = Some(bucket);
                self.buckets[bucket] = Some(c);
                cur = next;
            }
        }

        INDEX_REHASHES.fetch_add(1, Ordering::Relaxed);
    }

    /// Detach every chain head. Records are not released; the engine owns
    /// them.
    pub fn clear(&mut self) {
        self.buckets.fill(None);
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    pub fn load_factor(&self) -> f64 {
        self.len as f64 / self.buckets.len() as f64
    }
}
