//! Record arena shared by the hash index and the LRU list.
//!
//! A record participates in two structures at once: the open-chaining hash
//! index (via `hash_next`) and the recency list (via `lru_prev`/`lru_next`).
//! Both structures store [`RecordKey`] handles into one generational arena,
//! so a record exists exactly once in memory and a stale handle resolves to
//! `None` instead of aliasing a reused slot.

use slotmap::{SlotMap, new_key_type};

new_key_type! {
    /// Stable handle to a record in the engine's arena.
    pub struct RecordKey;
}

/// Arena owning every live record. Only the engine inserts into or removes
/// from it; the index and the list never release a record themselves.
pub type RecordArena = SlotMap<RecordKey, Record>;

/// User profile payload stored under a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: String,
    /// Account balance; negative values represent withdrawals.
    pub cash: i64,
}

impl UserRecord {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            email: String::new(),
            phone: String::new(),
            cash: 0,
        }
    }

    pub fn with_cash(mut self, cash: i64) -> Self {
        self.cash = cash;
        self
    }
}

impl Default for UserRecord {
    fn default() -> Self {
        Self::new(-1, "")
    }
}

/// A keyed record plus the link metadata that lets it sit in both containers
/// without duplication. The links are structural, not part of identity.
#[derive(Debug)]
pub struct Record {
    pub key: String,
    pub value: UserRecord,

    /// Next record in the hash bucket chain.
    pub(crate) hash_next: Option<RecordKey>,
    /// Neighbors in the recency list.
    pub(crate) lru_prev: Option<RecordKey>,
    pub(crate) lru_next: Option<RecordKey>,
    /// Bucket this record currently hangs off; `None` while unlinked.
    pub(crate) bucket: Option<usize>,
}

impl Record {
    pub fn new(key: impl Into<String>, value: UserRecord) -> Self {
        Self {
            key: key.into(),
            value,
            hash_next: None,
            lru_prev: None,
            lru_next: None,
            bucket: None,
        }
    }

    /// True while the record is linked into the hash index.
    pub fn in_index(&self) -> bool {
        self.bucket.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_is_unlinked() {
        let rec = Record::new("user1", UserRecord::new(1, "张三"));
        assert!(rec.hash_next.is_none());
        assert!(rec.lru_prev.is_none());
        assert!(rec.lru_next.is_none());
        assert!(!rec.in_index());
    }

    #[test]
    fn test_default_user() {
        let user = UserRecord::default();
        assert_eq!(user.id, -1);
        assert!(user.name.is_empty());
        assert_eq!(user.cash, 0);
    }

    #[test]
    fn test_stale_handle_resolves_to_none() {
        let mut arena = RecordArena::default();
        let key = arena.insert(Record::new("k", UserRecord::default()));
        arena.remove(key);
        let reused = arena.insert(Record::new("k2", UserRecord::default()));
        assert!(arena.get(key).is_none());
        assert_ne!(key, reused);
    }
}
