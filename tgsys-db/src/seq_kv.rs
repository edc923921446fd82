//! In-memory ordered key-value store with sequence numbers.
//!
//! Every state-changing operation that observably changes the map is
//! assigned the next sequence number; no-ops return 0. The numbers give
//! concurrent readers a total order over mutations.

// Layer 1: Standard library
use std::collections::hash_map::Entry;
use std::collections::HashMap;

// Layer 2: Third-party
use parking_lot::{RwLock, RwLockWriteGuard};

/// Monotonically increasing mutation counter.
pub type SeqNo = u64;

/// Single-owner sequence-numbered key-value map.
///
/// # Examples
///
/// ```rust
/// use tgsys_db::SeqKeyValue;
///
/// let mut kv = SeqKeyValue::new();
/// assert_eq!(kv.set("a", "1"), 1);
/// assert_eq!(kv.set("a", "1"), 0); // unchanged value is a no-op
/// assert_eq!(kv.set("a", "2"), 2);
/// assert_eq!(kv.erase("a"), 3);
/// assert_eq!(kv.seq_no(), 4);
/// ```
#[derive(Debug, Default)]
pub struct SeqKeyValue {
    map: HashMap<String, String>,
    current_id: SeqNo,
}

impl SeqKeyValue {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`. Returns 0 when the key already held
    /// exactly this value, else the assigned sequence number.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> SeqNo {
        let key = key.into();
        debug_assert!(!key.is_empty());
        let value = value.into();
        match self.map.entry(key) {
            Entry::Occupied(mut entry) => {
                if *entry.get() == value {
                    return 0;
                }
                entry.insert(value);
            }
            Entry::Vacant(entry) => {
                entry.insert(value);
            }
        }
        self.next_seq_no()
    }

    /// Remove `key`. Returns 0 when it was absent, else the assigned
    /// sequence number.
    pub fn erase(&mut self, key: &str) -> SeqNo {
        if self.map.remove(key).is_none() {
            return 0;
        }
        self.next_seq_no()
    }

    /// Remove every present key of `keys`. Returns 0 when none existed;
    /// otherwise returns the sequence number of the first removal, and
    /// the counter advances by the number of keys actually removed.
    pub fn erase_batch(&mut self, keys: Vec<String>) -> SeqNo {
        let mut count = 0u64;
        for key in &keys {
            if self.map.remove(key).is_some() {
                count += 1;
            }
        }
        if count == 0 {
            return 0;
        }
        let result = self.current_id + 1;
        self.current_id += count;
        result
    }

    /// The sequence number the next mutation will receive.
    pub fn seq_no(&self) -> SeqNo {
        self.current_id + 1
    }

    /// The stored value, or `""` when absent.
    pub fn get(&self, key: &str) -> String {
        self.map.get(key).cloned().unwrap_or_default()
    }

    /// Check presence without copying the value.
    pub fn isset(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// Number of stored keys.
    pub fn size(&self) -> usize {
        self.map.len()
    }

    /// Check whether the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Copy of the whole map.
    pub fn get_all(&self) -> HashMap<String, String> {
        self.map.clone()
    }

    fn next_seq_no(&mut self) -> SeqNo {
        self.current_id += 1;
        self.current_id
    }
}

/// Thread-safe wrapper around [`SeqKeyValue`].
///
/// Mutators additionally come in `*_and_lock` variants returning the
/// write guard, so a caller can atomically "mutate then persist" without
/// letting another writer claim the next sequence number in between.
#[derive(Debug, Default)]
pub struct TsSeqKeyValue {
    inner: RwLock<SeqKeyValue>,
}

impl TsSeqKeyValue {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing single-owner store.
    pub fn from_kv(kv: SeqKeyValue) -> Self {
        Self {
            inner: RwLock::new(kv),
        }
    }

    /// See [`SeqKeyValue::set`].
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) -> SeqNo {
        self.inner.write().set(key, value)
    }

    /// Set and keep holding the write lock.
    pub fn set_and_lock(
        &self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> (SeqNo, RwLockWriteGuard<'_, SeqKeyValue>) {
        let mut guard = self.inner.write();
        let seq_no = guard.set(key, value);
        (seq_no, guard)
    }

    /// See [`SeqKeyValue::erase`].
    pub fn erase(&self, key: &str) -> SeqNo {
        self.inner.write().erase(key)
    }

    /// Erase and keep holding the write lock.
    pub fn erase_and_lock(&self, key: &str) -> (SeqNo, RwLockWriteGuard<'_, SeqKeyValue>) {
        let mut guard = self.inner.write();
        let seq_no = guard.erase(key);
        (seq_no, guard)
    }

    /// See [`SeqKeyValue::erase_batch`].
    pub fn erase_batch(&self, keys: Vec<String>) -> SeqNo {
        self.inner.write().erase_batch(keys)
    }

    /// See [`SeqKeyValue::get`].
    pub fn get(&self, key: &str) -> String {
        self.inner.read().get(key)
    }

    /// See [`SeqKeyValue::isset`].
    pub fn isset(&self, key: &str) -> bool {
        self.inner.read().isset(key)
    }

    /// Number of stored keys.
    pub fn size(&self) -> usize {
        self.inner.read().size()
    }

    /// Copy of the whole map, taken under the write lock so it is a
    /// consistent snapshot against `*_and_lock` callers.
    pub fn get_all(&self) -> HashMap<String, String> {
        self.inner.write().get_all()
    }

    /// Take the write lock without mutating.
    pub fn lock(&self) -> RwLockWriteGuard<'_, SeqKeyValue> {
        self.inner.write()
    }
}
