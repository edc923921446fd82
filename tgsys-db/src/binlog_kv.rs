//! Persistent key-value store journaled into a binlog.
//!
//! State lives in an in-memory [`SeqKeyValue`]; every observable
//! mutation appends one binlog event (`SET` carries key and value,
//! `DELETE` carries the key). Opening replays the log to rebuild the
//! map.

// Layer 1: Standard library
use std::path::Path;

// Layer 2: Third-party
use bytes::Bytes;
use parking_lot::RwLock;

// Layer 3: Internal
use crate::binlog::{Binlog, BinlogDebugInfo, BinlogEvent, ConcurrentBinlog};
use crate::db_key::DbKey;
use crate::errors::DbError;
use crate::kv::PersistentKeyValue;
use crate::seq_kv::{SeqKeyValue, SeqNo};
use tgsys_actor::Scheduler;
use tgsys_utils::{ByteReader, ByteWriter, CoreError, CoreResult};

/// Event type tag of a key-value SET record.
pub const KV_SET_EVENT: u32 = 1;
/// Event type tag of a key-value DELETE record.
pub const KV_DELETE_EVENT: u32 = 2;

fn encode_set(key: &str, value: &str) -> Bytes {
    let mut writer = ByteWriter::with_capacity(8 + key.len() + value.len());
    writer.write_len_prefixed(key.as_bytes());
    writer.write_len_prefixed(value.as_bytes());
    Bytes::from(writer.into_inner())
}

fn encode_delete(key: &str) -> Bytes {
    let mut writer = ByteWriter::with_capacity(4 + key.len());
    writer.write_len_prefixed(key.as_bytes());
    Bytes::from(writer.into_inner())
}

fn decode_str(reader: &mut ByteReader<'_>) -> CoreResult<String> {
    let bytes = reader.read_len_prefixed()?;
    String::from_utf8(bytes.to_vec())
        .map_err(|_| CoreError::state("key-value payload is not UTF-8"))
}

/// Rebuild one replayed event into the in-memory map.
fn apply_kv_event(kv: &mut SeqKeyValue, event: &BinlogEvent) -> CoreResult<()> {
    let mut reader = ByteReader::new(&event.payload);
    match event.event_type {
        KV_SET_EVENT => {
            let key = decode_str(&mut reader)?;
            let value = decode_str(&mut reader)?;
            kv.set(key, value);
            Ok(())
        }
        KV_DELETE_EVENT => {
            let key = decode_str(&mut reader)?;
            kv.erase(&key);
            Ok(())
        }
        other => Err(CoreError::state(format!(
            "unknown key-value event type {other}"
        ))),
    }
}

/// Append surface the key-value store needs from its binlog flavour.
pub trait KeyValueBinlog: Send + Sync + 'static {
    /// Append one journal record.
    fn append(&mut self, event_type: u32, payload: Bytes);

    /// Request durability for everything appended so far.
    fn sync_journal(&mut self);
}

impl KeyValueBinlog for Binlog {
    fn append(&mut self, event_type: u32, payload: Bytes) {
        let event = BinlogEvent::new(self.next_event_id(), event_type, 0, 0, payload);
        if let Err(err) = self.add_raw_event(event, BinlogDebugInfo::here()) {
            tracing::error!(%err, "key-value journal append failed");
        }
    }

    fn sync_journal(&mut self) {
        if let Err(err) = self.flush() {
            tracing::error!(%err, "key-value journal flush failed");
        }
    }
}

impl KeyValueBinlog for ConcurrentBinlog {
    fn append(&mut self, event_type: u32, payload: Bytes) {
        self.add_raw_event(event_type, 0, 0, payload);
    }

    fn sync_journal(&mut self) {
        // Completion is observed through ConcurrentBinlog::sync futures
        // by callers that need it.
        drop(self.sync());
    }
}

struct Inner<B> {
    kv: SeqKeyValue,
    binlog: Option<B>,
}

/// Persistent key-value store over a binlog flavour `B`.
///
/// # Examples
///
/// ```rust,ignore
/// use tgsys_db::{Binlog, BinlogKeyValue, DbKey};
///
/// let kv = BinlogKeyValue::<Binlog>::init("kv.binlog", DbKey::empty())?;
/// kv.set("a", "1");
/// kv.force_sync();
/// ```
pub struct BinlogKeyValue<B> {
    inner: RwLock<Inner<B>>,
}

impl BinlogKeyValue<Binlog> {
    /// Open (or create) a single-thread-writer store at `path`.
    pub fn init(path: impl AsRef<Path>, db_key: DbKey) -> Result<Self, DbError> {
        let mut kv = SeqKeyValue::new();
        let binlog = Binlog::init(path, |event| apply_kv_event(&mut kv, event), db_key)?;
        Ok(Self {
            inner: RwLock::new(Inner {
                kv,
                binlog: Some(binlog),
            }),
        })
    }

    /// Remove the store's files.
    pub fn destroy(path: impl AsRef<Path>) -> Result<(), DbError> {
        Binlog::destroy(path)
    }
}

impl BinlogKeyValue<ConcurrentBinlog> {
    /// Open (or create) a store whose journal writes are batched through
    /// a writer actor on `scheduler`.
    pub fn init(
        scheduler: &Scheduler,
        path: impl AsRef<Path>,
        db_key: DbKey,
    ) -> Result<Self, DbError> {
        let mut kv = SeqKeyValue::new();
        let binlog =
            ConcurrentBinlog::init(scheduler, path, |event| apply_kv_event(&mut kv, event), db_key)?;
        Ok(Self {
            inner: RwLock::new(Inner {
                kv,
                binlog: Some(binlog),
            }),
        })
    }
}

impl<B: KeyValueBinlog> BinlogKeyValue<B> {
    /// The stored value, or `""` when absent.
    pub fn get(&self, key: &str) -> String {
        self.inner.read().kv.get(key)
    }

    /// Check presence without copying the value.
    pub fn isset(&self, key: &str) -> bool {
        self.inner.read().kv.isset(key)
    }

    /// Number of stored keys.
    pub fn size(&self) -> usize {
        self.inner.read().kv.size()
    }

    /// Copy of the whole map.
    pub fn get_all(&self) -> std::collections::HashMap<String, String> {
        self.inner.read().kv.get_all()
    }

    /// The sequence number the next mutation will receive.
    pub fn seq_no(&self) -> SeqNo {
        self.inner.read().kv.seq_no()
    }

    /// Store `value` under `key`, journaling the mutation.
    pub fn set(&self, key: &str, value: &str) -> SeqNo {
        let mut inner = self.inner.write();
        let seq_no = inner.kv.set(key, value);
        if seq_no != 0 {
            if let Some(binlog) = &mut inner.binlog {
                binlog.append(KV_SET_EVENT, encode_set(key, value));
            }
        }
        seq_no
    }

    /// Remove `key`, journaling the mutation.
    pub fn erase(&self, key: &str) -> SeqNo {
        let mut inner = self.inner.write();
        let seq_no = inner.kv.erase(key);
        if seq_no != 0 {
            if let Some(binlog) = &mut inner.binlog {
                binlog.append(KV_DELETE_EVENT, encode_delete(key));
            }
        }
        seq_no
    }

    /// Remove every present key of `keys`, journaling one record per
    /// removal.
    pub fn erase_batch(&self, keys: Vec<String>) -> SeqNo {
        let mut inner = self.inner.write();
        let existing: Vec<String> = keys
            .iter()
            .filter(|key| inner.kv.isset(key))
            .cloned()
            .collect();
        let seq_no = inner.kv.erase_batch(keys);
        if seq_no != 0 {
            for key in &existing {
                if let Some(binlog) = &mut inner.binlog {
                    binlog.append(KV_DELETE_EVENT, encode_delete(key));
                }
            }
        }
        seq_no
    }

    /// Request durability for every journaled mutation.
    pub fn force_sync(&self) {
        let mut inner = self.inner.write();
        if let Some(binlog) = &mut inner.binlog {
            binlog.sync_journal();
        }
    }

    /// Flush and detach the journal; further mutations only touch the
    /// in-memory map.
    pub fn close(&self) {
        let mut inner = self.inner.write();
        if let Some(mut binlog) = inner.binlog.take() {
            binlog.sync_journal();
        }
    }
}

impl<B: KeyValueBinlog> PersistentKeyValue for BinlogKeyValue<B> {
    fn get(&self, key: &str) -> String {
        BinlogKeyValue::get(self, key)
    }

    fn set(&self, key: &str, value: &str) -> SeqNo {
        BinlogKeyValue::set(self, key, value)
    }

    fn erase(&self, key: &str) -> SeqNo {
        BinlogKeyValue::erase(self, key)
    }

    fn erase_batch(&self, keys: Vec<String>) -> SeqNo {
        BinlogKeyValue::erase_batch(self, keys)
    }

    fn close(&self) {
        BinlogKeyValue::close(self);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Tests are allowed to use unwrap for simplicity
mod tests {
    use super::*;

    #[test]
    fn test_payload_round_trip() {
        let payload = encode_set("key", "value");
        let event = BinlogEvent::new(0, KV_SET_EVENT, 0, 0, payload);
        let mut kv = SeqKeyValue::new();
        apply_kv_event(&mut kv, &event).unwrap();
        assert_eq!(kv.get("key"), "value");

        let event = BinlogEvent::new(1, KV_DELETE_EVENT, 0, 0, encode_delete("key"));
        apply_kv_event(&mut kv, &event).unwrap();
        assert!(!kv.isset("key"));
    }

    #[test]
    fn test_unknown_event_type_is_an_error() {
        let mut kv = SeqKeyValue::new();
        let event = BinlogEvent::new(0, 99, 0, 0, Bytes::new());
        assert!(apply_kv_event(&mut kv, &event).is_err());
    }
}
