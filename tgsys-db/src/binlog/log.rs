//! The write-ahead binary log.
//!
//! File layout: a plaintext binlog is just records back to back. An
//! encrypted binlog starts with an authenticated header
//! `[magic][version][salt][iv][mac]` followed by the record stream
//! encrypted with AES-256-CTR; appends continue the keystream.
//!
//! Rewrites (key change, plaintext upgrade, old-key recovery) are
//! crash-safe through a two-phase sibling protocol: the new content is
//! written to `<path>.new.tmp`, fsynced, renamed to `<path>.new`
//! (presence of which implies fully-written content), then renamed over
//! the original. A dangling `<path>.new` found on open replaces the
//! original.

// Layer 1: Standard library
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

// Layer 2: Third-party
use rand::RngCore;

// Layer 3: Internal
use super::crypto::{
    derive_key, header_mac, CtrStream, IV_LEN, KEY_LEN, MAC_LEN, SALT_LEN,
};
use super::event::{BinlogDebugInfo, BinlogEvent};
use crate::db_key::DbKey;
use crate::errors::DbError;
use tgsys_utils::{ByteWriter, CoreResult};

/// Magic of an encrypted binlog header. Deliberately larger than
/// [`MAX_EVENT_LEN`](super::event::MAX_EVENT_LEN) so it can never be
/// confused with a plaintext record length.
const BINLOG_MAGIC: u32 = 0xF1A8_B10C;
const BINLOG_VERSION: u32 = 1;
const HEADER_LEN: usize = 4 + 4 + SALT_LEN + IV_LEN + MAC_LEN;

fn sibling_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".new");
    PathBuf::from(os)
}

fn sibling_tmp_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".new.tmp");
    PathBuf::from(os)
}

fn remove_if_exists(path: &Path) -> Result<(), DbError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

/// Finish an interrupted rewrite: a fully written sibling replaces the
/// original; a half-written temporary is discarded.
fn promote_sibling(path: &Path) -> Result<(), DbError> {
    remove_if_exists(&sibling_tmp_path(path))?;
    let sibling = sibling_path(path);
    if sibling.exists() {
        tracing::warn!(path = %path.display(), "recovering binlog from interrupted rewrite");
        std::fs::rename(&sibling, path)?;
    }
    Ok(())
}

/// Result of decoding a whole binlog file into its plaintext record
/// stream.
struct DecodedFile {
    records: Vec<u8>,
    /// Present when the file carried an encrypted header.
    crypto: Option<([u8; KEY_LEN], [u8; SALT_LEN], [u8; IV_LEN])>,
}

fn decode_file(raw: &[u8], db_key: &DbKey) -> Result<DecodedFile, DbError> {
    let starts_with_magic = raw.len() >= 4
        && u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) == BINLOG_MAGIC;

    if db_key.is_empty() {
        if starts_with_magic {
            return Err(DbError::WrongKey);
        }
        return Ok(DecodedFile {
            records: raw.to_vec(),
            crypto: None,
        });
    }

    if !starts_with_magic {
        // Plaintext (or brand-new) file opened with a key; the caller
        // upgrades it to the encrypted format.
        return Ok(DecodedFile {
            records: raw.to_vec(),
            crypto: None,
        });
    }

    if raw.len() < HEADER_LEN {
        return Err(DbError::corrupted(0, "truncated header"));
    }
    let version = u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]);
    if version != BINLOG_VERSION {
        return Err(DbError::corrupted(4, format!("unknown version {version}")));
    }
    let mut salt = [0u8; SALT_LEN];
    salt.copy_from_slice(&raw[8..8 + SALT_LEN]);
    let mut iv = [0u8; IV_LEN];
    iv.copy_from_slice(&raw[8 + SALT_LEN..8 + SALT_LEN + IV_LEN]);
    let mut mac = [0u8; MAC_LEN];
    mac.copy_from_slice(&raw[HEADER_LEN - MAC_LEN..HEADER_LEN]);

    let Some(key) = derive_key(db_key, &salt) else {
        return Err(DbError::WrongKey);
    };
    if header_mac(&key, &raw[..HEADER_LEN - MAC_LEN]) != mac {
        return Err(DbError::WrongKey);
    }

    let mut records = raw[HEADER_LEN..].to_vec();
    CtrStream::new(&key, &iv).apply(&mut records);
    Ok(DecodedFile {
        records,
        crypto: Some((key, salt, iv)),
    })
}

/// Parse a plaintext record stream. Returns the events plus the offset
/// of the first unparseable byte, if any.
fn parse_records(records: &[u8]) -> (Vec<BinlogEvent>, Option<(usize, String)>) {
    let mut events = Vec::new();
    let mut offset = 0usize;
    let mut next_event_id = 0u64;
    while offset < records.len() {
        match BinlogEvent::parse(&records[offset..], offset as u64) {
            Ok(Some((event, consumed))) => {
                if event.event_id < next_event_id {
                    return (
                        events,
                        Some((offset, format!("event id went backwards to {}", event.event_id))),
                    );
                }
                next_event_id = event.event_id + 1;
                events.push(event);
                offset += consumed;
            }
            Ok(None) => {
                return (events, Some((offset, "incomplete trailing record".to_string())));
            }
            Err(err) => {
                return (events, Some((offset, err.to_string())));
            }
        }
    }
    (events, None)
}

fn serialize_records(events: &[BinlogEvent]) -> Vec<u8> {
    let total: usize = events.iter().map(BinlogEvent::size_on_disk).sum();
    let mut out = Vec::with_capacity(total);
    for event in events {
        out.extend_from_slice(&event.serialize());
    }
    out
}

/// Write a complete binlog file atomically via the two-phase sibling
/// protocol; returns the crypto state for continued appending.
fn write_whole_file(
    path: &Path,
    events: &[BinlogEvent],
    db_key: &DbKey,
) -> Result<Option<CtrStream>, DbError> {
    let mut records = serialize_records(events);

    let mut content = Vec::new();
    let crypto = if db_key.is_empty() {
        content.append(&mut records);
        None
    } else {
        let mut salt = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        let mut iv = [0u8; IV_LEN];
        rand::thread_rng().fill_bytes(&mut iv);
        // derive_key is Some for any non-empty key.
        let Some(key) = derive_key(db_key, &salt) else {
            return Err(DbError::WrongKey);
        };

        let mut header = ByteWriter::with_capacity(HEADER_LEN);
        header.write_u32(BINLOG_MAGIC);
        header.write_u32(BINLOG_VERSION);
        header.write_bytes(&salt);
        header.write_bytes(&iv);
        let mac = header_mac(&key, header.as_slice());
        header.write_bytes(&mac);
        content.extend_from_slice(header.as_slice());

        let mut stream = CtrStream::new(&key, &iv);
        stream.apply(&mut records);
        content.append(&mut records);
        Some(stream)
    };

    let tmp = sibling_tmp_path(path);
    let sibling = sibling_path(path);
    {
        let mut file = File::create(&tmp)?;
        file.write_all(&content)?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp, &sibling)?;
    std::fs::rename(&sibling, path)?;
    Ok(crypto)
}

/// Durable, optionally encrypted, ordered append log.
///
/// # Examples
///
/// ```rust,ignore
/// use tgsys_db::{Binlog, BinlogDebugInfo, BinlogEvent, DbKey};
///
/// let mut binlog = Binlog::init("app.binlog", |event| Ok(()), DbKey::empty())?;
/// let event = BinlogEvent::new(binlog.next_event_id(), 1, 0, 0, &b"payload"[..]);
/// binlog.add_raw_event(event, BinlogDebugInfo::here())?;
/// binlog.flush()?;
/// ```
pub struct Binlog {
    path: PathBuf,
    file: File,
    key: DbKey,
    crypto: Option<CtrStream>,
    next_event_id: u64,
    needs_sync: bool,
}

impl Binlog {
    /// Open (or create) the binlog at `path`, replaying every valid
    /// record into `replay`.
    ///
    /// Trailing bytes that do not form a complete CRC-valid record are
    /// truncated. A plaintext file opened with a non-empty key is
    /// rewritten encrypted. An error from `replay` aborts the open and
    /// leaves the file unchanged.
    pub fn init<F>(path: impl AsRef<Path>, replay: F, db_key: DbKey) -> Result<Self, DbError>
    where
        F: FnMut(&BinlogEvent) -> CoreResult<()>,
    {
        Self::init_impl(path.as_ref(), replay, db_key, None)
    }

    /// Like [`init`](Self::init), but when decryption with `db_key`
    /// fails, retries with `old_db_key`; on success the file is
    /// rewritten under `db_key`.
    pub fn init_with_old_key<F>(
        path: impl AsRef<Path>,
        replay: F,
        db_key: DbKey,
        old_db_key: DbKey,
    ) -> Result<Self, DbError>
    where
        F: FnMut(&BinlogEvent) -> CoreResult<()>,
    {
        Self::init_impl(path.as_ref(), replay, db_key, Some(old_db_key))
    }

    fn init_impl<F>(
        path: &Path,
        mut replay: F,
        db_key: DbKey,
        old_db_key: Option<DbKey>,
    ) -> Result<Self, DbError>
    where
        F: FnMut(&BinlogEvent) -> CoreResult<()>,
    {
        promote_sibling(path)?;

        let raw = match std::fs::read(path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(err) => return Err(err.into()),
        };

        let (decoded, recovered_with_old_key) = match decode_file(&raw, &db_key) {
            Ok(decoded) => (decoded, false),
            Err(err) if err.is_wrong_key() => match old_db_key {
                Some(old_key) => (decode_file(&raw, &old_key)?, true),
                None => return Err(err),
            },
            Err(err) => return Err(err),
        };

        let (events, bad_tail) = parse_records(&decoded.records);
        for event in &events {
            replay(event).map_err(DbError::ReplayAborted)?;
        }
        let next_event_id = events.last().map_or(0, |event| event.event_id + 1);

        let header_len = decoded.crypto.as_ref().map_or(0, |_| HEADER_LEN);
        if let Some((bad_offset, reason)) = bad_tail {
            let keep = header_len as u64 + bad_offset as u64;
            tracing::warn!(
                path = %path.display(),
                dropped = raw.len() as u64 - keep,
                reason,
                "truncating binlog after last valid record"
            );
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(keep)?;
            file.sync_all()?;
        }

        // A recovered or plaintext-with-key file is rewritten under the
        // requested key; otherwise continue appending in place.
        let needs_rewrite =
            recovered_with_old_key || (!db_key.is_empty() && decoded.crypto.is_none());

        let records_len = serialized_len(&events);
        let crypto = if needs_rewrite {
            write_whole_file(path, &events, &db_key)?
        } else {
            decoded.crypto.map(|(key, _salt, iv)| {
                let mut stream = CtrStream::new(&key, &iv);
                stream.seek(records_len);
                stream
            })
        };

        let file = OpenOptions::new().append(true).create(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
            key: db_key,
            crypto,
            next_event_id,
            needs_sync: false,
        })
    }

    /// The id the next appended event will receive.
    pub fn next_event_id(&self) -> u64 {
        self.next_event_id
    }

    /// Append a record. Durable only after [`flush`](Self::flush).
    pub fn add_raw_event(
        &mut self,
        event: BinlogEvent,
        debug_info: BinlogDebugInfo,
    ) -> Result<(), DbError> {
        if event.event_id < self.next_event_id {
            return Err(DbError::NonMonotonicEventId {
                got: event.event_id,
                expected: self.next_event_id,
            });
        }
        self.next_event_id = event.event_id + 1;

        let mut frame = event.serialize();
        if let Some(stream) = &mut self.crypto {
            stream.apply(&mut frame);
        }
        self.file.write_all(&frame).map_err(|err| {
            tracing::error!(
                path = %self.path.display(),
                file = debug_info.file,
                line = debug_info.line,
                %err,
                "binlog append failed"
            );
            err
        })?;
        self.needs_sync = true;
        Ok(())
    }

    /// Fsync pending appends.
    pub fn flush(&mut self) -> Result<(), DbError> {
        if self.needs_sync {
            self.file.sync_data()?;
            self.needs_sync = false;
        }
        Ok(())
    }

    /// Rewrite the entire file under `new_key` atomically.
    pub fn change_key(&mut self, new_key: DbKey) -> Result<(), DbError> {
        self.flush()?;
        let events = self.read_all_events()?;
        let crypto = write_whole_file(&self.path, &events, &new_key)?;
        self.file = OpenOptions::new().append(true).open(&self.path)?;
        self.key = new_key;
        self.crypto = crypto;
        self.needs_sync = false;
        Ok(())
    }

    /// Flush and release the file.
    pub fn close(mut self) -> Result<(), DbError> {
        self.flush()
    }

    /// Remove the binlog and its sidecar files.
    pub fn destroy(path: impl AsRef<Path>) -> Result<(), DbError> {
        let path = path.as_ref();
        remove_if_exists(&sibling_tmp_path(path))?;
        remove_if_exists(&sibling_path(path))?;
        remove_if_exists(path)
    }

    fn read_all_events(&self) -> Result<Vec<BinlogEvent>, DbError> {
        let raw = std::fs::read(&self.path)?;
        let decoded = decode_file(&raw, &self.key)?;
        let (events, bad_tail) = parse_records(&decoded.records);
        if let Some((offset, reason)) = bad_tail {
            return Err(DbError::corrupted(offset as u64, reason));
        }
        Ok(events)
    }
}

impl Drop for Binlog {
    fn drop(&mut self) {
        if self.needs_sync {
            let _ = self.file.sync_data();
        }
    }
}

fn serialized_len(events: &[BinlogEvent]) -> u64 {
    events.iter().map(|event| event.size_on_disk() as u64).sum()
}
