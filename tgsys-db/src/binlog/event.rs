//! Binlog record framing.
//!
//! On-disk layout of one record:
//!
//! ```text
//! [length: u32 LE][event_id: u64][type: u32][flags: u32][extra: u64]
//! [payload, zero-padded to 4 bytes]
//! [crc32: u32 LE]
//! ```
//!
//! `length` is the logical record length `32 + payload_len` (header,
//! payload and CRC, excluding padding), so the exact payload length
//! survives the 4-byte alignment. The record occupies
//! `28 + pad4(payload_len) + 4` bytes on disk. The CRC covers every
//! byte before it, padding included. `event_id` strictly increases
//! across the records of a file.

// Layer 1: Standard library
// (none)

// Layer 2: Third-party
use bytes::Bytes;

// Layer 3: Internal
use crate::errors::DbError;
use tgsys_utils::{ByteReader, ByteWriter};

/// Fixed header length: length + event_id + type + flags + extra.
pub const EVENT_HEADER_LEN: usize = 28;

/// Trailing CRC length.
pub const EVENT_TAIL_LEN: usize = 4;

/// Logical length of a record with an empty payload.
pub const MIN_EVENT_LEN: usize = EVENT_HEADER_LEN + EVENT_TAIL_LEN;

/// Sanity cap on a single record; anything larger is treated as
/// corruption.
pub const MAX_EVENT_LEN: usize = 1 << 27;

fn pad4(len: usize) -> usize {
    (len + 3) & !3
}

/// Source location attached to an append for diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct BinlogDebugInfo {
    /// Source file of the append call.
    pub file: &'static str,
    /// Source line of the append call.
    pub line: u32,
}

impl BinlogDebugInfo {
    /// Capture the caller's source location.
    #[track_caller]
    pub fn here() -> Self {
        let location = std::panic::Location::caller();
        Self {
            file: location.file(),
            line: location.line(),
        }
    }
}

/// One framed binlog record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinlogEvent {
    /// Strictly increasing record id, equal to disk order.
    pub event_id: u64,
    /// Application-defined record type tag.
    pub event_type: u32,
    /// Application-defined flags.
    pub flags: u32,
    /// Application-defined extra word.
    pub extra: u64,
    /// Raw payload.
    pub payload: Bytes,
}

impl BinlogEvent {
    /// Create a record.
    pub fn new(
        event_id: u64,
        event_type: u32,
        flags: u32,
        extra: u64,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            event_id,
            event_type,
            flags,
            extra,
            payload: payload.into(),
        }
    }

    /// Bytes this record occupies on disk.
    pub fn size_on_disk(&self) -> usize {
        EVENT_HEADER_LEN + pad4(self.payload.len()) + EVENT_TAIL_LEN
    }

    /// Serialize to the on-disk frame.
    pub fn serialize(&self) -> Vec<u8> {
        let logical_len = MIN_EVENT_LEN + self.payload.len();
        let mut writer = ByteWriter::with_capacity(self.size_on_disk());
        writer.write_u32(logical_len as u32);
        writer.write_u64(self.event_id);
        writer.write_u32(self.event_type);
        writer.write_u32(self.flags);
        writer.write_u64(self.extra);
        writer.write_bytes(&self.payload);
        writer.pad_to(4);
        let crc = crc32fast::hash(writer.as_slice());
        writer.write_u32(crc);
        writer.into_inner()
    }

    /// Try to parse one record from the start of `buf`.
    ///
    /// Returns `Ok(Some((event, consumed)))` on success, `Ok(None)` when
    /// `buf` holds only an incomplete tail, and `Err` on corruption.
    /// `offset` is the position of `buf` in the file, used for error
    /// reporting only.
    pub fn parse(buf: &[u8], offset: u64) -> Result<Option<(BinlogEvent, usize)>, DbError> {
        if buf.len() < 4 {
            return Ok(None);
        }
        let logical_len =
            u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        if !(MIN_EVENT_LEN..=MAX_EVENT_LEN).contains(&logical_len) {
            return Err(DbError::corrupted(
                offset,
                format!("invalid event length {logical_len}"),
            ));
        }
        let payload_len = logical_len - MIN_EVENT_LEN;
        let disk_len = EVENT_HEADER_LEN + pad4(payload_len) + EVENT_TAIL_LEN;
        if buf.len() < disk_len {
            return Ok(None);
        }

        let crc_offset = disk_len - EVENT_TAIL_LEN;
        let stored_crc = u32::from_le_bytes([
            buf[crc_offset],
            buf[crc_offset + 1],
            buf[crc_offset + 2],
            buf[crc_offset + 3],
        ]);
        let actual_crc = crc32fast::hash(&buf[..crc_offset]);
        if stored_crc != actual_crc {
            return Err(DbError::corrupted(offset, "checksum mismatch"));
        }

        let mut reader = ByteReader::new(&buf[4..crc_offset]);
        let read = |err| DbError::corrupted(offset, format!("bad header: {err}"));
        let event_id = reader.read_u64().map_err(read)?;
        let event_type = reader.read_u32().map_err(read)?;
        let flags = reader.read_u32().map_err(read)?;
        let extra = reader.read_u64().map_err(read)?;
        let payload = reader.read_bytes(payload_len).map_err(read)?;

        Ok(Some((
            BinlogEvent {
                event_id,
                event_type,
                flags,
                extra,
                payload: Bytes::copy_from_slice(payload),
            },
            disk_len,
        )))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Tests are allowed to use unwrap for simplicity
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_unaligned_payload() {
        let event = BinlogEvent::new(7, 1, 0, 99, Bytes::from_static(b"abcde"));
        let frame = event.serialize();
        assert_eq!(frame.len() % 4, 0);
        assert_eq!(frame.len(), event.size_on_disk());

        let (parsed, consumed) = BinlogEvent::parse(&frame, 0).unwrap().unwrap();
        assert_eq!(consumed, frame.len());
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_round_trip_empty_payload() {
        let event = BinlogEvent::new(1, 2, 3, 4, Bytes::new());
        let frame = event.serialize();
        assert_eq!(frame.len(), MIN_EVENT_LEN);
        let (parsed, _) = BinlogEvent::parse(&frame, 0).unwrap().unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_truncated_frame_is_incomplete_not_corrupt() {
        let event = BinlogEvent::new(7, 1, 0, 0, Bytes::from_static(b"payload"));
        let frame = event.serialize();
        for cut in 0..frame.len() {
            let result = BinlogEvent::parse(&frame[..cut], 0);
            assert!(matches!(result, Ok(None)), "cut {cut}: {result:?}");
        }
    }

    #[test]
    fn test_bit_flip_is_corrupt() {
        let event = BinlogEvent::new(7, 1, 0, 0, Bytes::from_static(b"payload"));
        let mut frame = event.serialize();
        frame[10] ^= 0x01;
        let err = BinlogEvent::parse(&frame, 32).unwrap_err();
        assert!(matches!(err, DbError::Corrupted { offset: 32, .. }));
    }

    #[test]
    fn test_absurd_length_is_corrupt() {
        let mut frame = vec![0u8; 64];
        frame[..4].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(BinlogEvent::parse(&frame, 0).is_err());
    }

    #[test]
    fn test_two_records_back_to_back() {
        let a = BinlogEvent::new(1, 1, 0, 0, Bytes::from_static(b"a"));
        let b = BinlogEvent::new(2, 1, 0, 0, Bytes::from_static(b"bb"));
        let mut buf = a.serialize();
        buf.extend_from_slice(&b.serialize());

        let (first, consumed) = BinlogEvent::parse(&buf, 0).unwrap().unwrap();
        assert_eq!(first, a);
        let (second, _) = BinlogEvent::parse(&buf[consumed..], consumed as u64)
            .unwrap()
            .unwrap();
        assert_eq!(second, b);
    }
}
