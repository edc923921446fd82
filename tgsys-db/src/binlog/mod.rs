//! Write-ahead binary log.
//!
//! An append-only sequence of framed, CRC-protected records, optionally
//! encrypted as a stream behind an authenticated file header. Replayable
//! on open, rewritable in place for key changes, crash-safe through
//! tail truncation and a two-phase sibling-file protocol.

pub mod concurrent;
pub mod event;
pub mod log;

pub(crate) mod crypto;

pub use concurrent::ConcurrentBinlog;
pub use event::{BinlogDebugInfo, BinlogEvent};
pub use log::Binlog;
