//! # tgsys-db - Durable key-value layer
//!
//! The storage layer of the tgsys client core, built from three pieces:
//!
//! - [`binlog`] - an append-only, framed, optionally encrypted on-disk
//!   event log with crash-safe replay, live rekey and a thread-safe
//!   batching variant ([`binlog::ConcurrentBinlog`])
//! - [`sqlite`] - a wrapper over an embedded SQL engine with page-level
//!   encryption, per-thread connection management and key-value table
//!   projections
//! - [`seq_kv`] - an in-memory ordered key-value store whose every
//!   observable mutation is assigned a monotonically increasing sequence
//!   number
//!
//! The two persistent key-value implementations compose these:
//! [`BinlogKeyValue`] keeps state in a [`SeqKeyValue`] and journals every
//! mutation into a binlog; [`sqlite::SqliteKeyValueSafe`] keeps state in
//! an SQL table. Both implement the [`PersistentKeyValue`] contract.
//!
//! All stores take a [`DbKey`] (empty, password-derived or raw) uniformly.

pub mod binlog;
pub mod binlog_kv;
pub mod db_key;
pub mod errors;
pub mod kv;
pub mod seq_kv;
pub mod sqlite;

// Re-export commonly used types
pub use binlog::{Binlog, BinlogDebugInfo, BinlogEvent, ConcurrentBinlog};
pub use binlog_kv::BinlogKeyValue;
pub use db_key::DbKey;
pub use errors::DbError;
pub use kv::PersistentKeyValue;
pub use seq_kv::{SeqKeyValue, SeqNo, TsSeqKeyValue};
pub use sqlite::{SqliteConnectionSafe, SqliteDb, SqliteKeyValue, SqliteKeyValueSafe};
