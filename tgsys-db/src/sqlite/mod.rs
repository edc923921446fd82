//! Embedded SQL store with page-level encryption.
//!
//! A thin wrapper over the embedded engine: pragma-driven encryption
//! compatible with the upstream SQLCipher model, required pragmas
//! applied on open, key migration, per-thread connection management and
//! key-value table projections.

pub mod connection_safe;
pub mod db;
pub mod key_value;
pub mod key_value_async;

pub use connection_safe::{SqliteConnectionSafe, SqliteKeyValueSafe};
pub use db::SqliteDb;
pub use key_value::SqliteKeyValue;
pub use key_value_async::{SqliteKeyValueAsync, SqliteKeyValueAsyncConfig};
