//! Per-thread connection management.
//!
//! Connections are not shareable across threads; the safe wrapper owns
//! one lazily opened connection per accessing thread, keyed by thread
//! id.

// Layer 1: Standard library
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::thread::ThreadId;

// Layer 2: Third-party
use dashmap::DashMap;
use parking_lot::Mutex;
use rusqlite::OptionalExtension;

// Layer 3: Internal
use super::db::SqliteDb;
use super::key_value::{finish_transaction, validate_table_name};
use crate::db_key::DbKey;
use crate::errors::DbError;
use crate::kv::PersistentKeyValue;
use crate::seq_kv::SeqNo;

/// Cross-thread access to one SQL store: each accessing thread gets its
/// own lazily opened connection.
pub struct SqliteConnectionSafe {
    path: PathBuf,
    db_key: DbKey,
    connections: DashMap<ThreadId, SqliteDb>,
}

// SAFETY: each `DashMap` entry is keyed by the owning thread's `ThreadId`
// and is only ever opened and accessed by `with()` on that same thread, so
// no two threads ever reach the same `SqliteDb` concurrently even though
// `SqliteDb` itself (via `rusqlite::Connection`) is not `Sync`.
unsafe impl Sync for SqliteConnectionSafe {}

impl SqliteConnectionSafe {
    /// Create the wrapper; no connection is opened until first use.
    pub fn new(path: impl AsRef<Path>, db_key: DbKey) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            db_key,
            connections: DashMap::new(),
        }
    }

    /// File path of the store.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` against the calling thread's connection, opening it on
    /// first use. Not reentrant from within `f`.
    pub fn with<R>(&self, f: impl FnOnce(&SqliteDb) -> Result<R, DbError>) -> Result<R, DbError> {
        let thread_id = std::thread::current().id();
        if !self.connections.contains_key(&thread_id) {
            let db = SqliteDb::open_with_key(&self.path, true, &self.db_key)?;
            self.connections.insert(thread_id, db);
        }
        match self.connections.get(&thread_id) {
            Some(db) => f(&db),
            None => Err(DbError::Closed),
        }
    }

    /// Number of threads currently holding a connection.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Drop every per-thread connection.
    pub fn close_all(&self) {
        self.connections.clear();
    }
}

/// Thread-safe key-value table over a [`SqliteConnectionSafe`], with
/// per-table write locking.
///
/// Mutations are not sequence-numbered by the SQL store; the SeqNo slot
/// of the contract is always 0 here.
pub struct SqliteKeyValueSafe {
    table: String,
    connection: std::sync::Arc<SqliteConnectionSafe>,
    write_lock: Mutex<()>,
}

impl SqliteKeyValueSafe {
    /// Bind table `table` on the shared connection.
    pub fn new(
        table: impl Into<String>,
        connection: std::sync::Arc<SqliteConnectionSafe>,
    ) -> Result<Self, DbError> {
        let table = table.into();
        validate_table_name(&table)?;
        Ok(Self {
            table,
            connection,
            write_lock: Mutex::new(()),
        })
    }

    fn ensure_table(&self, db: &SqliteDb) -> Result<(), DbError> {
        let mut stmt = db.get_statement(&format!(
            "CREATE TABLE IF NOT EXISTS {} (k BLOB PRIMARY KEY, v BLOB)",
            self.table
        ))?;
        stmt.execute([])?;
        Ok(())
    }

    /// The stored value, or `""` when absent.
    pub fn get(&self, key: &str) -> String {
        let result = self.connection.with(|db| {
            self.ensure_table(db)?;
            let mut stmt =
                db.get_statement(&format!("SELECT v FROM {} WHERE k = ?1", self.table))?;
            let value: Option<Vec<u8>> = stmt
                .query_row([key.as_bytes()], |row| row.get(0))
                .optional()?;
            Ok(value)
        });
        match result {
            Ok(Some(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
            Ok(None) => String::new(),
            Err(err) => {
                tracing::error!(%err, table = %self.table, "key-value read failed");
                String::new()
            }
        }
    }

    /// Store `value` under `key`.
    pub fn set(&self, key: &str, value: &str) {
        let _guard = self.write_lock.lock();
        let result = self.connection.with(|db| {
            self.ensure_table(db)?;
            let mut stmt = db.get_statement(&format!(
                "INSERT OR REPLACE INTO {} (k, v) VALUES (?1, ?2)",
                self.table
            ))?;
            stmt.execute([key.as_bytes(), value.as_bytes()])?;
            Ok(())
        });
        if let Err(err) = result {
            tracing::error!(%err, table = %self.table, "key-value write failed");
        }
    }

    /// Remove `key`.
    pub fn erase(&self, key: &str) {
        let _guard = self.write_lock.lock();
        let result = self.connection.with(|db| {
            self.ensure_table(db)?;
            let mut stmt =
                db.get_statement(&format!("DELETE FROM {} WHERE k = ?1", self.table))?;
            stmt.execute([key.as_bytes()])?;
            Ok(())
        });
        if let Err(err) = result {
            tracing::error!(%err, table = %self.table, "key-value erase failed");
        }
    }

    /// Apply `sets` and `erases` inside one transaction.
    pub fn apply_batch(
        &self,
        sets: HashMap<String, String>,
        erases: Vec<String>,
    ) -> Result<(), DbError> {
        let _guard = self.write_lock.lock();
        self.connection.with(|db| {
            self.ensure_table(db)?;
            db.begin_transaction()?;
            let result = (|| {
                for (key, value) in &sets {
                    let mut stmt = db.get_statement(&format!(
                        "INSERT OR REPLACE INTO {} (k, v) VALUES (?1, ?2)",
                        self.table
                    ))?;
                    stmt.execute([key.as_bytes(), value.as_bytes()])?;
                }
                for key in &erases {
                    let mut stmt =
                        db.get_statement(&format!("DELETE FROM {} WHERE k = ?1", self.table))?;
                    stmt.execute([key.as_bytes()])?;
                }
                Ok(())
            })();
            finish_transaction(db, result)
        })
    }
}

impl PersistentKeyValue for SqliteKeyValueSafe {
    fn get(&self, key: &str) -> String {
        SqliteKeyValueSafe::get(self, key)
    }

    fn set(&self, key: &str, value: &str) -> SeqNo {
        SqliteKeyValueSafe::set(self, key, value);
        0
    }

    fn erase(&self, key: &str) -> SeqNo {
        SqliteKeyValueSafe::erase(self, key);
        0
    }

    fn erase_batch(&self, keys: Vec<String>) -> SeqNo {
        if let Err(err) = self.apply_batch(HashMap::new(), keys) {
            tracing::error!(%err, table = %self.table, "key-value batch erase failed");
        }
        0
    }

    fn close(&self) {
        self.connection.close_all();
    }
}
