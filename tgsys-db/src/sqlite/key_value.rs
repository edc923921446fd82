//! Key-value table projection over one connection.

// Layer 1: Standard library
use std::collections::HashMap;

// Layer 2: Third-party
use rusqlite::OptionalExtension;

// Layer 3: Internal
use super::db::SqliteDb;
use crate::errors::DbError;

pub(crate) fn validate_table_name(table: &str) -> Result<(), DbError> {
    let valid = !table.is_empty()
        && table
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(DbError::corrupted(0, format!("invalid table name {table:?}")))
    }
}

/// A thin `(k BLOB PRIMARY KEY, v BLOB)` projection owning its
/// connection. Single-threaded, like the connection itself.
pub struct SqliteKeyValue {
    db: SqliteDb,
    table: String,
}

impl SqliteKeyValue {
    /// Create the table if needed and wrap the connection.
    pub fn new(db: SqliteDb, table: impl Into<String>) -> Result<Self, DbError> {
        let table = table.into();
        validate_table_name(&table)?;
        db.exec(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (k BLOB PRIMARY KEY, v BLOB)"
        ))?;
        Ok(Self { db, table })
    }

    /// The wrapped connection.
    pub fn db(&self) -> &SqliteDb {
        &self.db
    }

    /// The stored value, or `None` when absent.
    pub fn get(&self, key: &str) -> Result<Option<String>, DbError> {
        let mut stmt = self
            .db
            .get_statement(&format!("SELECT v FROM {} WHERE k = ?1", self.table))?;
        let value: Option<Vec<u8>> = stmt
            .query_row([key.as_bytes()], |row| row.get(0))
            .optional()?;
        Ok(value.map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }

    /// Store `value` under `key`.
    pub fn set(&self, key: &str, value: &str) -> Result<(), DbError> {
        let mut stmt = self.db.get_statement(&format!(
            "INSERT OR REPLACE INTO {} (k, v) VALUES (?1, ?2)",
            self.table
        ))?;
        stmt.execute([key.as_bytes(), value.as_bytes()])?;
        Ok(())
    }

    /// Remove `key`.
    pub fn erase(&self, key: &str) -> Result<(), DbError> {
        let mut stmt = self
            .db
            .get_statement(&format!("DELETE FROM {} WHERE k = ?1", self.table))?;
        stmt.execute([key.as_bytes()])?;
        Ok(())
    }

    /// Store every entry of `map` inside a single transaction.
    pub fn set_all(&self, map: &HashMap<String, String>) -> Result<(), DbError> {
        self.db.begin_transaction()?;
        let result = (|| {
            for (key, value) in map {
                self.set(key, value)?;
            }
            Ok(())
        })();
        finish_transaction(&self.db, result)
    }

    /// Remove every key of `keys` inside a single transaction.
    pub fn erase_batch(&self, keys: &[String]) -> Result<(), DbError> {
        self.db.begin_transaction()?;
        let result = (|| {
            for key in keys {
                self.erase(key)?;
            }
            Ok(())
        })();
        finish_transaction(&self.db, result)
    }
}

pub(crate) fn finish_transaction(db: &SqliteDb, result: Result<(), DbError>) -> Result<(), DbError> {
    match result {
        Ok(()) => db.commit_transaction(),
        Err(err) => {
            if let Err(rollback_err) = db.rollback_transaction() {
                tracing::error!(%rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_name_validation() {
        assert!(validate_table_name("kv").is_ok());
        assert!(validate_table_name("kv_2").is_ok());
        assert!(validate_table_name("").is_err());
        assert!(validate_table_name("kv; DROP TABLE kv").is_err());
        assert!(validate_table_name("kv\"").is_err());
    }
}
