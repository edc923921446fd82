//! Connection wrapper over the embedded SQL engine.

// Layer 1: Standard library
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// Layer 2: Third-party
use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags};

// Layer 3: Internal
use crate::db_key::DbKey;
use crate::errors::DbError;

const PREPARED_STATEMENT_CACHE: usize = 64;

fn escape_sql_string(value: &str) -> String {
    value.replace('\'', "''")
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = std::fmt::Write::write_fmt(&mut out, format_args!("{byte:02x}"));
    }
    out
}

/// Key literal usable inside `PRAGMA key = ...` / `ATTACH ... KEY ...`.
/// Passwords go through the engine's own KDF; raw keys bypass it via the
/// blob form.
fn key_literal(db_key: &DbKey) -> String {
    match db_key {
        DbKey::Empty => "''".to_string(),
        DbKey::Password(password) => format!("'{}'", escape_sql_string(password)),
        DbKey::RawKey(raw) => format!("\"x'{}'\"", hex_encode(raw)),
    }
}

fn sidecar_paths(path: &Path) -> [PathBuf; 3] {
    let suffixed = |suffix: &str| {
        let mut os = path.as_os_str().to_owned();
        os.push(suffix);
        PathBuf::from(os)
    };
    [suffixed("-wal"), suffixed("-shm"), suffixed("-journal")]
}

fn sibling_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".new");
    PathBuf::from(os)
}

fn remove_if_exists(path: &Path) -> Result<(), DbError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn rekey_registry() -> &'static Mutex<HashSet<PathBuf>> {
    static IN_PROGRESS: OnceLock<Mutex<HashSet<PathBuf>>> = OnceLock::new();
    IN_PROGRESS.get_or_init(|| Mutex::new(HashSet::new()))
}

/// Exclusion marker for an in-progress key migration of one store.
struct RekeyGuard {
    path: PathBuf,
}

impl RekeyGuard {
    fn acquire(path: &Path) -> Result<Self, DbError> {
        if !rekey_registry().lock().insert(path.to_path_buf()) {
            return Err(DbError::KeyChangeInProgress);
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }
}

impl Drop for RekeyGuard {
    fn drop(&mut self) {
        rekey_registry().lock().remove(&self.path);
    }
}

/// A handle to one on-disk SQL store, optionally keyed.
///
/// Not shareable across threads; cross-thread use goes through
/// [`SqliteConnectionSafe`](crate::sqlite::SqliteConnectionSafe).
pub struct SqliteDb {
    conn: Connection,
    path: PathBuf,
}

impl SqliteDb {
    /// Open (or with `allow_create` create) the store at `path` and
    /// apply the required pragmas: `journal_mode=WAL`,
    /// `synchronous=NORMAL`, `temp_store=MEMORY`, `encoding="UTF-8"`.
    pub fn open_with_key(
        path: impl AsRef<Path>,
        allow_create: bool,
        db_key: &DbKey,
    ) -> Result<SqliteDb, DbError> {
        let path = path.as_ref();
        let flags = if allow_create {
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE
        } else {
            OpenFlags::SQLITE_OPEN_READ_WRITE
        };
        let conn = Connection::open_with_flags(path, flags)?;
        conn.set_prepared_statement_cache_capacity(PREPARED_STATEMENT_CACHE);

        if !db_key.is_empty() {
            // Must run before any other statement touches the file.
            run_pragma(&conn, &format!("PRAGMA key = {}", key_literal(db_key)))?;
        }

        // Probe the schema: a wrong key surfaces as "file is not a
        // database" here.
        let probe = conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| {
            row.get::<_, i64>(0)
        });
        if let Err(err) = probe {
            return Err(map_key_error(err));
        }

        run_pragma(&conn, "PRAGMA journal_mode=WAL")?;
        run_pragma(&conn, "PRAGMA synchronous=NORMAL")?;
        run_pragma(&conn, "PRAGMA temp_store=MEMORY")?;
        run_pragma(&conn, "PRAGMA encoding=\"UTF-8\"")?;

        Ok(SqliteDb {
            conn,
            path: path.to_path_buf(),
        })
    }

    /// Migrate the store key. Same-key calls are idempotent.
    ///
    /// Between two non-empty keys the engine rekeys the pages in place;
    /// across the plaintext boundary the store is exported into a
    /// sibling file under the new key and atomically renamed over the
    /// original, preserving `user_version` and all tables.
    ///
    /// Only one migration may run per store at a time; a concurrent
    /// call fails with [`DbError::KeyChangeInProgress`].
    pub fn change_key(
        path: impl AsRef<Path>,
        allow_create: bool,
        new_key: &DbKey,
        old_key: &DbKey,
    ) -> Result<SqliteDb, DbError> {
        let path = path.as_ref();
        let _rekey_guard = RekeyGuard::acquire(path)?;
        if !path.exists() {
            if !allow_create {
                return Err(DbError::Io(std::io::Error::from(
                    std::io::ErrorKind::NotFound,
                )));
            }
            return Self::open_with_key(path, true, new_key);
        }

        // The store may already be under the new key (repeated migration
        // after an interrupted startup is the normal case).
        match Self::open_with_key(path, false, new_key) {
            Ok(db) => return Ok(db),
            Err(err) if err.is_wrong_key() => {}
            Err(err) => return Err(err),
        }

        let db = Self::open_with_key(path, false, old_key)?;
        if !new_key.is_empty() && !old_key.is_empty() {
            // In-place page rekey.
            run_pragma(&db.conn, &format!("PRAGMA rekey = {}", key_literal(new_key)))?;
            drop(db);
        } else {
            // Crossing the plaintext boundary: export + atomic rename.
            let user_version = db.user_version()?;
            let sibling = sibling_path(path);
            remove_if_exists(&sibling)?;
            for sidecar in sidecar_paths(&sibling) {
                remove_if_exists(&sidecar)?;
            }

            let sibling_sql = escape_sql_string(&sibling.to_string_lossy());
            db.conn.execute_batch(&format!(
                "ATTACH DATABASE '{}' AS migrate KEY {};",
                sibling_sql,
                key_literal(new_key)
            ))?;
            run_pragma(&db.conn, "SELECT sqlcipher_export('migrate')")?;
            db.conn
                .execute_batch(&format!("PRAGMA migrate.user_version = {user_version};"))?;
            db.conn.execute_batch("DETACH DATABASE migrate;")?;
            drop(db);

            // The original connection is closed; its WAL is obsolete and
            // must not be replayed against the re-keyed file.
            for sidecar in sidecar_paths(path) {
                remove_if_exists(&sidecar)?;
            }
            std::fs::rename(&sibling, path)?;
        }
        Self::open_with_key(path, false, new_key)
    }

    /// Remove the store and its journal/WAL sidecars.
    pub fn destroy(path: impl AsRef<Path>) -> Result<(), DbError> {
        let path = path.as_ref();
        for sidecar in sidecar_paths(path) {
            remove_if_exists(&sidecar)?;
        }
        let sibling = sibling_path(path);
        for sidecar in sidecar_paths(&sibling) {
            remove_if_exists(&sidecar)?;
        }
        remove_if_exists(&sibling)?;
        remove_if_exists(path)
    }

    /// File path of this store.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run a statement with no result set.
    pub fn exec(&self, sql: &str) -> Result<(), DbError> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    /// Compile a statement, served from the per-connection cache when
    /// possible.
    pub fn get_statement(&self, sql: &str) -> Result<rusqlite::CachedStatement<'_>, DbError> {
        Ok(self.conn.prepare_cached(sql)?)
    }

    /// The persisted schema tag.
    pub fn user_version(&self) -> Result<i32, DbError> {
        Ok(self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?)
    }

    /// Set the persisted schema tag.
    pub fn set_user_version(&self, version: i32) -> Result<(), DbError> {
        self.conn
            .execute_batch(&format!("PRAGMA user_version = {version};"))?;
        Ok(())
    }

    /// Open a write transaction.
    pub fn begin_transaction(&self) -> Result<(), DbError> {
        self.exec("BEGIN IMMEDIATE")
    }

    /// Commit the open transaction.
    pub fn commit_transaction(&self) -> Result<(), DbError> {
        self.exec("COMMIT")
    }

    /// Roll back the open transaction.
    pub fn rollback_transaction(&self) -> Result<(), DbError> {
        self.exec("ROLLBACK")
    }
}

/// Run a pragma-like statement that may or may not return rows.
fn run_pragma(conn: &Connection, sql: &str) -> Result<(), DbError> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([])?;
    while rows.next()?.is_some() {}
    Ok(())
}

fn map_key_error(err: rusqlite::Error) -> DbError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == rusqlite::ErrorCode::NotADatabase =>
        {
            DbError::WrongKey
        }
        _ => DbError::Sql(err),
    }
}
