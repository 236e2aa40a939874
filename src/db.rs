use crate::error::{Result, YawlError};
use log::{debug, info, warn};
use rusqlite::{Connection, OpenFlags, OptionalExtension, Transaction, params};
use std::fs;
use std::path::{Path, PathBuf};

// --- Connections ---

/// A SQLite file plus the flags every connection to it is opened with.
///
/// Stores hold a `DataSource` instead of a live connection: each operation
/// opens its own connection, and the connection closes when it goes out of
/// scope on every exit path.
#[derive(Debug, Clone)]
pub struct DataSource {
    path: PathBuf,
    writable: bool,
}

impl DataSource {
    pub fn read_only<P: AsRef<Path>>(path: P) -> Self {
        DataSource {
            path: path.as_ref().to_path_buf(),
            writable: false,
        }
    }

    /// Read-write access; the file and its parent directory are created if needed.
    pub fn read_write<P: AsRef<Path>>(path: P) -> Self {
        DataSource {
            path: path.as_ref().to_path_buf(),
            writable: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn open(&self) -> Result<Connection> {
        if self.writable {
            if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            let conn = Connection::open_with_flags(
                &self.path,
                OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
            )?;
            conn.pragma_update(None, "journal_mode", "WAL")?;
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            conn.pragma_update(None, "cache_size", "-64000")?;
            Ok(conn)
        } else {
            if !self.path.exists() {
                return Err(YawlError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("database file {:?} does not exist", self.path),
                )));
            }
            let conn = Connection::open_with_flags(
                &self.path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            Ok(conn)
        }
    }

    /// Deletes the database file and its WAL/SHM companions. Missing files are not an error.
    pub fn remove(&self) -> Result<()> {
        if !self.path.exists() {
            info!("Database file not found, nothing to clear: {:?}", self.path);
            return Ok(());
        }
        fs::remove_file(&self.path)?;
        for ext in ["db-wal", "db-shm"] {
            let companion = self.path.with_extension(ext);
            match fs::remove_file(&companion) {
                Ok(()) => debug!("Deleted {:?}", companion),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Could not delete {:?}: {}", companion, e),
            }
        }
        info!("Deleted database file: {:?}", self.path);
        Ok(())
    }
}

// --- Schema version bookkeeping ---

const CREATE_METADATA_TABLE: &str = "
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);";

/// Records `version` in the metadata table, warning when an existing file disagrees.
pub fn ensure_schema_version(tx: &Transaction, version: u32) -> Result<()> {
    tx.execute(CREATE_METADATA_TABLE, [])?;
    let existing: Option<String> = tx
        .query_row("SELECT value FROM metadata WHERE key = 'schema_version'", [], |row| row.get(0))
        .optional()?;

    match existing {
        Some(v) => {
            let existing: u32 = v
                .parse()
                .map_err(|e| YawlError::DataIntegrity(format!("bad schema version '{}': {}", v, e)))?;
            match existing.cmp(&version) {
                std::cmp::Ordering::Less => {
                    warn!(
                        "Database schema version ({}) is older than expected ({}). Updating version marker.",
                        existing, version
                    );
                    tx.execute(
                        "UPDATE metadata SET value = ?1 WHERE key = 'schema_version'",
                        params![version.to_string()],
                    )?;
                }
                std::cmp::Ordering::Greater => warn!(
                    "Database schema version ({}) is newer than expected ({}).",
                    existing, version
                ),
                std::cmp::Ordering::Equal => debug!("Database schema version {} matches.", existing),
            }
        }
        None => {
            tx.execute(
                "INSERT INTO metadata (key, value) VALUES ('schema_version', ?1)",
                params![version.to_string()],
            )?;
            info!("Set initial schema version {}.", version);
        }
    }
    Ok(())
}

pub fn table_row_count(conn: &Connection, table: &str) -> Result<i64> {
    let count = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
    Ok(count)
}

// --- Text patterns ---

/// A user search pattern where `%` is the only wildcard.
///
/// Renders to an escaped SQL `LIKE` pattern (escape character `@`) or to a
/// `GLOB` pattern for case-sensitive matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextPattern {
    raw: String,
}

pub const LIKE_ESCAPE: char = '@';

impl TextPattern {
    pub fn new(raw: &str) -> Self {
        TextPattern { raw: raw.to_string() }
    }

    /// Wraps the pattern in `%…%` unless it already contains a wildcard.
    pub fn substring(raw: &str) -> Self {
        if raw.contains('%') {
            Self::new(raw)
        } else {
            Self::new(&format!("%{}%", raw))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn has_wildcard(&self) -> bool {
        self.raw.contains('%')
    }

    /// `LIKE` pattern: `_` and the escape character are escaped, `%` is kept.
    pub fn like(&self) -> String {
        let mut out = String::with_capacity(self.raw.len());
        for c in self.raw.chars() {
            if c == '_' || c == LIKE_ESCAPE {
                out.push(LIKE_ESCAPE);
            }
            out.push(c);
        }
        out
    }

    /// `GLOB` pattern: `%` becomes `*`, GLOB metacharacters are bracketed.
    pub fn glob(&self) -> String {
        let mut out = String::with_capacity(self.raw.len());
        for c in self.raw.chars() {
            match c {
                '%' => out.push('*'),
                '*' | '?' | '[' => {
                    out.push('[');
                    out.push(c);
                    out.push(']');
                }
                _ => out.push(c),
            }
        }
        out
    }

    /// SQL condition on `column` and its bound value.
    ///
    /// Without a wildcard the condition is an equality test.
    pub fn condition(&self, column: &str, ignore_case: bool) -> (String, String) {
        match (self.has_wildcard(), ignore_case) {
            (true, true) => (
                format!("lower({}) LIKE ? ESCAPE '{}'", column, LIKE_ESCAPE),
                self.like().to_lowercase(),
            ),
            (true, false) => (format!("{} GLOB ?", column), self.glob()),
            (false, true) => (format!("lower({}) = ?", column), self.raw.to_lowercase()),
            (false, false) => (format!("{} = ?", column), self.raw.clone()),
        }
    }
}

/// `?, ?, ?` for an `IN (...)` clause.
pub fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}
