//! libSQL handle backing the offline queue and the conflict list

use std::path::{Path, PathBuf};

use libsql::{Builder, Connection};

use super::migrations;
use crate::error::Result;

/// Pragmas applied on open. Failures are ignored: in-memory databases have
/// no WAL and older builds may reject `busy_timeout`.
const PRAGMAS: [&str; 3] = [
    "PRAGMA journal_mode = WAL;",
    "PRAGMA synchronous = NORMAL;",
    "PRAGMA busy_timeout = 5000;",
];

/// One open offline database with its schema brought up to date.
pub struct Database {
    _handle: libsql::Database,
    conn: Connection,
    location: Option<PathBuf>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Open (or create) the queue database at `path`, creating missing
    /// parent directories, and migrate it.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => std::fs::create_dir_all(dir)?,
            _ => {}
        }
        let handle = Builder::new_local(path).build().await?;
        Self::prepare(handle, Some(path.to_path_buf())).await
    }

    /// Throwaway database for tests and dry runs.
    pub async fn open_in_memory() -> Result<Self> {
        let handle = Builder::new_local(":memory:").build().await?;
        Self::prepare(handle, None).await
    }

    async fn prepare(handle: libsql::Database, location: Option<PathBuf>) -> Result<Self> {
        let conn = handle.connect()?;
        for pragma in PRAGMAS {
            if let Err(error) = conn.execute(pragma, ()).await {
                tracing::debug!("Skipping `{pragma}`: {error}");
            }
        }
        migrations::run(&conn).await?;
        Ok(Self {
            _handle: handle,
            conn,
            location,
        })
    }

    /// File backing this database; `None` when in memory.
    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test(flavor = "multi_thread")]
    async fn in_memory_database_has_queue_table() {
        let db = Database::open_in_memory().await.unwrap();
        assert!(db.location().is_none());

        let mut rows = db
            .connection()
            .query("SELECT COUNT(*) FROM offline_records", ())
            .await
            .unwrap();
        let row = rows.next().await.unwrap().unwrap();
        assert_eq!(row.get::<i64>(0).unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn open_creates_nested_directories_and_reopens() {
        let tmp = tempdir().unwrap();
        let db_path = tmp.path().join("profiles").join("student").join("learnsync.db");

        let db = Database::open(&db_path).await.unwrap();
        assert_eq!(db.location(), Some(db_path.as_path()));
        drop(db);
        assert!(db_path.exists());

        Database::open(&db_path).await.unwrap();
    }
}
