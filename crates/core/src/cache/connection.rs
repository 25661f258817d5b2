//! SQLite handle for the partition store.
//!
//! Opening a database applies the connection pragmas and brings the schema
//! up to [`SCHEMA_VERSION`], tracked in SQLite's own `user_version` header
//! field. Partition deletes rely on `ON DELETE CASCADE`, so `foreign_keys`
//! must be on for every connection.

use std::path::Path;

use tokio_rusqlite::Connection;
use tokio_rusqlite::rusqlite;

use crate::Error;

/// Schema revision this build reads and writes.
pub const SCHEMA_VERSION: i64 = 1;

const SCHEMA_V1: &str = include_str!("../../migrations/001_partitions.sql");

const PRAGMAS: &str = "PRAGMA journal_mode=WAL;
     PRAGMA synchronous=NORMAL;
     PRAGMA temp_store=MEMORY;
     PRAGMA foreign_keys=ON;";

/// Persistent partition store.
///
/// Cloning shares the underlying connection thread.
#[derive(Clone, Debug)]
pub struct CacheDb {
    pub(crate) conn: Connection,
}

impl CacheDb {
    /// Open or create the database file at `path`.
    ///
    /// # Errors
    ///
    /// `Error::Database` if the file cannot be opened, `Error::MigrationFailed`
    /// if it was written by a newer schema.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| Error::Config(format!("{}: {e}", parent.display())))?;
        }
        let conn = Connection::open(path).await.map_err(|e| Error::Database(e.into()))?;
        let db = Self::prepare(conn).await?;
        tracing::debug!(path = %path.display(), "opened cache database");
        Ok(db)
    }

    /// Open a private in-memory database.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::Database(e.into()))?;
        Self::prepare(conn).await
    }

    async fn prepare(conn: Connection) -> Result<Self, Error> {
        let applied = conn
            .call(|conn| -> Result<Option<i64>, Error> {
                conn.execute_batch(PRAGMAS)?;
                upgrade(conn)
            })
            .await
            .map_err(Error::from)?;

        if let Some(from) = applied {
            tracing::info!(from, to = SCHEMA_VERSION, "upgraded cache schema");
        }
        Ok(Self { conn })
    }

    /// Schema version recorded in the database file.
    pub async fn schema_version(&self) -> Result<i64, Error> {
        self.conn
            .call(|conn| -> Result<i64, Error> { Ok(user_version(conn)?) })
            .await
            .map_err(Error::from)
    }
}

fn user_version(conn: &rusqlite::Connection) -> rusqlite::Result<i64> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
}

/// Create or upgrade the schema in one transaction. Returns the version it
/// started from when anything was applied.
fn upgrade(conn: &mut rusqlite::Connection) -> Result<Option<i64>, Error> {
    let current = user_version(conn)?;
    if current == SCHEMA_VERSION {
        return Ok(None);
    }
    if current > SCHEMA_VERSION {
        return Err(Error::MigrationFailed(format!(
            "database schema {current} is newer than supported {SCHEMA_VERSION}"
        )));
    }

    let tx = conn.transaction()?;
    if current < 1 {
        tx.execute_batch(SCHEMA_V1)?;
    }
    tx.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    tx.commit()?;
    Ok(Some(current))
}
