use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;

use super::migrations;
use crate::error::Result;

/// How long a writer waits for another process holding the write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// The local `SQLite` file, configured and migrated on open.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the database at `path`, creating missing parent
    /// directories.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let database = Self::prepare(Connection::open(path)?, true)?;
        tracing::debug!("Opened database at {}", path.display());
        Ok(database)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::prepare(Connection::open_in_memory()?, false)
    }

    fn prepare(conn: Connection, on_disk: bool) -> Result<Self> {
        if on_disk {
            let mode: String =
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
            tracing::trace!("journal_mode={mode}");
        }
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        migrations::run(&conn)?;
        Ok(Self { conn })
    }

    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}
