//! Keyed blob storage

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{params, OptionalExtension, TransactionBehavior};

use crate::error::Result;
use crate::util::now_millis;

use super::Database;

/// Blob key of the entry collection
pub const ENTRIES_KEY: &str = "drinking_diary_logs";
/// Blob key of the custom tag registry
pub const TAGS_KEY: &str = "drinking_diary_tags";
/// Blob key of the cached identity
pub const IDENTITY_KEY: &str = "user_info";
/// Blob key of the home view state
pub const VIEW_STATE_KEY: &str = "home_view_state";

/// Trait for whole-value storage under string keys
pub trait BlobStore: Send + Sync {
    /// Read the value stored under `key`
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Overwrite the value stored under `key`
    fn put(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`; absent keys are not an error
    fn remove(&self, key: &str) -> Result<()>;

    /// Read-modify-write `key`.
    ///
    /// `apply` receives the current value and returns the replacement, or
    /// `None` to leave it alone. Errors from `apply` abort without writing.
    /// The default is a plain get-then-put; stores shared between processes
    /// override it with a real transaction.
    fn update(
        &self,
        key: &str,
        apply: &mut dyn FnMut(Option<String>) -> Result<Option<String>>,
    ) -> Result<()> {
        if let Some(next) = apply(self.get(key)?)? {
            self.put(key, &next)?;
        }
        Ok(())
    }
}

const UPSERT_SQL: &str = "INSERT INTO blobs (key, value, updated_at) VALUES (?1, ?2, ?3)
     ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at";
const SELECT_SQL: &str = "SELECT value FROM blobs WHERE key = ?1";

/// `SQLite` implementation of `BlobStore`
#[derive(Clone)]
pub struct SqliteBlobStore {
    db: Arc<Mutex<Database>>,
}

impl SqliteBlobStore {
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    /// Open the blob store in the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(Database::open(path)?))
    }

    /// Open an in-memory blob store (primarily for tests).
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Database::open_in_memory()?))
    }
}

impl BlobStore for SqliteBlobStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let db = self.db.lock();
        let value = db
            .connection()
            .query_row(SELECT_SQL, params![key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        let db = self.db.lock();
        db.connection()
            .execute(UPSERT_SQL, params![key, value, now_millis()])?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let db = self.db.lock();
        db.connection()
            .execute("DELETE FROM blobs WHERE key = ?1", params![key])?;
        Ok(())
    }

    /// Runs under `BEGIN IMMEDIATE`, so writers in other processes queue on
    /// the database lock instead of overwriting each other.
    fn update(
        &self,
        key: &str,
        apply: &mut dyn FnMut(Option<String>) -> Result<Option<String>>,
    ) -> Result<()> {
        let mut db = self.db.lock();
        let tx = db
            .connection_mut()
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let current = tx
            .query_row(SELECT_SQL, params![key], |row| row.get(0))
            .optional()?;
        if let Some(next) = apply(current)? {
            tx.execute(UPSERT_SQL, params![key, next, now_millis()])?;
        }
        tx.commit()?;
        Ok(())
    }
}
