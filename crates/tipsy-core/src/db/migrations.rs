//! Schema steps for the local blob database.
//!
//! The applied version lives in `PRAGMA user_version`, so a fresh file
//! reports 0 and each step bumps it inside its own transaction.

use rusqlite::Connection;

use crate::error::Result;

/// Ordered schema steps. Append only; never edit a shipped step.
const STEPS: &[(i32, &str)] = &[(
    1,
    "CREATE TABLE IF NOT EXISTS blobs (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at INTEGER NOT NULL
    );",
)];

/// Apply every step newer than the stored version.
pub fn run(conn: &Connection) -> Result<()> {
    let current = schema_version(conn)?;

    for (version, sql) in STEPS.iter().filter(|(version, _)| *version > current) {
        conn.execute_batch(&format!(
            "BEGIN;\n{sql}\nPRAGMA user_version = {version};\nCOMMIT;"
        ))?;
        tracing::info!("Database schema now at version {version}");
    }

    Ok(())
}

pub fn schema_version(conn: &Connection) -> Result<i32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}
