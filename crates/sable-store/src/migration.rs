//! SQLite schema versioning.
//!
//! The schema version lives in `PRAGMA user_version`. `STEPS[n]` upgrades a
//! database from version `n` to `n + 1`; pending steps run in one transaction
//! together with the version bump.

use rusqlite::Connection;
use tracing::debug;

use crate::error::{Result, StoreError};

/// Upgrade steps, oldest first.
const STEPS: &[&str] = &[
    // 1: opaque records keyed by kind and id.
    r#"
    CREATE TABLE records (
        kind       INTEGER NOT NULL,
        id         TEXT    NOT NULL,
        revision   INTEGER NOT NULL,
        body       BLOB    NOT NULL,
        updated_at INTEGER NOT NULL,
        PRIMARY KEY (kind, id)
    );
    CREATE INDEX records_by_update ON records(updated_at);
    "#,
];

/// Schema version this build writes.
pub const CURRENT_VERSION: u32 = STEPS.len() as u32;

/// The version recorded in the database file.
pub fn schema_version(conn: &Connection) -> Result<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

/// Bring the schema up to [`CURRENT_VERSION`]. Safe to call on every open.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    let found = schema_version(conn)?;
    if found > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "schema version {} was written by a newer build (this build knows {})",
            found, CURRENT_VERSION
        )));
    }
    if found == CURRENT_VERSION {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for (index, step) in STEPS.iter().enumerate().skip(found as usize) {
        tx.execute_batch(step)?;
        debug!(version = index + 1, "schema step applied");
    }
    tx.pragma_update(None, "user_version", CURRENT_VERSION)?;
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_database_reaches_current_version() {
        let mut conn = Connection::open_in_memory().unwrap();
        assert_eq!(schema_version(&conn).unwrap(), 0);

        migrate(&mut conn).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), CURRENT_VERSION);

        let has_records: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = 'records'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!(has_records);
    }

    #[test]
    fn test_rerun_is_noop() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        conn.execute(
            "INSERT INTO records (kind, id, revision, body, updated_at) VALUES (1, 'a', 1, x'00', 0)",
            [],
        )
        .unwrap();

        migrate(&mut conn).unwrap();
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn test_future_version_refused() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", CURRENT_VERSION + 1).unwrap();

        assert!(matches!(migrate(&mut conn), Err(StoreError::Migration(_))));
    }
}
