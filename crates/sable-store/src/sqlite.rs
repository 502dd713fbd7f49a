//! SQLite implementation of the Store trait.
//!
//! Uses rusqlite with bundled SQLite, wrapped in async via
//! `tokio::task::spawn_blocking`.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{classify_put, PutResult, Record, RecordKind, Store};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations run on the blocking pool.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Poisoned(format!("sqlite connection: {}", e)))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<Record> {
    let raw_kind: u8 = row.get("kind")?;
    let kind = RecordKind::from_u8(raw_kind)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(0, raw_kind as i64))?;
    let revision: i64 = row.get("revision")?;
    Ok(Record {
        kind,
        id: row.get("id")?,
        revision: revision as u64,
        body: row.get("body")?,
        updated_at: row.get("updated_at")?,
    })
}

fn load(conn: &Connection, kind: RecordKind, id: &str) -> Result<Option<Record>> {
    let record = conn
        .query_row(
            "SELECT kind, id, revision, body, updated_at FROM records WHERE kind = ?1 AND id = ?2",
            params![kind.to_u8(), id],
            row_to_record,
        )
        .optional()?;
    Ok(record)
}

#[async_trait]
impl Store for SqliteStore {
    async fn put_record(&self, record: &Record) -> Result<PutResult> {
        let record = record.clone();

        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let existing = load(&tx, record.kind, &record.id)?;
            let result = classify_put(existing.as_ref(), &record);

            if matches!(result, PutResult::Inserted | PutResult::Updated) {
                tx.execute(
                    "INSERT INTO records (kind, id, revision, body, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(kind, id) DO UPDATE SET
                        revision = excluded.revision,
                        body = excluded.body,
                        updated_at = excluded.updated_at",
                    params![
                        record.kind.to_u8(),
                        record.id,
                        record.revision as i64,
                        record.body,
                        record.updated_at,
                    ],
                )?;
            }

            tx.commit()?;
            Ok(result)
        })
        .await
    }

    async fn get_record(&self, kind: RecordKind, id: &str) -> Result<Option<Record>> {
        let id = id.to_string();
        self.with_conn(move |conn| load(conn, kind, &id)).await
    }

    async fn list_records(&self, kind: RecordKind) -> Result<Vec<String>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare("SELECT id FROM records WHERE kind = ?1 ORDER BY id")?;
            let ids = stmt
                .query_map(params![kind.to_u8()], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(ids)
        })
        .await
    }

    async fn delete_record(&self, kind: RecordKind, id: &str) -> Result<bool> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let deleted = conn.execute(
                "DELETE FROM records WHERE kind = ?1 AND id = ?2",
                params![kind.to_u8(), id],
            )?;
            Ok(deleted > 0)
        })
        .await
    }
}
