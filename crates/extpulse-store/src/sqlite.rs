use crate::{SessionStore, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use extpulse_model::{CategoryCounts, NewSession, SessionRecord};
use rusqlite::{params, Connection, Row};
use std::path::Path;
use tokio::sync::Mutex;

pub const SQLITE_SCHEMA_VERSION: i64 = 1;

/// One owned connection behind an async mutex. Every statement is a short
/// single-row or single-scan critical section; the database file is the
/// only state shared across requests.
pub struct SqliteSessionStore {
    conn: Mutex<Connection>,
}

impl SqliteSessionStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| StoreError(e.to_string()))?;
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA temp_store=MEMORY;
            CREATE TABLE IF NOT EXISTS sessions (
              id INTEGER PRIMARY KEY,
              session_start TEXT,
              session_end TEXT,
              user_count INTEGER,
              cat_idea_generation INTEGER NOT NULL DEFAULT 0,
              cat_refinement INTEGER NOT NULL DEFAULT 0,
              cat_information INTEGER NOT NULL DEFAULT 0,
              cat_cognitive INTEGER NOT NULL DEFAULT 0,
              cat_other INTEGER NOT NULL DEFAULT 0,
              ip_address TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_ip ON sessions(ip_address);
            ",
        )
        .map_err(|e| StoreError(e.to_string()))?;
        conn.execute_batch(&format!("PRAGMA user_version={SQLITE_SCHEMA_VERSION};"))
            .map_err(|e| StoreError(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::open(Path::new(":memory:"))
    }
}

// Stored canonically in UTC with fixed millisecond width so lexicographic
// TEXT order equals chronological order.
fn encode_timestamp(value: Option<DateTime<Utc>>) -> Option<String> {
    value.map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn decode_timestamp(value: Option<String>) -> Result<Option<DateTime<Utc>>, StoreError> {
    match value {
        None => Ok(None),
        Some(raw) => DateTime::parse_from_rfc3339(&raw)
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(|e| StoreError(format!("stored timestamp {raw:?} unreadable: {e}"))),
    }
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<(SessionRecord, Option<String>, Option<String>)> {
    let record = SessionRecord {
        id: row.get(0)?,
        session_start: None,
        session_end: None,
        user_count: row.get(3)?,
        categories: CategoryCounts {
            idea_generation: row.get(4)?,
            refinement: row.get(5)?,
            information: row.get(6)?,
            cognitive: row.get(7)?,
            other: row.get(8)?,
        },
        ip_address: row.get(9)?,
    };
    Ok((record, row.get(1)?, row.get(2)?))
}

const SELECT_COLUMNS: &str = "id, session_start, session_end, user_count, \
     cat_idea_generation, cat_refinement, cat_information, cat_cognitive, cat_other, \
     ip_address";

fn collect_records(
    conn: &Connection,
    sql: &str,
    bind_ip: Option<&str>,
) -> Result<Vec<SessionRecord>, StoreError> {
    let mut stmt = conn.prepare(sql).map_err(|e| StoreError(e.to_string()))?;
    let rows = match bind_ip {
        Some(ip) => stmt.query_map(params![ip], row_to_record),
        None => stmt.query_map([], row_to_record),
    }
    .map_err(|e| StoreError(e.to_string()))?;

    let mut records = Vec::new();
    for row in rows {
        let (mut record, start_raw, end_raw) = row.map_err(|e| StoreError(e.to_string()))?;
        record.session_start = decode_timestamp(start_raw)?;
        record.session_end = decode_timestamp(end_raw)?;
        records.push(record);
    }
    Ok(records)
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn insert_session(&self, new: NewSession) -> Result<SessionRecord, StoreError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO sessions (
               session_start, session_end, user_count,
               cat_idea_generation, cat_refinement, cat_information, cat_cognitive, cat_other,
               ip_address
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                encode_timestamp(new.session_start),
                encode_timestamp(new.session_end),
                new.user_count,
                new.categories.idea_generation,
                new.categories.refinement,
                new.categories.information,
                new.categories.cognitive,
                new.categories.other,
                new.ip_address,
            ],
        )
        .map_err(|e| StoreError(e.to_string()))?;
        let id = conn.last_insert_rowid();
        Ok(SessionRecord::from_new(id, new))
    }

    async fn list_sessions(&self) -> Result<Vec<SessionRecord>, StoreError> {
        let conn = self.conn.lock().await;
        collect_records(
            &conn,
            &format!(
                "SELECT {SELECT_COLUMNS} FROM sessions ORDER BY session_start ASC, id ASC"
            ),
            None,
        )
    }

    async fn list_sessions_for_ip(&self, ip: &str) -> Result<Vec<SessionRecord>, StoreError> {
        let conn = self.conn.lock().await;
        collect_records(
            &conn,
            &format!(
                "SELECT {SELECT_COLUMNS} FROM sessions WHERE ip_address = ?1 \
                 ORDER BY session_start ASC, id ASC"
            ),
            Some(ip),
        )
    }
}
