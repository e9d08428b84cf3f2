//! SQLite-backed event store
//!
//! Self-hosted alternative to the HTTP event store, and the backend used
//! in tests. One `events` table; timestamps are stored as RFC 3339 text
//! (UTC), which sorts and compares correctly as strings.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};

use crate::attribution::AttributionRecord;
use crate::collector::{EventRecord, EventStore};
use crate::error::Result;
use crate::types::{Event, EventKind, Properties};

/// Event store backed by a local SQLite database.
pub struct SqliteEventStore {
    conn: Mutex<Connection>,
}

impl SqliteEventStore {
    /// Open or create a database at the given path
    pub fn open(path: &PathBuf) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // WAL mode for better concurrency
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    /// Run migrations on this database
    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        super::schema::run_migrations(&conn)
    }

    /// Insert one record
    pub fn insert(&self, record: &EventRecord) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let event = &record.event;
        conn.execute(
            r#"
            INSERT INTO events (
                event_type, user_id, session_id, ts,
                utm_source, utm_medium, utm_campaign, utm_content, utm_term,
                properties, user_agent, referrer
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                event.kind.as_str(),
                event.user_id,
                event.session_id,
                event.timestamp.to_rfc3339(),
                event.attribution.utm_source,
                event.attribution.utm_medium,
                event.attribution.utm_campaign,
                event.attribution.utm_content,
                event.attribution.utm_term,
                event
                    .properties
                    .as_ref()
                    .map(|p| serde_json::Value::Object(p.clone()).to_string()),
                record.user_agent,
                record.referrer,
            ],
        )?;
        Ok(())
    }

    /// Total number of stored events
    pub fn event_count(&self) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM events", [], |r| r.get(0))?;
        Ok(count)
    }

    fn query_events(&self, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<Event>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, Self::row_to_event)?;
        let mut events = Vec::new();
        for row in rows {
            events.push(row?);
        }
        Ok(events)
    }

    fn query_user_ids(
        &self,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<HashSet<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, |row| row.get::<_, String>(0))?;
        let mut ids = HashSet::new();
        for row in rows {
            ids.insert(row?);
        }
        Ok(ids)
    }

    fn row_to_event(row: &Row) -> rusqlite::Result<Event> {
        let kind_str: String = row.get("event_type")?;
        let kind: EventKind = kind_str.parse().map_err(|e: String| {
            rusqlite::Error::FromSqlConversionFailure(0, Type::Text, e.into())
        })?;

        let ts_str: String = row.get("ts")?;
        let properties_str: Option<String> = row.get("properties")?;

        Ok(Event {
            kind,
            user_id: row.get("user_id")?,
            session_id: row.get("session_id")?,
            timestamp: DateTime::parse_from_rfc3339(&ts_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
            attribution: AttributionRecord {
                utm_source: row.get("utm_source")?,
                utm_medium: row.get("utm_medium")?,
                utm_campaign: row.get("utm_campaign")?,
                utm_content: row.get("utm_content")?,
                utm_term: row.get("utm_term")?,
            },
            properties: properties_str.and_then(|s| serde_json::from_str::<Properties>(&s).ok()),
        })
    }
}

#[async_trait]
impl EventStore for SqliteEventStore {
    async fn append(&self, record: &EventRecord) -> Result<()> {
        self.insert(record)
    }

    async fn recent_events(&self, limit: usize) -> Result<Vec<Event>> {
        self.query_events(
            "SELECT * FROM events ORDER BY ts DESC, id DESC LIMIT ?1",
            &[&(limit as i64)],
        )
    }

    async fn events_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Event>> {
        self.query_events(
            "SELECT * FROM events WHERE ts >= ?1 AND ts < ?2 ORDER BY ts ASC, id ASC",
            &[&start.to_rfc3339(), &end.to_rfc3339()],
        )
    }

    async fn user_ids_with_kind(
        &self,
        kind: EventKind,
        since: Option<DateTime<Utc>>,
    ) -> Result<HashSet<String>> {
        match since {
            Some(since) => self.query_user_ids(
                "SELECT DISTINCT user_id FROM events WHERE event_type = ?1 AND ts >= ?2",
                &[&kind.as_str(), &since.to_rfc3339()],
            ),
            None => self.query_user_ids(
                "SELECT DISTINCT user_id FROM events WHERE event_type = ?1",
                &[&kind.as_str()],
            ),
        }
    }

    async fn user_ids_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<HashSet<String>> {
        self.query_user_ids(
            "SELECT DISTINCT user_id FROM events WHERE ts >= ?1 AND ts < ?2",
            &[&start.to_rfc3339(), &end.to_rfc3339()],
        )
    }
}
