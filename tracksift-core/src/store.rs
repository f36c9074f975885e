use crate::error::{CoreError, Result};
use crate::event::{ElementInfo, EventType, InteractionEvent};
use crate::session::{ClosedSession, Session};
use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, OptionalExtension, params};
use std::fs;
use std::path::Path;
use tracksift_capture::NetworkEvent;

/// SQLite store of captured sessions and their events.
pub struct CaptureStore {
    conn: Connection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Running,
    Completed,
    Partial,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Running => "running",
            SessionStatus::Completed => "completed",
            SessionStatus::Partial => "partial",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "running" => Some(SessionStatus::Running),
            "completed" => Some(SessionStatus::Completed),
            "partial" => Some(SessionStatus::Partial),
            _ => None,
        }
    }
}

impl ToSql for EventType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for EventType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        EventType::from_str(value.as_str()?).ok_or(FromSqlError::InvalidType)
    }
}

impl FromSql for SessionStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        SessionStatus::from_str(value.as_str()?).ok_or(FromSqlError::InvalidType)
    }
}

fn to_millis(timestamp: DateTime<Utc>) -> i64 {
    timestamp.timestamp_millis()
}

fn from_millis(idx: usize, millis: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, millis))
}

impl CaptureStore {
    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    pub fn remove(path: &Path) -> Result<()> {
        fs::remove_file(path)?;
        Ok(())
    }

    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            PRAGMA foreign_keys = ON;
            ",
        )?;

        let store = CaptureStore { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    start_url TEXT NOT NULL,
    start_time INTEGER NOT NULL,   -- unix millis
    end_time INTEGER,
    status TEXT NOT NULL CHECK(status IN ('running', 'completed', 'partial'))
);

CREATE INDEX IF NOT EXISTS idx_sessions_start ON sessions(start_time);
CREATE INDEX IF NOT EXISTS idx_sessions_url ON sessions(start_url);

CREATE TABLE IF NOT EXISTS interaction_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    url TEXT,
    event_type TEXT NOT NULL CHECK(event_type IN (
        'page_visit',
        'mouse_move',
        'mouse_move_to_element',
        'click',
        'attempt_cookie_banner_dismiss',
        'cookie_banner_dismissed',
        'skip_interaction',
        'error'
    )),
    pos_x REAL,
    pos_y REAL,
    element_state TEXT CHECK(element_state IN ('present', 'unavailable')),
    element_tag TEXT,
    element_text TEXT,
    details TEXT,

    FOREIGN KEY(session_id) REFERENCES sessions(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_interactions_session ON interaction_events(session_id);

CREATE TABLE IF NOT EXISTS network_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    capture_timestamp INTEGER NOT NULL,
    page_url TEXT NOT NULL,
    associated_action TEXT NOT NULL,
    request_method TEXT NOT NULL,
    request_url TEXT NOT NULL,
    response_status INTEGER NOT NULL,
    response_reason TEXT NOT NULL,
    request_referer TEXT NOT NULL,
    response_content_type TEXT NOT NULL,
    request_body_snippet TEXT NOT NULL,

    FOREIGN KEY(session_id) REFERENCES sessions(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_network_session ON network_events(session_id);
            ",
        )?;
        Ok(())
    }

    // Session management
    pub fn create_session(&self, session: &Session) -> Result<()> {
        insert_session(&self.conn, session)
    }

    pub fn close_session(&self, session_id: &str, ended_at: DateTime<Utc>, partial: bool) -> Result<()> {
        update_session_end(&self.conn, session_id, ended_at, partial)
    }

    pub fn session_status(&self, session_id: &str) -> Result<Option<SessionStatus>> {
        let status = self
            .conn
            .query_row(
                "SELECT status FROM sessions WHERE id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(status)
    }

    pub fn session_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    // Event operations
    pub fn insert_interaction(&self, session_id: &str, event: &InteractionEvent) -> Result<i64> {
        insert_interaction(&self.conn, session_id, event)
    }

    pub fn insert_network_event(&self, session_id: &str, event: &NetworkEvent) -> Result<i64> {
        insert_network_event(&self.conn, session_id, event)
    }

    /// Persist a closed session and all of its events in one transaction.
    pub fn save_closed_session(&mut self, closed: &ClosedSession) -> Result<()> {
        let tx = self.conn.transaction()?;
        insert_session(&tx, &closed.session)?;
        for event in &closed.interactions {
            insert_interaction(&tx, &closed.session.session_id, event)?;
        }
        for event in &closed.network_events {
            insert_network_event(&tx, &closed.session.session_id, event)?;
        }
        update_session_end(&tx, &closed.session.session_id, closed.ended_at, closed.partial)?;
        tx.commit()?;
        Ok(())
    }

    /// All sessions ordered by start time. Sessions never closed come back
    /// flagged partial.
    pub fn load_closed_sessions(&self) -> Result<Vec<ClosedSession>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, start_url, start_time, end_time, status FROM sessions ORDER BY start_time, id",
        )?;
        let headers = stmt
            .query_map([], |row| {
                let start_time: i64 = row.get(2)?;
                let end_time: Option<i64> = row.get(3)?;
                Ok((
                    Session {
                        session_id: row.get(0)?,
                        session_start_url: row.get(1)?,
                        started_at: from_millis(2, start_time)?,
                    },
                    end_time.map(|t| from_millis(3, t)).transpose()?,
                    row.get::<_, SessionStatus>(4)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut sessions = Vec::with_capacity(headers.len());
        for (session, ended_at, status) in headers {
            let interactions = self.interactions_for(&session.session_id)?;
            let network_events = self.network_events_for(&session.session_id)?;
            let ended_at = ended_at
                .or_else(|| interactions.iter().map(|e| e.timestamp).max())
                .unwrap_or(session.started_at);
            sessions.push(ClosedSession {
                session,
                ended_at,
                interactions,
                network_events,
                partial: status != SessionStatus::Completed,
            });
        }
        Ok(sessions)
    }

    pub fn interactions_for(&self, session_id: &str) -> Result<Vec<InteractionEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT timestamp, event_type, url, pos_x, pos_y, element_state, element_tag, element_text, details
             FROM interaction_events WHERE session_id = ?1 ORDER BY id",
        )?;
        let events = stmt
            .query_map(params![session_id], |row| {
                let element_state: Option<String> = row.get(5)?;
                let element = match element_state.as_deref() {
                    Some("present") => Some(ElementInfo::Present {
                        tag: row.get(6)?,
                        text: row.get(7)?,
                    }),
                    Some(_) => Some(ElementInfo::Unavailable),
                    None => None,
                };
                Ok(InteractionEvent {
                    timestamp: from_millis(0, row.get(0)?)?,
                    event_type: row.get(1)?,
                    url: row.get(2)?,
                    pos_x: row.get(3)?,
                    pos_y: row.get(4)?,
                    element,
                    details: row.get(8)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(events)
    }

    pub fn network_events_for(&self, session_id: &str) -> Result<Vec<NetworkEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT capture_timestamp, page_url, associated_action, request_method, request_url,
                    response_status, response_reason, request_referer, response_content_type,
                    request_body_snippet
             FROM network_events WHERE session_id = ?1 ORDER BY id",
        )?;
        let events = stmt
            .query_map(params![session_id], |row| {
                Ok(NetworkEvent {
                    capture_timestamp: from_millis(0, row.get(0)?)?,
                    page_url: row.get(1)?,
                    associated_action: row.get(2)?,
                    request_method: row.get(3)?,
                    request_url: row.get(4)?,
                    response_status: row.get(5)?,
                    response_reason: row.get(6)?,
                    request_referer: row.get(7)?,
                    response_content_type: row.get(8)?,
                    request_body_snippet: row.get(9)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(events)
    }
}

fn insert_session(conn: &Connection, session: &Session) -> Result<()> {
    conn.execute(
        "INSERT INTO sessions (id, start_url, start_time, status) VALUES (?1, ?2, ?3, ?4)",
        params![
            &session.session_id,
            &session.session_start_url,
            to_millis(session.started_at),
            SessionStatus::Running.as_str(),
        ],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            CoreError::Schema(format!("session '{}' already stored", session.session_id))
        }
        other => other.into(),
    })?;
    Ok(())
}

fn update_session_end(
    conn: &Connection,
    session_id: &str,
    ended_at: DateTime<Utc>,
    partial: bool,
) -> Result<()> {
    let status = if partial {
        SessionStatus::Partial
    } else {
        SessionStatus::Completed
    };
    let updated = conn.execute(
        "UPDATE sessions SET status = ?1, end_time = ?2 WHERE id = ?3",
        params![status.as_str(), to_millis(ended_at), session_id],
    )?;
    if updated == 0 {
        return Err(CoreError::Schema(format!("unknown session '{}'", session_id)));
    }
    Ok(())
}

fn insert_interaction(conn: &Connection, session_id: &str, event: &InteractionEvent) -> Result<i64> {
    let (element_state, element_tag, element_text) = match &event.element {
        Some(ElementInfo::Present { tag, text }) => (Some("present"), Some(tag.as_str()), text.as_deref()),
        Some(ElementInfo::Unavailable) => (Some("unavailable"), None, None),
        None => (None, None, None),
    };

    conn.execute(
        "INSERT INTO interaction_events (
            session_id, timestamp, url, event_type, pos_x, pos_y,
            element_state, element_tag, element_text, details
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            session_id,
            to_millis(event.timestamp),
            &event.url,
            event.event_type,
            event.pos_x,
            event.pos_y,
            element_state,
            element_tag,
            element_text,
            &event.details,
        ],
    )?;

    Ok(conn.last_insert_rowid())
}

fn insert_network_event(conn: &Connection, session_id: &str, event: &NetworkEvent) -> Result<i64> {
    conn.execute(
        "INSERT INTO network_events (
            session_id, capture_timestamp, page_url, associated_action, request_method,
            request_url, response_status, response_reason, request_referer,
            response_content_type, request_body_snippet
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            session_id,
            to_millis(event.capture_timestamp),
            &event.page_url,
            &event.associated_action,
            &event.request_method,
            &event.request_url,
            event.response_status,
            &event.response_reason,
            &event.request_referer,
            &event.response_content_type,
            &event.request_body_snippet,
        ],
    )?;

    Ok(conn.last_insert_rowid())
}
