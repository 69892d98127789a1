//! SQLite-based store implementation

use chrono::{DateTime, Local};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, warn};

use crate::{AlarmRecord, AuditEvent, AuditEventType, Store, StoreError, StoreResult};

const DEFAULT_SNOOZE_KEY: &str = "default_snooze_secs";

/// SQLite-based store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            r#"
            -- Audit log (append-only)
            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                event_json TEXT NOT NULL
            );

            -- Alarm list (single row, replaced on every save)
            CREATE TABLE IF NOT EXISTS alarms (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                saved_at TEXT NOT NULL,
                alarms_json TEXT NOT NULL
            );

            -- Key/value settings
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_log(timestamp);
            "#,
        )?;

        debug!("Store schema initialized");
        Ok(())
    }
}

impl Store for SqliteStore {
    fn append_audit(&self, mut event: AuditEvent) -> StoreResult<()> {
        let conn = self.lock()?;
        let event_json = serde_json::to_string(&event.event)?;

        conn.execute(
            "INSERT INTO audit_log (timestamp, event_json) VALUES (?, ?)",
            params![event.timestamp.to_rfc3339(), event_json],
        )?;

        event.id = conn.last_insert_rowid();
        debug!(event_id = event.id, "Audit event appended");

        Ok(())
    }

    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT id, timestamp, event_json FROM audit_log ORDER BY id DESC LIMIT ?",
        )?;

        let rows = stmt.query_map([limit as i64], |row| {
            let id: i64 = row.get(0)?;
            let timestamp_str: String = row.get(1)?;
            let event_json: String = row.get(2)?;
            Ok((id, timestamp_str, event_json))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (id, timestamp_str, event_json) = row?;
            let timestamp = DateTime::parse_from_rfc3339(&timestamp_str)
                .map(|dt| dt.with_timezone(&Local))
                .unwrap_or_else(|_| klaxon_util::now());
            let event: AuditEventType = serde_json::from_str(&event_json)?;

            events.push(AuditEvent {
                id,
                timestamp,
                event,
            });
        }

        Ok(events)
    }

    fn load_alarms(&self) -> StoreResult<Option<Vec<AlarmRecord>>> {
        let conn = self.lock()?;

        let json: Option<String> = conn
            .query_row("SELECT alarms_json FROM alarms WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()?;

        match json {
            Some(s) => {
                let alarms: Vec<AlarmRecord> = serde_json::from_str(&s)?;
                debug!(count = alarms.len(), "Alarms loaded");
                Ok(Some(alarms))
            }
            None => Ok(None),
        }
    }

    fn save_alarms(&self, alarms: &[AlarmRecord]) -> StoreResult<()> {
        let conn = self.lock()?;
        let json = serde_json::to_string(alarms)?;

        conn.execute(
            r#"
            INSERT INTO alarms (id, saved_at, alarms_json)
            VALUES (1, ?, ?)
            ON CONFLICT(id)
            DO UPDATE SET saved_at = excluded.saved_at, alarms_json = excluded.alarms_json
            "#,
            params![klaxon_util::now().to_rfc3339(), json],
        )?;

        debug!(count = alarms.len(), "Alarms saved");
        Ok(())
    }

    fn get_default_snooze(&self) -> StoreResult<Option<Duration>> {
        let conn = self.lock()?;

        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?",
                [DEFAULT_SNOOZE_KEY],
                |row| row.get(0),
            )
            .optional()?;

        match value {
            Some(s) => match s.parse::<u64>() {
                Ok(secs) => Ok(Some(Duration::from_secs(secs))),
                Err(_) => {
                    warn!(value = %s, "Ignoring malformed default snooze setting");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    fn set_default_snooze(&self, duration: Duration) -> StoreResult<()> {
        let conn = self.lock()?;

        conn.execute(
            r#"
            INSERT INTO settings (key, value)
            VALUES (?, ?)
            ON CONFLICT(key)
            DO UPDATE SET value = excluded.value
            "#,
            params![DEFAULT_SNOOZE_KEY, duration.as_secs().to_string()],
        )?;

        debug!(secs = duration.as_secs(), "Default snooze saved");
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        match self.conn.lock() {
            Ok(conn) => conn.query_row("SELECT 1", [], |_| Ok(())).is_ok(),
            Err(_) => {
                warn!("Store lock poisoned");
                false
            }
        }
    }
}
