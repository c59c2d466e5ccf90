//! Canonical event log (§3 "CanonicalEvent", §4.13).
//!
//! Every control request, control response, user turn, assistant reply,
//! memory injection, transport transition, and error is written twice: once
//! as a line in an append-only, never-rewritten `<metaSessionId>.jsonl` file
//! (retention is the operator's problem, not ours), and once as a row in an
//! indexed sqlite store that supports "recent events for this session"
//! queries without re-reading the whole file. The two writes happen together
//! in [`CanonicalLog::append`] so they can't drift apart.
//!
//! rusqlite is not part of the gateway's inherited dependency stack; it's
//! pulled in here the same way `mohsenil85-imbolc-workspace` uses it for its
//! own persistence layer (see DESIGN.md).

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use uag_domain::error::{Error, Result};
use uag_domain::trace::TraceEvent;
use uag_protocol::Provider;

pub const CANONICAL_SCHEMA_VERSION: u32 = 1;

/// Closed set of canonical event kinds (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalEventType {
    MetaSessionCreated,
    MetaSessionResumed,
    ProviderSwitched,
    ModelSwitched,
    UserMessage,
    AssistantMessage,
    MemoryInjected,
    Error,
    TransportState,
    ControlRequest,
    ControlResponse,
    PermissionCancelled,
}

impl CanonicalEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MetaSessionCreated => "meta_session_created",
            Self::MetaSessionResumed => "meta_session_resumed",
            Self::ProviderSwitched => "provider_switched",
            Self::ModelSwitched => "model_switched",
            Self::UserMessage => "user_message",
            Self::AssistantMessage => "assistant_message",
            Self::MemoryInjected => "memory_injected",
            Self::Error => "error",
            Self::TransportState => "transport_state",
            Self::ControlRequest => "control_request",
            Self::ControlResponse => "control_response",
            Self::PermissionCancelled => "permission_cancelled",
        }
    }
}

/// An immutable, timestamped record (§3). Once appended it is never edited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalEvent {
    pub schema_version: u32,
    pub timestamp: DateTime<Utc>,
    pub meta_session_id: String,
    pub project: String,
    pub cwd: String,
    pub provider: Provider,
    #[serde(rename = "type")]
    pub event_type: CanonicalEventType,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl CanonicalEvent {
    pub fn new(
        meta_session_id: impl Into<String>,
        project: impl Into<String>,
        cwd: impl Into<String>,
        provider: Provider,
        event_type: CanonicalEventType,
        text: impl Into<String>,
    ) -> Self {
        Self {
            schema_version: CANONICAL_SCHEMA_VERSION,
            timestamp: Utc::now(),
            meta_session_id: meta_session_id.into(),
            project: project.into(),
            cwd: cwd.into(),
            provider,
            event_type,
            text: text.into(),
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// Snapshot of a `meta_sessions` row (§4.13: "additionally owns meta_sessions").
#[derive(Debug, Clone)]
pub struct MetaSessionRow {
    pub meta_session_id: String,
    pub project: String,
    pub cwd: String,
    pub active_provider: Provider,
    pub active_model: Option<String>,
    pub brain_url: Option<String>,
    pub gateway_session_id: String,
    pub provider_session_id: Option<String>,
}

/// Additive-only migrations, applied in order against `PRAGMA user_version`.
/// A migration must never drop or rename a column (§4.13 "additive column
/// migration").
const MIGRATIONS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS events (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        meta_session_id TEXT NOT NULL,
        created_at_epoch INTEGER NOT NULL,
        event_type TEXT NOT NULL,
        project TEXT NOT NULL,
        cwd TEXT NOT NULL,
        provider TEXT NOT NULL,
        text TEXT NOT NULL,
        payload TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_events_session_time
        ON events (meta_session_id, created_at_epoch DESC);
    CREATE TABLE IF NOT EXISTS meta_sessions (
        meta_session_id TEXT PRIMARY KEY,
        project TEXT NOT NULL,
        cwd TEXT NOT NULL,
        active_provider TEXT NOT NULL,
        active_model TEXT,
        brain_url TEXT,
        gateway_session_id TEXT NOT NULL,
        provider_session_id TEXT
    );",
];

fn migrate(conn: &Connection) -> Result<()> {
    let current: u32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    for (idx, migration) in MIGRATIONS.iter().enumerate() {
        let version = (idx + 1) as u32;
        if version <= current {
            continue;
        }
        conn.execute_batch(migration)?;
        conn.pragma_update(None, "user_version", version)?;
    }
    Ok(())
}

/// Owns both halves of the canonical event log: the per-session JSONL files
/// and the indexed sqlite store.
pub struct CanonicalLog {
    sessions_dir: PathBuf,
    conn: Mutex<Connection>,
}

impl CanonicalLog {
    pub fn open(sessions_dir: impl Into<PathBuf>, db_path: impl AsRef<Path>) -> Result<Self> {
        let sessions_dir = sessions_dir.into();
        std::fs::create_dir_all(&sessions_dir)?;
        if let Some(parent) = db_path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;
        migrate(&conn)?;
        Ok(Self {
            sessions_dir,
            conn: Mutex::new(conn),
        })
    }

    fn jsonl_path(&self, meta_session_id: &str) -> PathBuf {
        self.sessions_dir.join(format!("{meta_session_id}.jsonl"))
    }

    /// Append one event to the session's JSONL file and to the indexed
    /// store. Per-session appends are serialized by the router (§5), so this
    /// does not need its own per-session lock beyond the connection mutex.
    pub fn append(&self, event: &CanonicalEvent) -> Result<()> {
        let line = serde_json::to_string(event).map_err(Error::Json)?;
        let path = self.jsonl_path(&event.meta_session_id);
        let mut file = std::fs::OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(file, "{line}")?;

        let payload_json = match &event.payload {
            Some(v) => Some(serde_json::to_string(v).map_err(Error::Json)?),
            None => None,
        };
        let conn = self.conn.lock().expect("canonical log connection poisoned");
        conn.execute(
            "INSERT INTO events (meta_session_id, created_at_epoch, event_type, project, cwd, provider, text, payload)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                event.meta_session_id,
                event.timestamp.timestamp(),
                event.event_type.as_str(),
                event.project,
                event.cwd,
                event.provider.to_string(),
                event.text,
                payload_json,
            ],
        )?;

        TraceEvent::CanonicalAppend {
            meta_session_id: event.meta_session_id.clone(),
            event_type: event.event_type.as_str().to_string(),
        }
        .emit();
        Ok(())
    }

    /// Most recent `limit` events for a session, newest first.
    pub fn recent_events(&self, meta_session_id: &str, limit: usize) -> Result<Vec<(i64, String, String)>> {
        let conn = self.conn.lock().expect("canonical log connection poisoned");
        let mut stmt = conn.prepare(
            "SELECT created_at_epoch, event_type, text FROM events
             WHERE meta_session_id = ?1
             ORDER BY created_at_epoch DESC
             LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![meta_session_id, limit as i64], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Insert or update the `meta_sessions` row for `row.meta_session_id`.
    pub fn upsert_meta_session(&self, row: &MetaSessionRow) -> Result<()> {
        let conn = self.conn.lock().expect("canonical log connection poisoned");
        conn.execute(
            "INSERT INTO meta_sessions (meta_session_id, project, cwd, active_provider, active_model, brain_url, gateway_session_id, provider_session_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(meta_session_id) DO UPDATE SET
                project = excluded.project,
                cwd = excluded.cwd,
                active_provider = excluded.active_provider,
                active_model = excluded.active_model,
                brain_url = excluded.brain_url,
                gateway_session_id = excluded.gateway_session_id,
                provider_session_id = excluded.provider_session_id",
            params![
                row.meta_session_id,
                row.project,
                row.cwd,
                row.active_provider.to_string(),
                row.active_model,
                row.brain_url,
                row.gateway_session_id,
                row.provider_session_id,
            ],
        )?;
        Ok(())
    }

    pub fn meta_session(&self, meta_session_id: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().expect("canonical log connection poisoned");
        let found: Option<String> = conn
            .query_row(
                "SELECT meta_session_id FROM meta_sessions WHERE meta_session_id = ?1",
                params![meta_session_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found)
    }
}

/// Offline replay report (§4.13 "Replay tool", §8 scenario 6).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ReplayReport {
    pub total_events: usize,
    pub by_type: HashMap<String, usize>,
    pub deterministic_order: bool,
    pub warnings: Vec<String>,
}

/// Reads a session's JSONL file front to back and reports on its shape.
/// Determinism here means non-decreasing timestamps and matching
/// `control_request`/`control_response` counts (§8 scenario 6).
pub fn replay(path: impl AsRef<Path>) -> Result<ReplayReport> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(ReplayReport::default());
    }
    let raw = std::fs::read_to_string(path)?;

    let mut by_type: HashMap<String, usize> = HashMap::new();
    let mut warnings = Vec::new();
    let mut deterministic_order = true;
    let mut last_ts: Option<DateTime<Utc>> = None;
    let mut total_events = 0usize;

    for (line_no, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let event: CanonicalEvent = match serde_json::from_str(line) {
            Ok(e) => e,
            Err(e) => {
                warnings.push(format!("line {}: failed to parse: {e}", line_no + 1));
                continue;
            }
        };
        total_events += 1;
        *by_type.entry(event.event_type.as_str().to_string()).or_insert(0) += 1;

        if let Some(prev) = last_ts {
            if event.timestamp < prev {
                deterministic_order = false;
                warnings.push(format!("line {}: timestamp out of order", line_no + 1));
            }
        }
        last_ts = Some(event.timestamp);
    }

    let requests = *by_type.get(CanonicalEventType::ControlRequest.as_str()).unwrap_or(&0);
    let responses = *by_type.get(CanonicalEventType::ControlResponse.as_str()).unwrap_or(&0);
    if requests != responses {
        deterministic_order = false;
        warnings.push(format!(
            "control_request count ({requests}) does not match control_response count ({responses})"
        ));
    }

    Ok(ReplayReport {
        total_events,
        by_type,
        deterministic_order,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event(meta_session_id: &str, event_type: CanonicalEventType, text: &str) -> CanonicalEvent {
        CanonicalEvent::new(meta_session_id, "proj", "/tmp/proj", Provider::Mock, event_type, text)
    }

    #[test]
    fn append_writes_jsonl_and_indexed_row() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = CanonicalLog::open(dir.path().join("sessions"), dir.path().join("sessions.db")).expect("open");

        let event = sample_event("m1", CanonicalEventType::UserMessage, "hello");
        log.append(&event).expect("append");

        let jsonl = std::fs::read_to_string(dir.path().join("sessions").join("m1.jsonl")).expect("read jsonl");
        assert_eq!(jsonl.lines().count(), 1);

        let recent = log.recent_events("m1", 10).expect("recent");
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].2, "hello");
    }

    #[test]
    fn recent_events_are_newest_first() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = CanonicalLog::open(dir.path().join("sessions"), dir.path().join("sessions.db")).expect("open");

        let mut first = sample_event("m1", CanonicalEventType::ControlRequest, "first");
        first.timestamp = Utc::now() - chrono::Duration::seconds(10);
        log.append(&first).expect("append");

        let second = sample_event("m1", CanonicalEventType::ControlResponse, "second");
        log.append(&second).expect("append");

        let recent = log.recent_events("m1", 10).expect("recent");
        assert_eq!(recent[0].2, "second");
        assert_eq!(recent[1].2, "first");
    }

    #[test]
    fn meta_session_upsert_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = CanonicalLog::open(dir.path().join("sessions"), dir.path().join("sessions.db")).expect("open");

        let mut row = MetaSessionRow {
            meta_session_id: "m1".into(),
            project: "proj".into(),
            cwd: "/tmp/proj".into(),
            active_provider: Provider::Claude,
            active_model: Some("claude-opus".into()),
            brain_url: None,
            gateway_session_id: "g1".into(),
            provider_session_id: None,
        };
        log.upsert_meta_session(&row).expect("insert");
        row.active_model = Some("claude-sonnet".into());
        log.upsert_meta_session(&row).expect("update");

        assert_eq!(log.meta_session("m1").expect("query"), Some("m1".to_string()));
    }

    #[test]
    fn replay_reports_deterministic_order_and_counts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("m1.jsonl");

        let mut request = sample_event("m1", CanonicalEventType::ControlRequest, "req");
        request.timestamp = DateTime::from_timestamp(1, 0).unwrap();
        let mut response = sample_event("m1", CanonicalEventType::ControlResponse, "resp");
        response.timestamp = DateTime::from_timestamp(2, 0).unwrap();

        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "{}", serde_json::to_string(&request).unwrap()).unwrap();
        writeln!(file, "{}", serde_json::to_string(&response).unwrap()).unwrap();

        let report = replay(&path).expect("replay");
        assert_eq!(report.total_events, 2);
        assert_eq!(report.by_type.get("control_request"), Some(&1));
        assert_eq!(report.by_type.get("control_response"), Some(&1));
        assert!(report.deterministic_order);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn replay_flags_mismatched_request_response_counts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("m1.jsonl");

        let request = sample_event("m1", CanonicalEventType::ControlRequest, "req");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "{}", serde_json::to_string(&request).unwrap()).unwrap();

        let report = replay(&path).expect("replay");
        assert!(!report.deterministic_order);
        assert!(!report.warnings.is_empty());
    }

    #[test]
    fn missing_file_replays_empty() {
        let report = replay("/nonexistent/path.jsonl").expect("replay");
        assert_eq!(report.total_events, 0);
    }
}
