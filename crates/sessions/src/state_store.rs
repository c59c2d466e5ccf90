//! Durable snapshot of the session registry (§4.12).
//!
//! Write-temp-then-rename is mandatory: a partial write must never leave a
//! truncated `gateway-state.json` in place. A corrupt file on load is
//! quarantined (renamed aside), never deleted, so the operator can inspect
//! what went wrong.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uag_domain::error::{Error, Result};
use uag_domain::trace::TraceEvent;

use crate::session::GatewaySessionState;

const STATE_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StateSnapshot {
    version: u32,
    saved_at_epoch: i64,
    sessions: Vec<serde_json::Value>,
}

/// Loads and saves the session registry to a single JSON file.
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Atomically persist `sessions` (write to a sibling temp file, then
    /// rename over the target).
    pub fn save(&self, sessions: &[GatewaySessionState], now_epoch: i64) -> Result<()> {
        let snapshot = StateSnapshot {
            version: STATE_SCHEMA_VERSION,
            saved_at_epoch: now_epoch,
            sessions: sessions
                .iter()
                .map(|s| serde_json::to_value(s).map_err(Error::Json))
                .collect::<Result<Vec<_>>>()?,
        };
        let json = serde_json::to_string_pretty(&snapshot).map_err(Error::Json)?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &self.path)?;

        TraceEvent::StateSaved {
            sessions: sessions.len(),
            path: self.path.display().to_string(),
        }
        .emit();
        Ok(())
    }

    /// Load the registry. A missing file yields an empty vector. A corrupt
    /// file is quarantined alongside itself and also yields empty, rather
    /// than failing startup. Individual session entries with an
    /// unrecognized `provider` are skipped, not fatal to the whole load.
    pub fn load(&self, now_epoch: i64) -> Result<Vec<GatewaySessionState>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let raw = std::fs::read_to_string(&self.path)?;
        let snapshot: StateSnapshot = match serde_json::from_str(&raw) {
            Ok(s) => s,
            Err(_) => {
                let quarantined = self.path.with_extension(format!("json.corrupt.{now_epoch}"));
                std::fs::rename(&self.path, &quarantined)?;
                TraceEvent::StateLoadCorrupt {
                    path: self.path.display().to_string(),
                    quarantined_to: quarantined.display().to_string(),
                }
                .emit();
                return Ok(Vec::new());
            }
        };

        let mut sessions = Vec::with_capacity(snapshot.sessions.len());
        for value in snapshot.sessions {
            match serde_json::from_value::<GatewaySessionState>(value) {
                Ok(mut state) => {
                    state.connected = false;
                    sessions.push(state);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "skipping session with unrecognized shape on state load");
                }
            }
        }
        Ok(sessions)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uag_protocol::Provider;

    #[test]
    fn round_trips_sessions_except_connected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = StateStore::new(dir.path().join("gateway-state.json"));

        let mut state = GatewaySessionState::new("s1", Provider::Claude, 100);
        state.model = Some("claude-opus".into());
        state.connected = true;
        store.save(&[state.clone()], 200).expect("save");

        let loaded = store.load(300).expect("load");
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].session_id, "s1");
        assert_eq!(loaded[0].model.as_deref(), Some("claude-opus"));
        assert!(!loaded[0].connected, "connected must be forced false on load");
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = StateStore::new(dir.path().join("gateway-state.json"));
        assert!(store.load(0).expect("load").is_empty());
    }

    #[test]
    fn corrupt_file_is_quarantined_not_deleted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("gateway-state.json");
        std::fs::write(&path, b"not json at all").unwrap();
        let store = StateStore::new(&path);

        let loaded = store.load(999).expect("load should not error");
        assert!(loaded.is_empty());
        assert!(!path.exists());
        let quarantined = dir.path().join("gateway-state.json.corrupt.999");
        assert!(quarantined.exists());
    }

    #[test]
    fn session_with_unrecognized_provider_is_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = StateStore::new(dir.path().join("gateway-state.json"));

        let good = GatewaySessionState::new("good", Provider::Mock, 0);
        let snapshot = StateSnapshot {
            version: STATE_SCHEMA_VERSION,
            saved_at_epoch: 0,
            sessions: vec![
                serde_json::to_value(&good).unwrap(),
                serde_json::json!({"session_id": "bad", "provider": "not-a-real-provider"}),
            ],
        };
        std::fs::write(store.path(), serde_json::to_string(&snapshot).unwrap()).unwrap();

        let loaded = store.load(0).expect("load");
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].session_id, "good");
    }
}
