//! Environment variable profiles (§6): named bundles of `KEY=VALUE` pairs
//! an operator can apply to a live session in one call, persisted under
//! `env-profiles.json` (write-temp-then-rename, same as [`uag_sessions::StateStore`]).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use axum::extract::{Path as AxumPath, State};
use axum::http::StatusCode;
use axum::Json;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uag_domain::error::{Error, Result};

use crate::state::AppState;

const PROFILES_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Default, Serialize, Deserialize)]
struct ProfilesFile {
    version: u32,
    profiles: HashMap<String, HashMap<String, String>>,
}

/// Durable store of named env-var profiles, one JSON file for the whole set.
pub struct EnvProfileStore {
    path: PathBuf,
    profiles: RwLock<HashMap<String, HashMap<String, String>>>,
}

impl EnvProfileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let profiles = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str::<ProfilesFile>(&raw).map(|f| f.profiles).unwrap_or_default()
        } else {
            HashMap::new()
        };
        Ok(Self {
            path,
            profiles: RwLock::new(profiles),
        })
    }

    pub fn list(&self) -> HashMap<String, HashMap<String, String>> {
        self.profiles.read().clone()
    }

    pub fn get(&self, name: &str) -> Option<HashMap<String, String>> {
        self.profiles.read().get(name).cloned()
    }

    pub fn put(&self, name: &str, variables: HashMap<String, String>) -> Result<()> {
        self.profiles.write().insert(name.to_owned(), variables);
        self.persist()
    }

    pub fn delete(&self, name: &str) -> Result<bool> {
        let removed = self.profiles.write().remove(name).is_some();
        if removed {
            self.persist()?;
        }
        Ok(removed)
    }

    fn persist(&self) -> Result<()> {
        let file = ProfilesFile {
            version: PROFILES_SCHEMA_VERSION,
            profiles: self.profiles.read().clone(),
        };
        let json = serde_json::to_string_pretty(&file).map_err(Error::Json)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

// ── HTTP handlers ──────────────────────────────────────────────────────

pub async fn list_profiles(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "profiles": state.env_profiles.list() }))
}

/// Body is either a bare `{KEY: VALUE, ...}` map or `{"variables": {...}}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PutProfileBody {
    Wrapped { variables: HashMap<String, String> },
    Bare(HashMap<String, String>),
}

impl PutProfileBody {
    fn into_variables(self) -> HashMap<String, String> {
        match self {
            PutProfileBody::Wrapped { variables } => variables,
            PutProfileBody::Bare(variables) => variables,
        }
    }
}

pub async fn put_profile(
    State(state): State<AppState>,
    AxumPath(name): AxumPath<String>,
    Json(body): Json<PutProfileBody>,
) -> Result<StatusCode, (StatusCode, Json<serde_json::Value>)> {
    state
        .env_profiles
        .put(&name, body.into_variables())
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(internal_error)
}

pub async fn delete_profile(
    State(state): State<AppState>,
    AxumPath(name): AxumPath<String>,
) -> Result<StatusCode, (StatusCode, Json<serde_json::Value>)> {
    match state.env_profiles.delete(&name) {
        Ok(true) => Ok(StatusCode::NO_CONTENT),
        Ok(false) => Ok(StatusCode::NOT_FOUND),
        Err(e) => Err(internal_error(e)),
    }
}

/// `POST /env/session/{sessionId}/profile/{name}` — applies the named
/// profile to a live session and returns `{applied: count}` (§6).
pub async fn apply_profile_to_session(
    State(state): State<AppState>,
    AxumPath((session_id, name)): AxumPath<(String, String)>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    let Some(variables) = state.env_profiles.get(&name) else {
        return Err((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("no such env profile: {name}") })),
        ));
    };
    let applied = variables.len();

    let envelopes = state.router.apply_env_vars(&session_id, variables).await;
    for envelope in envelopes {
        state.peer_hub.broadcast(&session_id, envelope);
    }

    Ok(Json(serde_json::json!({ "applied": applied })))
}

fn internal_error(e: Error) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": e.to_string() })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_opens_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = EnvProfileStore::open(dir.path().join("env-profiles.json")).expect("open");
        assert!(store.list().is_empty());
    }

    #[test]
    fn put_persists_and_round_trips_through_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("env-profiles.json");
        let store = EnvProfileStore::open(&path).expect("open");

        let mut vars = HashMap::new();
        vars.insert("ANTHROPIC_API_KEY".to_owned(), "sk-test".to_owned());
        store.put("staging", vars.clone()).expect("put");

        let reopened = EnvProfileStore::open(&path).expect("reopen");
        assert_eq!(reopened.get("staging"), Some(vars));
    }

    #[test]
    fn delete_reports_whether_a_profile_existed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = EnvProfileStore::open(dir.path().join("env-profiles.json")).expect("open");
        store.put("p", HashMap::new()).expect("put");

        assert!(store.delete("p").expect("delete"));
        assert!(!store.delete("p").expect("delete again"));
    }

    #[test]
    fn put_body_accepts_bare_map() {
        let body: PutProfileBody = serde_json::from_str(r#"{"FOO":"bar"}"#).expect("parse");
        let vars = body.into_variables();
        assert_eq!(vars.get("FOO").map(String::as_str), Some("bar"));
    }

    #[test]
    fn put_body_accepts_wrapped_variables() {
        let body: PutProfileBody = serde_json::from_str(r#"{"variables":{"FOO":"bar"}}"#).expect("parse");
        let vars = body.into_variables();
        assert_eq!(vars.get("FOO").map(String::as_str), Some("bar"));
    }
}

