use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Mutex;

use crate::session::GatewaySessionState;

/// A session handle: a [`GatewaySessionState`] behind an async mutex so the
/// router can hold it across adapter and disk I/O calls without blocking a
/// worker thread, while other sessions progress independently (§5).
pub type SessionHandle = Arc<Mutex<GatewaySessionState>>;

/// The gateway's only shared structure (§5): a map from session id to
/// handle. Lookups are cheap (a read lock over a hash map); all mutation of
/// a session's own state happens under that session's own `Mutex`, never
/// under the registry's lock, so no cross-session contention is possible.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session_id: impl Into<String>, state: GatewaySessionState) -> SessionHandle {
        let handle = Arc::new(Mutex::new(state));
        self.sessions
            .write()
            .insert(session_id.into(), handle.clone());
        handle
    }

    pub fn get(&self, session_id: &str) -> Option<SessionHandle> {
        self.sessions.read().get(session_id).cloned()
    }

    pub fn remove(&self, session_id: &str) -> Option<SessionHandle> {
        self.sessions.write().remove(session_id)
    }

    pub fn list_ids(&self) -> Vec<String> {
        self.sessions.read().keys().cloned().collect()
    }

    pub fn list(&self) -> Vec<SessionHandle> {
        self.sessions.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uag_protocol::Provider;

    #[tokio::test]
    async fn insert_then_get_returns_same_handle() {
        let registry = SessionRegistry::new();
        let state = GatewaySessionState::new("s1", Provider::Mock, 0);
        registry.insert("s1", state);

        let handle = registry.get("s1").expect("present");
        {
            let mut guard = handle.lock().await;
            guard.touch(42);
        }
        let handle2 = registry.get("s1").expect("present");
        assert_eq!(handle2.lock().await.last_seen_epoch, 42);
    }

    #[test]
    fn remove_drops_the_entry() {
        let registry = SessionRegistry::new();
        registry.insert("s1", GatewaySessionState::new("s1", Provider::Mock, 0));
        assert_eq!(registry.len(), 1);
        registry.remove("s1");
        assert_eq!(registry.len(), 0);
        assert!(registry.get("s1").is_none());
    }
}
