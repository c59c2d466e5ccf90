use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uag_protocol::{ControlRequestPayload, ControlSubtype, Envelope};

/// An in-flight control request, tracked from dispatch to completion (§4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingRequest {
    pub request_id: String,
    pub subtype: ControlSubtype,
    pub started_at: DateTime<Utc>,
}

/// An in-flight `can_use_tool` request awaiting a permission decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingPermission {
    pub request_id: String,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub request: ControlRequestPayload,
}

/// Tracks outstanding `request_id`s and any awaiting permission, both keyed
/// by request id (§4.2). Every entry carries its own session's id; this
/// type makes no attempt at cross-session correlation (§3 invariant 3) —
/// callers key a `PendingCorrelator` per session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PendingCorrelator {
    requests: HashMap<String, PendingRequest>,
    permissions: HashMap<String, PendingPermission>,
}

impl PendingCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_request(
        &mut self,
        request_id: impl Into<String>,
        subtype: ControlSubtype,
        started_at: DateTime<Utc>,
    ) {
        let request_id = request_id.into();
        self.requests.insert(
            request_id.clone(),
            PendingRequest {
                request_id,
                subtype,
                started_at,
            },
        );
    }

    /// Remove and return the pending request, if any. Called on terminal
    /// response or cancellation (§8 invariant 1: after this, no further
    /// `control_response` for the id may be emitted).
    pub fn complete_request(&mut self, request_id: &str) -> Option<PendingRequest> {
        self.requests.remove(request_id)
    }

    pub fn is_pending(&self, request_id: &str) -> bool {
        self.requests.contains_key(request_id)
    }

    pub fn pending_request_count(&self) -> usize {
        self.requests.len()
    }

    pub fn register_permission(
        &mut self,
        request_id: impl Into<String>,
        session_id: impl Into<String>,
        request: ControlRequestPayload,
        created_at: DateTime<Utc>,
    ) {
        let request_id = request_id.into();
        self.permissions.insert(
            request_id.clone(),
            PendingPermission {
                request_id,
                session_id: session_id.into(),
                created_at,
                request,
            },
        );
    }

    pub fn resolve_permission(&mut self, request_id: &str) -> Option<PendingPermission> {
        self.permissions.remove(request_id)
    }

    pub fn pending_permissions_for(&self, session_id: &str) -> Vec<&PendingPermission> {
        self.permissions
            .values()
            .filter(|p| p.session_id == session_id)
            .collect()
    }

    pub fn pending_permission_count(&self) -> usize {
        self.permissions.len()
    }

    /// Handle `control_cancel_request`: drop the pending request and, if it
    /// was an outstanding `can_use_tool`, return the `permission_cancelled`
    /// envelope to emit. Cancelling an id with nothing pending is a no-op
    /// (the caller still replies `control_response.success{cancelled:true}`).
    pub fn cancel(&mut self, request_id: &str, reason: &str) -> Option<Envelope> {
        self.requests.remove(request_id);
        self.permissions
            .remove(request_id)
            .map(|p| Envelope::PermissionCancelled {
                request_id: p.request_id,
                session_id: p.session_id,
                reason: Some(reason.to_owned()),
            })
    }

    /// Drain all pending permissions belonging to `session_id`, e.g. on
    /// transport disconnect (§4.9), emitting one `permission_cancelled`
    /// envelope per entry.
    pub fn cancel_by_session(&mut self, session_id: &str, reason: &str) -> Vec<Envelope> {
        let ids: Vec<String> = self
            .permissions
            .values()
            .filter(|p| p.session_id == session_id)
            .map(|p| p.request_id.clone())
            .collect();
        ids.into_iter()
            .filter_map(|id| self.cancel(&id, reason))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool_request() -> ControlRequestPayload {
        ControlRequestPayload::CanUseTool {
            tool_name: "Bash".into(),
            input: json!({"command": "ls"}),
            tool_use_id: "t1".into(),
            updated_input: None,
        }
    }

    #[test]
    fn cancel_drops_pending_request_and_permission() {
        let mut c = PendingCorrelator::new();
        let now = Utc::now();
        c.register_request("r1", ControlSubtype::CanUseTool, now);
        c.register_permission("r1", "s1", tool_request(), now);

        let emitted = c.cancel("r1", "client cancelled");
        assert!(!c.is_pending("r1"));
        assert_eq!(c.pending_permission_count(), 0);
        match emitted {
            Some(Envelope::PermissionCancelled {
                request_id,
                session_id,
                ..
            }) => {
                assert_eq!(request_id, "r1");
                assert_eq!(session_id, "s1");
            }
            other => panic!("expected permission_cancelled, got {other:?}"),
        }
    }

    #[test]
    fn cancel_of_unknown_id_is_a_harmless_no_op() {
        let mut c = PendingCorrelator::new();
        assert!(c.cancel("missing", "reason").is_none());
    }

    #[test]
    fn cancel_by_session_only_touches_that_session() {
        let mut c = PendingCorrelator::new();
        let now = Utc::now();
        c.register_permission("r1", "s1", tool_request(), now);
        c.register_permission("r2", "s2", tool_request(), now);

        let cancelled = c.cancel_by_session("s1", "backend disconnected");
        assert_eq!(cancelled.len(), 1);
        assert_eq!(c.pending_permission_count(), 1);
        assert!(c.pending_permissions_for("s2").len() == 1);
    }
}
