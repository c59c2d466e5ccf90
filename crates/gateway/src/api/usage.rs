//! `GET /usage` (§6): metrics snapshot plus per-session pending counts.

use axum::extract::State;
use axum::Json;

use crate::state::AppState;

pub async fn usage(State(state): State<AppState>) -> Json<serde_json::Value> {
    let mut sessions = Vec::new();
    for handle in state.router.registry().list() {
        let session = handle.lock().await;
        sessions.push(serde_json::json!({
            "sessionId": session.session_id,
            "provider": session.provider.to_string(),
            "pendingRequests": session.pending.pending_request_count(),
            "pendingPermissions": session.pending.pending_permission_count(),
        }));
    }

    Json(serde_json::json!({
        "metrics": state.router.metrics().otlp_json(0),
        "sessions": sessions,
    }))
}
