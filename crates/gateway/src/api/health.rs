//! `GET /health` (§6).

use axum::extract::State;
use axum::Json;

use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "ok": true,
        "sessions": state.router.registry().len(),
        "metrics": state.router.metrics().otlp_json(0),
    }))
}
