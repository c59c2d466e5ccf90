//! HTTP surface (§6): health, model catalog, usage/metrics snapshots, and
//! env-profile management, all served alongside the attach endpoint on the
//! same listener.

pub mod auth;
pub mod env_profiles;
pub mod health;
pub mod metrics;
pub mod models;
pub mod usage;

use axum::routing::{get, post, put};
use axum::Router;

use crate::state::AppState;
use crate::transport::ws;

/// Assemble the full HTTP router. Every route except `/health` is gated by
/// [`auth::require_api_token`] when an API token is configured.
pub fn router(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/models", get(models::models))
        .route("/usage", get(usage::usage))
        .route("/metrics", get(metrics::metrics))
        .route("/env/profiles", get(env_profiles::list_profiles))
        .route(
            "/env/profiles/:name",
            put(env_profiles::put_profile).delete(env_profiles::delete_profile),
        )
        .route(
            "/env/session/:sessionId/profile/:name",
            post(env_profiles::apply_profile_to_session),
        )
        .route("/v1/sessions/:sessionId/attach", get(ws::attach))
        .route_layer(axum::middleware::from_fn_with_state(state, auth::require_api_token));

    Router::new().route("/health", get(health::health)).merge(protected)
}
