//! Shared application state passed to transport handlers and HTTP routes.

use std::sync::Arc;

use uag_domain::config::Config;
use uag_domain::error::Result;
use uag_sessions::{SessionRegistry, StateStore};

use crate::api::env_profiles::EnvProfileStore;
use crate::canonical_log::CanonicalLog;
use crate::heartbeat::HeartbeatSupervisor;
use crate::metrics::Metrics;
use crate::policy::{BrainUrlPolicy, RateLimiter};
use crate::router::{AdapterRegistry, Router};
use crate::transport::PeerHub;

/// Shared application state passed to all API and transport handlers.
///
/// Fields are grouped by concern:
/// - **Core services** — config, the router (which itself owns the session
///   registry, adapters, and persistence)
/// - **Background** — the heartbeat supervisor
/// - **Security** — cached API token digest
#[derive(Clone)]
pub struct AppState {
    // ── Core services ─────────────────────────────────────────────────
    pub config: Arc<Config>,
    pub router: Arc<Router>,

    // ── Background ────────────────────────────────────────────────────
    pub heartbeat: Arc<HeartbeatSupervisor>,

    // ── Transport ─────────────────────────────────────────────────────
    /// Multi-peer broadcast fan-out for the attach endpoint (§4.9).
    pub peer_hub: Arc<PeerHub>,

    /// Named env-var bundles an operator can apply to a live session (§6).
    pub env_profiles: Arc<EnvProfileStore>,

    // ── Security ──────────────────────────────────────────────────────
    /// SHA-256 digest of the configured API token, cached once at startup.
    /// `None` means no token is configured (dev mode, unauthenticated).
    pub api_token_hash: Option<Vec<u8>>,
}

impl AppState {
    /// Assemble the full dependency graph from a resolved [`Config`] (§4.1,
    /// §4.11, §4.12). Opens the canonical log and state store on the
    /// configured workspace data dir, creating it if absent, and rehydrates
    /// any persisted sessions with `connected` forced to `false`.
    pub fn build(config: Config, adapters: AdapterRegistry) -> Result<Self> {
        let config = Arc::new(config);
        std::fs::create_dir_all(&config.workspace.data_dir)?;

        let registry = Arc::new(SessionRegistry::new());
        let adapters = Arc::new(adapters);
        let brain_url_policy = Arc::new(
            BrainUrlPolicy::new(&config.policy)
                .map_err(|e| uag_domain::error::Error::Config(format!("invalid brain_url_allowlist pattern: {e}")))?,
        );
        let rate_limiter = Arc::new(RateLimiter::new(
            config.policy.requests_per_minute,
            std::time::Duration::from_secs(60),
        ));
        let canonical_log = Arc::new(CanonicalLog::open(
            config.workspace.sessions_dir(),
            config.workspace.events_index_file(),
        )?);
        let state_store = Arc::new(StateStore::new(config.workspace.state_file()));
        let metrics = Arc::new(Metrics::new());

        let now = chrono::Utc::now().timestamp();
        for session in state_store.load(now)? {
            registry.insert(session.session_id.clone(), session);
        }

        let router = Arc::new(Router::new(
            registry.clone(),
            adapters,
            brain_url_policy,
            rate_limiter,
            canonical_log,
            state_store,
            metrics,
            config.clone(),
        ));

        let heartbeat = HeartbeatSupervisor::new(registry, config.liveness.clone());
        let peer_hub = Arc::new(PeerHub::new());
        let env_profiles = Arc::new(EnvProfileStore::open(config.workspace.env_profiles_file())?);
        let api_token_hash = resolve_api_token_hash(&config.server.api_token_env);

        Ok(Self {
            config,
            router,
            heartbeat,
            peer_hub,
            env_profiles,
            api_token_hash,
        })
    }

    /// Start background sweeps (heartbeat, OTLP push). Call once after
    /// `build`, before serving traffic.
    pub fn spawn_background_tasks(&self) {
        self.heartbeat.spawn();

        if let Some(endpoint) = self.config.observability.otlp_endpoint.clone() {
            let metrics = self.router.metrics();
            let interval = crate::metrics::otlp_push_interval(self.config.observability.otlp_push_interval_secs);
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                loop {
                    ticker.tick().await;
                    metrics.push_otlp(&endpoint).await;
                }
            });
        }
        tracing::info!("background tasks spawned");
    }
}

/// Reads the env var named by `api_token_env` **once at startup** and caches
/// its SHA-256 digest. Unset or empty disables auth (dev mode).
fn resolve_api_token_hash(api_token_env: &str) -> Option<Vec<u8>> {
    use sha2::{Digest, Sha256};

    match std::env::var(api_token_env) {
        Ok(token) if !token.is_empty() => Some(Sha256::digest(token.as_bytes()).to_vec()),
        _ => {
            tracing::warn!(env_var = api_token_env, "no API token configured, running unauthenticated");
            None
        }
    }
}
