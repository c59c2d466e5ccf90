use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uag_protocol::{PermissionMode, Provider};

use crate::outbound::OutboundQueue;
use crate::pending::PendingCorrelator;
use crate::replay::ReplayBuffer;

/// The central per-session entity (§3). Everything here survives a
/// save/load cycle through the state store except `connected`, which is
/// forced to `false` on load, and the adapter handle itself, which the
/// gateway layer reconstructs from `provider` and keeps alongside this
/// struct rather than inside it — adapters are never persisted (§4.12).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySessionState {
    pub session_id: String,
    pub gateway_session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_session_id: Option<String>,

    pub provider: Provider,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub permission_mode: PermissionMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_thinking_tokens: Option<u64>,

    #[serde(default)]
    pub cwd: String,
    #[serde(default)]
    pub project: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brain_url: Option<String>,
    #[serde(default)]
    pub env_vars: HashMap<String, String>,

    #[serde(default)]
    pub connected: bool,
    pub last_seen_epoch: i64,
    /// Set once a successful `initialize` has completed (§3 invariant 1).
    /// No other control subtype is dispatchable while this is `false`.
    #[serde(default)]
    pub initialized: bool,

    #[serde(default)]
    pub replay: ReplayBuffer,
    #[serde(default)]
    pub outbound: OutboundQueue,
    #[serde(default)]
    pub pending: PendingCorrelator,
}

impl GatewaySessionState {
    /// Create a fresh, uninitialized session. The router flips `initialized`
    /// to `true` only after the adapter's `initialize` call succeeds.
    pub fn new(session_id: impl Into<String>, provider: Provider, now_epoch: i64) -> Self {
        let session_id = session_id.into();
        Self {
            gateway_session_id: session_id.clone(),
            session_id,
            provider_session_id: None,
            meta_session_id: None,
            provider,
            model: None,
            permission_mode: PermissionMode::default(),
            max_thinking_tokens: None,
            cwd: String::new(),
            project: String::new(),
            brain_url: None,
            env_vars: HashMap::new(),
            connected: true,
            last_seen_epoch: now_epoch,
            initialized: false,
            replay: ReplayBuffer::default(),
            outbound: OutboundQueue::default(),
            pending: PendingCorrelator::default(),
        }
    }

    pub fn touch(&mut self, now_epoch: i64) {
        self.last_seen_epoch = now_epoch;
    }

    pub fn is_stale(&self, now_epoch: i64, stale_after_secs: i64) -> bool {
        now_epoch - self.last_seen_epoch > stale_after_secs
    }
}
