use serde::{Deserialize, Serialize};

/// Policy knobs: payload caps, brain-URL allow-listing, rate limits, and the
/// default `can_use_tool` decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Max accepted frame size, in bytes, before a `control_request`/`user`
    /// envelope is rejected with `INVALID_ARGUMENT`.
    #[serde(default = "d_payload_cap")]
    pub payload_cap_bytes: usize,
    /// Allow `ws://` brain URLs (normally only `wss://` is accepted).
    #[serde(default)]
    pub allow_insecure_ws: bool,
    /// Regex allow-list for brain URLs. Empty means "no restriction beyond
    /// the scheme check".
    #[serde(default)]
    pub brain_url_allowlist: Vec<String>,
    /// Per-session sliding-window control-request quota (requests/minute).
    #[serde(default = "d_requests_per_minute")]
    pub requests_per_minute: u32,
    /// Default behavior for `can_use_tool` when no human is present to decide.
    #[serde(default)]
    pub can_use_tool_default: ToolDecision,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            payload_cap_bytes: d_payload_cap(),
            allow_insecure_ws: false,
            brain_url_allowlist: Vec::new(),
            requests_per_minute: d_requests_per_minute(),
            can_use_tool_default: ToolDecision::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ToolDecision {
    Allow,
    #[default]
    Deny,
}

fn d_payload_cap() -> usize {
    512 * 1024
}
fn d_requests_per_minute() -> u32 {
    240
}
