use serde::{Deserialize, Serialize};

/// Heartbeat + relaunch-watchdog timing knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessConfig {
    /// How often the registry is walked for staleness.
    #[serde(default = "d_heartbeat_secs")]
    pub heartbeat_interval_secs: u64,
    /// A connected session is marked disconnected once `lastSeenEpoch`
    /// exceeds this age.
    #[serde(default = "d_stale_secs")]
    pub stale_after_secs: u64,
    /// Grace period after disconnect before the watchdog fires a
    /// relaunch-required warning, if the session is still disconnected.
    #[serde(default = "d_watchdog_grace_secs")]
    pub watchdog_grace_secs: u64,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: d_heartbeat_secs(),
            stale_after_secs: d_stale_secs(),
            watchdog_grace_secs: d_watchdog_grace_secs(),
        }
    }
}

fn d_heartbeat_secs() -> u64 {
    10
}
fn d_stale_secs() -> u64 {
    45
}
fn d_watchdog_grace_secs() -> u64 {
    20
}
