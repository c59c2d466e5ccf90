use serde::{Deserialize, Serialize};

/// OTLP metrics export settings. Prometheus `/v1/metrics` is always on;
/// OTLP push is opt-in via `endpoint`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ObservabilityConfig {
    /// OTLP HTTP endpoint to push metrics to. `None` disables the pusher.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
    #[serde(default = "d_otlp_interval_secs")]
    pub otlp_push_interval_secs: u64,
}

fn d_otlp_interval_secs() -> u64 {
    15
}
