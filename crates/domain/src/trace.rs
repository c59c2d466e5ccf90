use serde::Serialize;

/// Structured trace events emitted across the gateway.
///
/// Each variant is logged as a single `tracing::info!` call carrying the
/// serialized event under the `trace_event` field, so a JSON log sink can
/// filter on `event` without parsing free-text messages.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    SessionInitialized {
        session_id: String,
        provider: String,
        rehydrated: bool,
    },
    ControlDispatched {
        session_id: String,
        request_id: String,
        subtype: String,
    },
    ControlCompleted {
        session_id: String,
        request_id: String,
        subtype: String,
        duration_ms: u64,
        ok: bool,
    },
    UnsupportedSubtype {
        session_id: String,
        provider: String,
        subtype: String,
    },
    PolicyDenied {
        session_id: String,
        reason: String,
    },
    RateLimited {
        session_id: String,
        window_secs: u64,
        limit: u32,
    },
    SessionDisconnected {
        session_id: String,
        peers_remaining: usize,
    },
    WatchdogRelaunchRequired {
        session_id: String,
    },
    StateSaved {
        sessions: usize,
        path: String,
    },
    StateLoadCorrupt {
        path: String,
        quarantined_to: String,
    },
    CanonicalAppend {
        meta_session_id: String,
        event_type: String,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "gateway_event");
    }
}
