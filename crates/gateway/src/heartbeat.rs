//! Heartbeat liveness and relaunch watchdog (§4.8).
//!
//! A global timer walks the session registry on a fixed interval. Any
//! connected session whose `lastSeenEpoch` has exceeded the staleness bound
//! is marked disconnected and handed a one-shot watchdog: if the session is
//! still disconnected once the grace period elapses, a `system.warning`
//! envelope is appended to its replay buffer for the next reconnecting
//! client to observe during hydration (§4.10). A reconnect in the meantime
//! simply finds `connected: true` again and the watchdog is a no-op.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use uag_domain::config::LivenessConfig;
use uag_domain::trace::TraceEvent;
use uag_protocol::Envelope;
use uag_sessions::SessionRegistry;

/// Runs the heartbeat tick loop and schedules watchdogs. Cheap to construct;
/// one instance per gateway process.
pub struct HeartbeatSupervisor {
    registry: Arc<SessionRegistry>,
    config: LivenessConfig,
    /// Sessions with an in-flight watchdog, so a session stale across two
    /// consecutive ticks doesn't get a second timer stacked on top.
    watchdogs_scheduled: Mutex<HashSet<String>>,
}

impl HeartbeatSupervisor {
    pub fn new(registry: Arc<SessionRegistry>, config: LivenessConfig) -> Arc<Self> {
        Arc::new(Self {
            registry,
            config,
            watchdogs_scheduled: Mutex::new(HashSet::new()),
        })
    }

    /// Spawn the periodic tick loop as a background task. Mirrors the
    /// interval-loop shape used for the gateway's other background sweeps.
    pub fn spawn(self: &Arc<Self>) {
        let supervisor = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(supervisor.config.heartbeat_interval_secs.max(1)));
            loop {
                interval.tick().await;
                supervisor.tick().await;
            }
        });
    }

    /// One sweep of the registry (§4.8 paragraph 1).
    async fn tick(self: &Arc<Self>) {
        let now = Utc::now().timestamp();
        for session_id in self.registry.list_ids() {
            let Some(handle) = self.registry.get(&session_id) else {
                continue;
            };

            let became_stale = {
                let mut session = handle.lock().await;
                if session.connected && session.is_stale(now, self.config.stale_after_secs as i64) {
                    session.connected = false;
                    true
                } else {
                    false
                }
            };

            if became_stale {
                tracing::info!(session_id = %session_id, "session marked disconnected by heartbeat sweep");
                self.schedule_watchdog(session_id);
            }
        }
    }

    fn schedule_watchdog(self: &Arc<Self>, session_id: String) {
        {
            let mut scheduled = self.watchdogs_scheduled.lock();
            if !scheduled.insert(session_id.clone()) {
                return;
            }
        }

        let supervisor = self.clone();
        let grace = Duration::from_secs(self.config.watchdog_grace_secs.max(1));
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            supervisor.fire_watchdog(&session_id).await;
            supervisor.watchdogs_scheduled.lock().remove(&session_id);
        });
    }

    /// Fires after the grace period (§4.8 paragraph 1, last sentence). A
    /// reconnect that happened in the meantime already flipped `connected`
    /// back to `true`, so this is naturally a no-op in that case.
    async fn fire_watchdog(&self, session_id: &str) {
        let Some(handle) = self.registry.get(session_id) else {
            return;
        };
        let mut session = handle.lock().await;
        if session.connected {
            return;
        }

        tracing::warn!(session_id, "relaunch watchdog fired, session still disconnected");
        TraceEvent::WatchdogRelaunchRequired {
            session_id: session_id.to_owned(),
        }
        .emit();
        let warning = Envelope::System {
            session_id: Some(session_id.to_owned()),
            event: uag_protocol::SystemEvent {
                subtype: "warning".into(),
                fields: serde_json::Map::from_iter([("relaunch".into(), serde_json::json!("required"))]),
            },
        };
        session.replay.push(warning);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uag_protocol::Provider;
    use uag_sessions::GatewaySessionState;

    fn liveness(heartbeat: u64, stale: u64, grace: u64) -> LivenessConfig {
        LivenessConfig {
            heartbeat_interval_secs: heartbeat,
            stale_after_secs: stale,
            watchdog_grace_secs: grace,
        }
    }

    #[tokio::test]
    async fn tick_marks_stale_connected_session_disconnected() {
        let registry = Arc::new(SessionRegistry::new());
        let mut state = GatewaySessionState::new("s1", Provider::Mock, 0);
        state.connected = true;
        state.last_seen_epoch = 0;
        registry.insert("s1", state);

        let supervisor = HeartbeatSupervisor::new(registry.clone(), liveness(10, 1, 20));
        // Advance the clock implicitly: stale_after_secs=1 and last_seen=0,
        // so any `now` more than one second later trips staleness. We can't
        // control `Utc::now()` here, so assert the invariant directly via a
        // manual staleness check mirroring what `tick` does.
        let handle = registry.get("s1").unwrap();
        assert!(handle.lock().await.is_stale(100, 1));
        supervisor.tick().await;
        assert!(!registry.get("s1").unwrap().lock().await.connected);
    }

    #[tokio::test]
    async fn fresh_session_is_left_connected() {
        let registry = Arc::new(SessionRegistry::new());
        let now = Utc::now().timestamp();
        let mut state = GatewaySessionState::new("s1", Provider::Mock, now);
        state.connected = true;
        state.last_seen_epoch = now;
        registry.insert("s1", state);

        let supervisor = HeartbeatSupervisor::new(registry.clone(), liveness(10, 45, 20));
        supervisor.tick().await;
        assert!(registry.get("s1").unwrap().lock().await.connected);
    }

    #[tokio::test]
    async fn watchdog_appends_relaunch_warning_when_still_disconnected() {
        let registry = Arc::new(SessionRegistry::new());
        let mut state = GatewaySessionState::new("s1", Provider::Mock, 0);
        state.connected = false;
        registry.insert("s1", state);

        let supervisor = HeartbeatSupervisor::new(registry.clone(), liveness(10, 45, 0));
        supervisor.fire_watchdog("s1").await;

        let handle = registry.get("s1").unwrap();
        let session = handle.lock().await;
        let found = session
            .replay
            .get_all()
            .into_iter()
            .any(|e| matches!(e, Envelope::System { event, .. } if event.subtype == "warning"));
        assert!(found);
    }

    #[tokio::test]
    async fn watchdog_is_a_no_op_after_reconnect() {
        let registry = Arc::new(SessionRegistry::new());
        let mut state = GatewaySessionState::new("s1", Provider::Mock, 0);
        state.connected = true;
        registry.insert("s1", state);

        let supervisor = HeartbeatSupervisor::new(registry.clone(), liveness(10, 45, 0));
        supervisor.fire_watchdog("s1").await;

        let handle = registry.get("s1").unwrap();
        assert!(handle.lock().await.replay.is_empty());
    }
}
