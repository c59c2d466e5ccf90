//! Per-session WebSocket attach endpoint (§4.9, §4.10).
//!
//! `role=relay` marks a ride-along peer: its frames are broadcast raw to
//! the other attached peers but never handed to the router. Every other
//! attachment is the session's primary driver.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use uag_domain::trace::TraceEvent;
use uag_protocol::Envelope;

use crate::canonical_log::CanonicalEventType;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AttachQuery {
    pub role: Option<String>,
}

/// GET /v1/sessions/{sessionId}/attach?role=relay — upgrade to WebSocket.
pub async fn attach(
    ws: WebSocketUpgrade,
    Path(session_id): Path<String>,
    Query(query): Query<AttachQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let is_peer_role = query.role.as_deref() == Some("relay");
    ws.on_upgrade(move |socket| handle_socket(socket, state, session_id, is_peer_role))
}

async fn handle_socket(socket: WebSocket, state: AppState, session_id: String, is_peer_role: bool) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = state.peer_hub.attach(&session_id);

    tx.send(Envelope::TransportState {
        session_id: Some(session_id.clone()),
        state: "cli_connected".into(),
        payload: None,
    })
    .ok();

    if let Some(handle) = state.router.registry().get(&session_id) {
        let mut session = handle.lock().await;
        session.connected = true;
        session.touch(chrono::Utc::now().timestamp());
        state.router.metrics().record_reconnect_attempt(&session.provider.to_string());

        let mut outbound = Vec::new();
        session.outbound.flush(|env| outbound.push(env.clone()));
        let hydration = crate::router::hydration_envelopes(&session_id, &session);
        drop(session);

        for envelope in outbound.into_iter().chain(hydration) {
            if send_envelope(&mut sink, &envelope).await.is_err() {
                return;
            }
        }
    }

    let writer = tokio::spawn(async move {
        while let Ok(envelope) = rx.recv().await {
            if send_envelope(&mut sink, &envelope).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = stream.next().await {
        match msg {
            Message::Text(text) => {
                if is_peer_role {
                    if let Ok(Some(envelope)) = uag_protocol::parse_envelope(&text) {
                        state.peer_hub.broadcast(&session_id, envelope);
                    }
                } else {
                    for response in state.router.handle_raw_frame(&session_id, &text).await {
                        state.peer_hub.broadcast(&session_id, response);
                    }
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    writer.abort();
    let remaining = state.peer_hub.detach(&session_id);
    TraceEvent::SessionDisconnected {
        session_id: session_id.clone(),
        peers_remaining: remaining,
    }
    .emit();
    if remaining == 0 {
        on_last_peer_detached(&state, &session_id).await;
    }
}

/// Scenario 5 (§8): the last peer detaching marks the session disconnected,
/// appends `transport_state.cli_disconnected`, then cancels every pending
/// permission with reason `"backend disconnected"`. The heartbeat sweep
/// picks the watchdog up on its next tick rather than this path scheduling
/// one directly, so transport stays decoupled from heartbeat internals.
async fn on_last_peer_detached(state: &AppState, session_id: &str) {
    let Some(handle) = state.router.registry().get(session_id) else {
        return;
    };
    let mut envelopes = Vec::new();
    let (meta_session_id, project, cwd, provider);
    {
        let mut session = handle.lock().await;
        session.connected = false;

        let disconnected = Envelope::TransportState {
            session_id: Some(session_id.to_owned()),
            state: "cli_disconnected".into(),
            payload: None,
        };
        session.replay.push(disconnected.clone());
        envelopes.push(disconnected);

        let cancelled = session.pending.cancel_by_session(session_id, "backend disconnected");
        for envelope in &cancelled {
            session.replay.push(envelope.clone());
        }
        envelopes.extend(cancelled);

        meta_session_id = session.meta_session_id.clone();
        project = session.project.clone();
        cwd = session.cwd.clone();
        provider = session.provider;
    }

    // §4.13 requires transport transitions (and errors) in the canonical
    // log, same as `Router` already does for control responses and user
    // turns. `permission_cancelled` envelopes ride along on the existing
    // replay/broadcast path; they aren't part of §4.13's closed event list.
    if let Some(meta_session_id) = &meta_session_id {
        for envelope in &envelopes {
            let event_type = match envelope {
                Envelope::TransportState { .. } => Some(CanonicalEventType::TransportState),
                Envelope::Error { .. } => Some(CanonicalEventType::Error),
                _ => None,
            };
            if let Some(event_type) = event_type {
                state.router.append_canonical(
                    meta_session_id,
                    &project,
                    &cwd,
                    provider,
                    event_type,
                    envelope.type_tag().to_string(),
                    None,
                );
            }
        }
    }

    for envelope in envelopes {
        state.peer_hub.broadcast(session_id, envelope);
    }
}

async fn send_envelope(
    sink: &mut (impl SinkExt<Message> + Unpin),
    envelope: &Envelope,
) -> Result<(), ()> {
    let json = uag_protocol::encode_envelope(envelope).map_err(|_| ())?;
    sink.send(Message::Text(json)).await.map_err(|_| ())
}
