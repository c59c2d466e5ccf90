//! Session router (§4.3-§4.5): the single point that mutates session state.
//!
//! Handling for one session is serialized by that session's own
//! [`uag_sessions::SessionHandle`] mutex; different sessions progress
//! independently (§5). This module never holds the registry's lock across
//! an adapter call or disk write.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use uag_domain::config::{Config, ToolDecision};
use uag_domain::trace::TraceEvent;
use uag_protocol::{ControlRequestPayload, ControlSubtype, Envelope, ErrorCode, Provider, UserMessage};
use uag_sessions::{GatewaySessionState, SessionRegistry, StateStore};

use crate::adapters::{Adapter, AdapterContext, AdapterError};
use crate::canonical_log::{CanonicalEvent, CanonicalEventType, CanonicalLog, MetaSessionRow};
use crate::metrics::{Metrics, CONTROL_RESPONSE_LATENCY_MS};
use crate::policy::{self, BrainUrlPolicy, RateLimiter};

/// Maps a provider to the adapter instance that serves it. Built once at
/// startup (§4.6); the router only ever calls methods the adapter
/// advertises via [`crate::adapters::Capabilities`].
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<Provider, Arc<dyn Adapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: Provider, adapter: Arc<dyn Adapter>) {
        self.adapters.insert(provider, adapter);
    }

    pub fn get(&self, provider: Provider) -> Option<Arc<dyn Adapter>> {
        self.adapters.get(&provider).cloned()
    }
}

pub struct Router {
    registry: Arc<SessionRegistry>,
    adapters: Arc<AdapterRegistry>,
    brain_url_policy: Arc<BrainUrlPolicy>,
    rate_limiter: Arc<RateLimiter>,
    canonical_log: Arc<CanonicalLog>,
    state_store: Arc<StateStore>,
    metrics: Arc<Metrics>,
    config: Arc<Config>,
}

impl Router {
    pub fn new(
        registry: Arc<SessionRegistry>,
        adapters: Arc<AdapterRegistry>,
        brain_url_policy: Arc<BrainUrlPolicy>,
        rate_limiter: Arc<RateLimiter>,
        canonical_log: Arc<CanonicalLog>,
        state_store: Arc<StateStore>,
        metrics: Arc<Metrics>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            registry,
            adapters,
            brain_url_policy,
            rate_limiter,
            canonical_log,
            state_store,
            metrics,
            config,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Apply an env-profile's variables to a live session (§6 `POST
    /// /env/session/{sessionId}/profile/{name}`). Goes through the same
    /// brain-URL validation and ack/replay bookkeeping as a client-sent
    /// `update_environment_variables` frame.
    pub async fn apply_env_vars(&self, session_id: &str, variables: HashMap<String, String>) -> Vec<Envelope> {
        self.dispatch_update_env_vars(session_id, variables).await
    }

    /// Handle one raw frame from `session_id`'s transport connection (§4.3).
    pub async fn handle_raw_frame(&self, session_id: &str, raw: &str) -> Vec<Envelope> {
        if let Err(e) = policy::check_payload_size(raw, self.config.policy.payload_cap_bytes) {
            return vec![Envelope::error(e.code, e.message)];
        }

        let envelope = match uag_protocol::parse_envelope(raw) {
            Ok(Some(envelope)) => envelope,
            // Rule 7: syntactically valid but unrecognized `type` is
            // silently dropped (multiplexed backend dialect).
            Ok(None) => return Vec::new(),
            Err(e) => return vec![Envelope::error(e.code, e.message)],
        };

        self.dispatch_envelope(session_id, envelope).await
    }

    async fn dispatch_envelope(&self, session_id: &str, envelope: Envelope) -> Vec<Envelope> {
        match envelope {
            Envelope::ControlRequest { request_id, request } => {
                self.dispatch_control_request(session_id, request_id, request).await
            }
            Envelope::ControlCancelRequest { request_id } => self.dispatch_cancel(session_id, &request_id).await,
            Envelope::User { message, .. } => self.dispatch_user_message(session_id, message).await,
            Envelope::KeepAlive {} => {
                if let Some(handle) = self.registry.get(session_id) {
                    let mut session = handle.lock().await;
                    session.touch(now_epoch());
                }
                Vec::new()
            }
            Envelope::UpdateEnvironmentVariables { variables, .. } => {
                self.dispatch_update_env_vars(session_id, variables).await
            }
            // Backend-native pass-through frames arriving via a multiplexed
            // attachment: record them, don't reply (§4.3 step 4 last arm).
            other @ (Envelope::ControlResponse { .. }
            | Envelope::Assistant { .. }
            | Envelope::System { .. }
            | Envelope::TransportState { .. }
            | Envelope::PermissionCancelled { .. }
            | Envelope::Error { .. }) => {
                if let Some(handle) = self.registry.get(session_id) {
                    let mut session = handle.lock().await;
                    session.replay.push(other);
                    session.touch(now_epoch());
                }
                Vec::new()
            }
        }
    }

    /// `UNIFIED_AGENT_BRAIN_URL` among the merged variables is the only one
    /// the router itself inspects; it re-validates it against
    /// [`BrainUrlPolicy`] before accepting the merge (§4.7).
    const BRAIN_URL_ENV_KEY: &'static str = "UNIFIED_AGENT_BRAIN_URL";

    async fn dispatch_update_env_vars(&self, session_id: &str, variables: HashMap<String, String>) -> Vec<Envelope> {
        let Some(handle) = self.registry.get(session_id) else {
            return vec![Envelope::error(ErrorCode::NotInitialized, "session is not initialized")];
        };

        let mut session = handle.lock().await;

        if let Some(url) = variables.get(Self::BRAIN_URL_ENV_KEY) {
            if let Err(e) = self.brain_url_policy.validate(url) {
                self.metrics.record_policy_denial(&session.provider.to_string(), &e.code.to_string());
                return vec![Envelope::error(e.code, e.message)];
            }
        }

        let count = variables.len();
        if let Some(url) = variables.get(Self::BRAIN_URL_ENV_KEY) {
            session.brain_url = Some(url.clone());
        }
        session.env_vars.extend(variables);
        session.touch(now_epoch());
        let ack = Envelope::System {
            session_id: Some(session_id.to_owned()),
            event: uag_protocol::SystemEvent {
                subtype: "status".into(),
                fields: serde_json::Map::from_iter([("updatedCount".into(), serde_json::json!(count))]),
            },
        };
        session.replay.push(ack.clone());
        drop(session);
        vec![ack]
    }

    async fn dispatch_cancel(&self, session_id: &str, request_id: &str) -> Vec<Envelope> {
        let Some(handle) = self.registry.get(session_id) else {
            return vec![Envelope::control_error(request_id, ErrorCode::NotInitialized, "session is not initialized")];
        };
        let mut session = handle.lock().await;
        let cancelled_envelope = session.pending.cancel(request_id, "client cancelled");
        if let Some(env) = cancelled_envelope.clone() {
            session.replay.push(env);
        }
        let response = Envelope::control_success(request_id, serde_json::json!({"cancelled": true}));
        session.replay.push(response.clone());
        drop(session);

        let mut out = Vec::new();
        if let Some(env) = cancelled_envelope {
            out.push(env);
        }
        out.push(response);
        out
    }

    /// §4.4: control-request dispatch table.
    async fn dispatch_control_request(
        &self,
        session_id: &str,
        request_id: String,
        request: ControlRequestPayload,
    ) -> Vec<Envelope> {
        if self.rate_limiter.check(session_id).is_err() {
            TraceEvent::RateLimited {
                session_id: session_id.to_owned(),
                window_secs: 60,
                limit: self.config.policy.requests_per_minute,
            }
            .emit();
            return vec![Envelope::control_error(
                request_id,
                ErrorCode::RateLimited,
                "rate limit exceeded",
            )];
        }

        let subtype = request.subtype();

        if let ControlRequestPayload::Initialize { provider, model } = &request {
            return self.handle_initialize(session_id, request_id, *provider, model.clone()).await;
        }

        let Some(handle) = self.registry.get(session_id) else {
            return vec![Envelope::control_error(
                request_id,
                ErrorCode::NotInitialized,
                "session is not initialized",
            )];
        };

        let provider = {
            let session = handle.lock().await;
            if subtype.requires_initialized_session() && !session.initialized {
                return vec![Envelope::control_error(
                    request_id,
                    ErrorCode::NotInitialized,
                    "session is not initialized",
                )];
            }
            session.provider
        };
        self.metrics.record_request(&provider.to_string(), subtype.as_str());

        let adapter = match self.adapters.get(provider) {
            Some(a) => a,
            None => {
                return vec![Envelope::control_error(
                    request_id,
                    ErrorCode::InternalError,
                    format!("no adapter registered for provider {provider}"),
                )]
            }
        };

        if !adapter.capabilities().supports(subtype) {
            self.metrics.record_unsupported_subtype(&provider.to_string(), subtype.as_str());
            TraceEvent::UnsupportedSubtype {
                session_id: session_id.to_owned(),
                provider: provider.to_string(),
                subtype: subtype.as_str().to_string(),
            }
            .emit();
            let mut session = handle.lock().await;
            let warning = Envelope::System {
                session_id: Some(session_id.to_owned()),
                event: uag_protocol::SystemEvent {
                    subtype: "warning".into(),
                    fields: serde_json::Map::from_iter([(
                        "compatibility".into(),
                        serde_json::json!("emulated-or-unsupported"),
                    )]),
                },
            };
            let error_response = Envelope::control_error(
                request_id.as_str(),
                ErrorCode::UnknownSubtype,
                format!("{} does not support {}", provider, subtype.as_str()),
            );
            session.replay.push(warning.clone());
            session.replay.push(error_response.clone());
            drop(session);
            return vec![warning, error_response];
        }

        if subtype == ControlSubtype::CanUseTool {
            return self.handle_can_use_tool(&handle, session_id, request_id, request).await;
        }

        let started_at = Utc::now();
        let start = Instant::now();
        {
            let mut session = handle.lock().await;
            session.pending.register_request(request_id.as_str(), subtype, started_at);
            if let Some(meta_session_id) = session.meta_session_id.clone() {
                let (project, cwd) = (session.project.clone(), session.cwd.clone());
                drop(session);
                self.append_canonical(
                    &meta_session_id,
                    &project,
                    &cwd,
                    provider,
                    CanonicalEventType::ControlRequest,
                    subtype.as_str().to_string(),
                    None,
                );
            }
        }

        let ctx = self.context_for(&handle).await;
        let outcome = self.dispatch_to_adapter(&adapter, &ctx, &request).await;

        let mut session = handle.lock().await;
        session.pending.complete_request(&request_id);
        let elapsed_ms = start.elapsed().as_millis() as u64;
        self.metrics
            .record_latency(CONTROL_RESPONSE_LATENCY_MS, &provider.to_string(), subtype.as_str(), elapsed_ms);

        let response = match outcome {
            Ok(response_value) => {
                apply_side_effects(&mut session, &request, &response_value);
                Envelope::control_success(request_id.as_str(), response_value)
            }
            Err(e) => Envelope::control_error(request_id.as_str(), e.code.unwrap_or(ErrorCode::InternalError), e.message),
        };
        TraceEvent::ControlCompleted {
            session_id: session_id.to_owned(),
            request_id: request_id.clone(),
            subtype: subtype.as_str().to_string(),
            duration_ms: elapsed_ms,
            ok: matches!(response, Envelope::ControlResponse { response: uag_protocol::ControlResponseBody::Success { .. } }),
        }
        .emit();
        session.replay.push(response.clone());
        session.touch(now_epoch());
        let meta_session_id = session.meta_session_id.clone();
        let (project, cwd) = (session.project.clone(), session.cwd.clone());
        drop(session);

        if let Some(meta_session_id) = meta_session_id {
            self.append_canonical(
                &meta_session_id,
                &project,
                &cwd,
                provider,
                CanonicalEventType::ControlResponse,
                format!("{} -> {}", subtype.as_str(), response.type_tag()),
                None,
            );
        }
        self.persist_all().await;

        vec![response]
    }

    async fn handle_can_use_tool(
        &self,
        handle: &uag_sessions::SessionHandle,
        session_id: &str,
        request_id: String,
        request: ControlRequestPayload,
    ) -> Vec<Envelope> {
        let ControlRequestPayload::CanUseTool {
            input, updated_input, ..
        } = &request
        else {
            unreachable!("caller guarantees CanUseTool")
        };

        let mut session = handle.lock().await;
        session
            .pending
            .register_permission(request_id.as_str(), session_id, request.clone(), Utc::now());

        let behavior = match self.config.policy.can_use_tool_default {
            ToolDecision::Allow => "allow",
            ToolDecision::Deny => "deny",
        };
        let echoed_input = if behavior == "allow" {
            Some(updated_input.clone().unwrap_or_else(|| input.clone()))
        } else {
            None
        };

        if let Err(e) = policy::validate_tool_decision(behavior, echoed_input.as_ref()) {
            session.pending.resolve_permission(&request_id);
            let error_response = Envelope::control_error(request_id.as_str(), e.code, e.message);
            session.replay.push(error_response.clone());
            return vec![error_response];
        }

        // The decision is rendered synchronously against the configured
        // default (§9 open question 2), but the pending-permission entry is
        // deliberately left registered: a disconnect racing the decision
        // must still be able to cancel it (§8 scenario 5). It's only removed
        // by `control_cancel_request` or `cancel_by_session` on disconnect.
        let mut response_body = serde_json::json!({ "behavior": behavior });
        if let Some(input) = echoed_input {
            response_body["updatedInput"] = input;
        }
        let response = Envelope::control_success(request_id.as_str(), response_body);
        session.replay.push(response.clone());
        session.touch(now_epoch());
        drop(session);

        self.persist_all().await;
        vec![response]
    }

    async fn handle_initialize(
        &self,
        session_id: &str,
        request_id: String,
        provider: Provider,
        model: Option<String>,
    ) -> Vec<Envelope> {
        let adapter = match self.adapters.get(provider) {
            Some(a) => a,
            None => {
                return vec![Envelope::control_error(
                    request_id,
                    ErrorCode::InternalError,
                    format!("no adapter registered for provider {provider}"),
                )]
            }
        };

        let existing = self.registry.get(session_id);
        let rehydrated = existing.is_some();
        let handle = match existing {
            Some(handle) => handle,
            None => self
                .registry
                .insert(session_id, GatewaySessionState::new(session_id, provider, now_epoch())),
        };

        {
            let mut session = handle.lock().await;
            session.provider = provider;
            session.model = model;
            session.connected = true;
            if session.meta_session_id.is_none() {
                session.meta_session_id = Some(uuid::Uuid::new_v4().to_string());
            }
        }

        let ctx = self.context_for(&handle).await;
        let result = adapter.initialize(&ctx).await;

        let mut session = handle.lock().await;
        let (response_envelope, transport_envelope) = match result {
            Ok(outcome) => {
                session.provider_session_id = outcome.provider_session_id.or_else(|| session.provider_session_id.clone());
                session.initialized = true;
                let capabilities = adapter.capabilities();
                let transport = Envelope::TransportState {
                    session_id: Some(session_id.to_owned()),
                    state: "cli_connected".into(),
                    payload: Some(serde_json::json!({
                        "provider": provider.to_string(),
                        "model": session.model,
                        "capabilities": capabilities.supported_control_subtypes.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
                    })),
                };
                let response = Envelope::control_success(
                    request_id.as_str(),
                    serde_json::json!({
                        "provider": provider.to_string(),
                        "model": session.model,
                        "capabilities": capabilities.supported_control_subtypes.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
                    }),
                );
                (response, Some(transport))
            }
            Err(e) => (
                Envelope::control_error(request_id.as_str(), e.code.unwrap_or(ErrorCode::InternalError), e.message),
                None,
            ),
        };

        if let Some(transport) = &transport_envelope {
            session.replay.push(transport.clone());
        }
        session.replay.push(response_envelope.clone());
        session.touch(now_epoch());
        let meta_session_id = session.meta_session_id.clone();
        let (project, cwd) = (session.project.clone(), session.cwd.clone());
        drop(session);

        TraceEvent::SessionInitialized {
            session_id: session_id.to_owned(),
            provider: provider.to_string(),
            rehydrated,
        }
        .emit();

        if let Some(meta_session_id) = &meta_session_id {
            self.canonical_log
                .upsert_meta_session(&MetaSessionRow {
                    meta_session_id: meta_session_id.clone(),
                    project,
                    cwd,
                    active_provider: provider,
                    active_model: None,
                    brain_url: None,
                    gateway_session_id: session_id.to_owned(),
                    provider_session_id: None,
                })
                .ok();
            self.append_canonical(
                meta_session_id,
                "",
                "",
                provider,
                if rehydrated {
                    CanonicalEventType::MetaSessionResumed
                } else {
                    CanonicalEventType::MetaSessionCreated
                },
                format!("session {session_id} initialized"),
                None,
            );
        }
        self.persist_all().await;

        let mut out = Vec::new();
        if let Some(t) = transport_envelope {
            out.push(t);
        }
        out.push(response_envelope);
        out
    }

    /// §4.5: user-message handling.
    async fn dispatch_user_message(&self, session_id: &str, message: UserMessage) -> Vec<Envelope> {
        let Some(handle) = self.registry.get(session_id) else {
            return vec![Envelope::error(ErrorCode::NotInitialized, "session is not initialized")];
        };

        let (provider, initialized) = {
            let session = handle.lock().await;
            (session.provider, session.initialized)
        };
        if !initialized {
            return vec![Envelope::error(ErrorCode::NotInitialized, "session is not initialized")];
        }

        let adapter = match self.adapters.get(provider) {
            Some(a) => a,
            None => return vec![Envelope::error(ErrorCode::InternalError, "no adapter registered")],
        };

        let ctx = self.context_for(&handle).await;
        let user_envelope = Envelope::User {
            session_id: session_id.to_owned(),
            message: message.clone(),
        };

        let result = adapter.ask_user(&ctx, &message.content).await;

        let mut session = handle.lock().await;
        let assistant_envelope = match result {
            Ok(outcome) => {
                if let Some(provider_session_id) = outcome.provider_session_id {
                    session.provider_session_id = Some(provider_session_id);
                }
                Envelope::Assistant {
                    session_id: Some(session_id.to_owned()),
                    event: uag_protocol::AssistantEvent {
                        subtype: "message".into(),
                        text: Some(outcome.text),
                        fields: serde_json::Map::new(),
                    },
                }
            }
            Err(e) => Envelope::error(e.code.unwrap_or(ErrorCode::InternalError), e.message),
        };

        session.replay.push(user_envelope);
        session.replay.push(assistant_envelope.clone());
        session.touch(now_epoch());
        let meta_session_id = session.meta_session_id.clone();
        let (project, cwd) = (session.project.clone(), session.cwd.clone());
        drop(session);

        if let Some(meta_session_id) = &meta_session_id {
            self.append_canonical(
                meta_session_id,
                &project,
                &cwd,
                provider,
                CanonicalEventType::UserMessage,
                message.content.clone(),
                None,
            );
            self.append_canonical(
                meta_session_id,
                &project,
                &cwd,
                provider,
                CanonicalEventType::AssistantMessage,
                match &assistant_envelope {
                    Envelope::Assistant { event, .. } => event.text.clone().unwrap_or_default(),
                    _ => String::new(),
                },
                None,
            );
        }
        self.persist_all().await;

        vec![assistant_envelope]
    }

    async fn dispatch_to_adapter(
        &self,
        adapter: &Arc<dyn Adapter>,
        ctx: &AdapterContext,
        request: &ControlRequestPayload,
    ) -> Result<serde_json::Value, AdapterError> {
        match request {
            ControlRequestPayload::SetModel { model } => {
                let chosen = if model == "default" { None } else { Some(model.as_str()) };
                adapter.set_model(ctx, chosen).await?;
                Ok(serde_json::json!({ "model": chosen.unwrap_or("default") }))
            }
            ControlRequestPayload::SetPermissionMode { mode } => {
                adapter.set_permission_mode(ctx, *mode).await?;
                Ok(serde_json::json!({ "mode": mode.to_string() }))
            }
            ControlRequestPayload::SetMaxThinkingTokens { max_thinking_tokens } => {
                adapter.set_max_thinking_tokens(ctx, *max_thinking_tokens).await?;
                Ok(serde_json::json!({ "maxThinkingTokens": max_thinking_tokens }))
            }
            ControlRequestPayload::Interrupt {} => {
                adapter.interrupt(ctx).await?;
                Ok(serde_json::json!({ "interrupted": true }))
            }
            ControlRequestPayload::McpStatus(p)
            | ControlRequestPayload::McpMessage(p)
            | ControlRequestPayload::McpSetServers(p)
            | ControlRequestPayload::McpReconnect(p)
            | ControlRequestPayload::McpToggle(p)
            | ControlRequestPayload::RewindFiles(p)
            | ControlRequestPayload::HookCallback(p) => {
                adapter.mcp_passthrough(ctx, request.subtype(), &p.fields).await
            }
            ControlRequestPayload::Initialize { .. } | ControlRequestPayload::CanUseTool { .. } => {
                unreachable!("handled by dedicated dispatch paths")
            }
        }
    }

    async fn context_for(&self, handle: &uag_sessions::SessionHandle) -> AdapterContext {
        let session = handle.lock().await;
        AdapterContext {
            meta_session_id: session.meta_session_id.clone(),
            gateway_session_id: session.gateway_session_id.clone(),
            provider_session_id: session.provider_session_id.clone(),
            project: session.project.clone(),
            cwd: session.cwd.clone(),
            provider: session.provider,
            model: session.model.clone(),
            brain_url: session.brain_url.clone(),
            permission_mode: session.permission_mode,
            max_thinking_tokens: session.max_thinking_tokens,
        }
    }

    pub(crate) fn append_canonical(
        &self,
        meta_session_id: &str,
        project: &str,
        cwd: &str,
        provider: Provider,
        event_type: CanonicalEventType,
        text: String,
        payload: Option<serde_json::Value>,
    ) {
        let mut event = CanonicalEvent::new(meta_session_id, project, cwd, provider, event_type, text);
        if let Some(payload) = payload {
            event = event.with_payload(payload);
        }
        if let Err(e) = self.canonical_log.append(&event) {
            tracing::warn!(error = %e, meta_session_id, "failed to append canonical event");
        }
    }

    /// Snapshot every session and write it out (§4.3 "state persisted after
    /// every mutation", §4.12). Cheap enough for this gateway's scale; a
    /// busier deployment would debounce this behind a dirty flag instead.
    async fn persist_all(&self) {
        let mut snapshot = Vec::with_capacity(self.registry.len());
        for handle in self.registry.list() {
            snapshot.push(handle.lock().await.clone());
        }
        if let Err(e) = self.state_store.save(&snapshot, now_epoch()) {
            tracing::warn!(error = %e, "failed to persist gateway state");
        }
    }
}

/// Applies response-shaped side effects to in-memory session state that the
/// adapter call itself doesn't know about (model/permission-mode/thinking-
/// token bookkeeping lives on the session, not the adapter).
fn apply_side_effects(session: &mut GatewaySessionState, request: &ControlRequestPayload, _response: &serde_json::Value) {
    match request {
        ControlRequestPayload::SetModel { model } => {
            session.model = if model == "default" { None } else { Some(model.clone()) };
        }
        ControlRequestPayload::SetPermissionMode { mode } => {
            session.permission_mode = *mode;
        }
        ControlRequestPayload::SetMaxThinkingTokens { max_thinking_tokens } => {
            session.max_thinking_tokens = *max_thinking_tokens;
        }
        _ => {}
    }
}

fn now_epoch() -> i64 {
    Utc::now().timestamp()
}

/// Hydration sequence for a reconnecting client (§4.10): a status snapshot,
/// the full replay buffer, then one status line per still-outstanding
/// pending permission.
pub fn hydration_envelopes(session_id: &str, session: &GatewaySessionState) -> Vec<Envelope> {
    let mut out = Vec::with_capacity(session.replay.len() + 2);

    out.push(Envelope::System {
        session_id: Some(session_id.to_owned()),
        event: uag_protocol::SystemEvent {
            subtype: "status".into(),
            fields: serde_json::Map::from_iter([
                ("provider".into(), serde_json::json!(session.provider.to_string())),
                ("model".into(), serde_json::json!(session.model)),
                ("permissionMode".into(), serde_json::json!(session.permission_mode.to_string())),
                ("gatewaySessionId".into(), serde_json::json!(session.gateway_session_id)),
                ("providerSessionId".into(), serde_json::json!(session.provider_session_id)),
                ("connected".into(), serde_json::json!(session.connected)),
            ]),
        },
    });

    out.extend(session.replay.get_all());

    for permission in session.pending.pending_permissions_for(session_id) {
        let (tool_name, tool_use_id) = match &permission.request {
            ControlRequestPayload::CanUseTool {
                tool_name,
                tool_use_id,
                ..
            } => (tool_name.clone(), tool_use_id.clone()),
            _ => (String::new(), String::new()),
        };
        out.push(Envelope::System {
            session_id: Some(session_id.to_owned()),
            event: uag_protocol::SystemEvent {
                subtype: "status".into(),
                fields: serde_json::Map::from_iter([
                    ("requestId".into(), serde_json::json!(permission.request_id)),
                    ("toolName".into(), serde_json::json!(tool_name)),
                    ("toolUseId".into(), serde_json::json!(tool_use_id)),
                ]),
            },
        });
    }

    out
}
