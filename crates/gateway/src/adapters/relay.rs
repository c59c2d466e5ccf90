//! Native-relay adapter (§4.6, last paragraph).
//!
//! Opens a child process per session that itself holds the secondary
//! connection to the configured relay URL (`ctx.brain_url`). Control
//! requests and user turns are written to the child as framed envelope
//! JSON lines; streaming events are read back the same way. Nested
//! `control_request` frames the child emits mid-turn (the backend asking
//! *us* for a tool permission or an mcp round-trip) are auto-answered
//! rather than surfaced to the client — this adapter speaks for its own
//! child process. The first `result` frame resolves the turn.

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin};
use tokio::sync::Mutex;

use uag_protocol::{ControlSubtype, PermissionMode, Provider};

use super::{Adapter, AdapterContext, AdapterError, AdapterResult, AskUserOutcome, Capabilities, InitializeOutcome};

pub const DEFAULT_TURN_TIMEOUT: Duration = Duration::from_secs(45);
const DEFAULT_TEARDOWN_GRACE: Duration = Duration::from_secs(5);

struct RelayProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: tokio::io::Lines<BufReader<tokio::process::ChildStdout>>,
}

/// Configuration for spawning the relay child process for one provider.
#[derive(Debug, Clone)]
pub struct RelayCommand {
    pub program: String,
    pub args: Vec<String>,
}

pub struct RelayAdapter {
    capabilities: Capabilities,
    command: RelayCommand,
    turn_timeout: Duration,
    teardown_grace: Duration,
    sessions: Mutex<HashMap<String, RelayProcess>>,
}

impl RelayAdapter {
    pub fn new(provider: Provider, command: RelayCommand) -> Self {
        Self {
            capabilities: Capabilities {
                provider,
                supports_sdk_url: true,
                supported_control_subtypes: ControlSubtype::ALL.to_vec(),
            },
            command,
            turn_timeout: DEFAULT_TURN_TIMEOUT,
            teardown_grace: DEFAULT_TEARDOWN_GRACE,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_turn_timeout(mut self, timeout: Duration) -> Self {
        self.turn_timeout = timeout;
        self
    }

    async fn spawn(&self, ctx: &AdapterContext) -> AdapterResult<RelayProcess> {
        let mut cmd = tokio::process::Command::new(&self.command.program);
        cmd.args(&self.command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        if let Some(url) = &ctx.brain_url {
            cmd.env("UAG_RELAY_URL", url);
        }
        cmd.env("UAG_RELAY_SESSION", &ctx.gateway_session_id);

        let mut child = cmd
            .spawn()
            .map_err(|e| AdapterError::internal(format!("spawning relay process: {e}")))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| AdapterError::internal("relay process has no stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AdapterError::internal("relay process has no stdout"))?;
        Ok(RelayProcess {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
        })
    }

    /// Write one framed envelope line, then read until a `result` frame,
    /// auto-answering any nested `control_request` frame along the way.
    async fn drive_turn(&self, proc: &mut RelayProcess, frame: &serde_json::Value) -> AdapterResult<serde_json::Value> {
        let line = serde_json::to_string(frame)
            .map_err(|e| AdapterError::internal(format!("encoding relay frame: {e}")))?;
        proc.stdin
            .write_all(format!("{line}\n").as_bytes())
            .await
            .map_err(|e| AdapterError::internal(format!("writing to relay process: {e}")))?;

        let result = tokio::time::timeout(self.turn_timeout, async {
            loop {
                let next = proc
                    .stdout
                    .next_line()
                    .await
                    .map_err(|e| AdapterError::internal(format!("reading relay process: {e}")))?
                    .ok_or_else(|| AdapterError::internal("relay process closed stdout"))?;

                let value: serde_json::Value = match serde_json::from_str(&next) {
                    Ok(v) => v,
                    Err(_) => continue,
                };

                match value.get("type").and_then(|t| t.as_str()) {
                    Some("control_request") => {
                        self.auto_answer(proc, &value).await?;
                    }
                    Some("result") => return Ok(value),
                    _ => continue,
                }
            }
        })
        .await
        .map_err(|_| AdapterError::with_code(uag_protocol::ErrorCode::RequestTimeout, "relay turn timed out"))??;

        Ok(result)
    }

    async fn auto_answer(&self, proc: &mut RelayProcess, request: &serde_json::Value) -> AdapterResult<()> {
        let request_id = request
            .get("request_id")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        let subtype = request
            .pointer("/request/subtype")
            .and_then(|v| v.as_str())
            .unwrap_or_default();

        let response = if subtype == "can_use_tool" {
            let input = request.pointer("/request/input").cloned().unwrap_or(serde_json::Value::Null);
            serde_json::json!({
                "type": "control_response",
                "response": { "subtype": "success", "request_id": request_id, "response": { "behavior": "allow", "updatedInput": input } }
            })
        } else {
            serde_json::json!({
                "type": "control_response",
                "response": { "subtype": "success", "request_id": request_id, "response": {} }
            })
        };

        let line = serde_json::to_string(&response)
            .map_err(|e| AdapterError::internal(format!("encoding auto-answer: {e}")))?;
        proc.stdin
            .write_all(format!("{line}\n").as_bytes())
            .await
            .map_err(|e| AdapterError::internal(format!("writing auto-answer: {e}")))
    }

    async fn teardown(&self, mut proc: RelayProcess) {
        let _ = proc.stdin.shutdown().await;
        if tokio::time::timeout(self.teardown_grace, proc.child.wait())
            .await
            .is_err()
        {
            let _ = proc.child.start_kill();
        }
    }
}

#[async_trait]
impl Adapter for RelayAdapter {
    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    async fn initialize(&self, ctx: &AdapterContext) -> AdapterResult<InitializeOutcome> {
        let mut proc = self.spawn(ctx).await?;
        let frame = serde_json::json!({
            "type": "control_request",
            "request_id": format!("init-{}", ctx.gateway_session_id),
            "request": { "subtype": "initialize", "provider": ctx.provider.to_string(), "model": ctx.model }
        });
        let result = self.drive_turn(&mut proc, &frame).await?;
        let provider_session_id = result
            .get("providerSessionId")
            .and_then(|v| v.as_str())
            .map(str::to_owned);

        self.sessions
            .lock()
            .await
            .insert(ctx.gateway_session_id.clone(), proc);

        Ok(InitializeOutcome {
            provider_session_id,
            info: Some(result),
        })
    }

    async fn ask_user(&self, ctx: &AdapterContext, text: &str) -> AdapterResult<AskUserOutcome> {
        let mut sessions = self.sessions.lock().await;
        let proc = sessions
            .get_mut(&ctx.gateway_session_id)
            .ok_or_else(|| AdapterError::internal("relay process not initialized for session"))?;

        let frame = serde_json::json!({
            "type": "user",
            "session_id": ctx.gateway_session_id,
            "message": { "role": "user", "content": text }
        });
        let result = self.drive_turn(proc, &frame).await?;
        let text = result
            .get("text")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_owned();
        let provider_session_id = result
            .get("providerSessionId")
            .and_then(|v| v.as_str())
            .map(str::to_owned);
        Ok(AskUserOutcome {
            text,
            provider_session_id,
            raw: Some(result),
        })
    }

    async fn set_permission_mode(&self, _ctx: &AdapterContext, _mode: PermissionMode) -> AdapterResult<()> {
        Ok(())
    }

    async fn interrupt(&self, ctx: &AdapterContext) -> AdapterResult<()> {
        if let Some(proc) = self.sessions.lock().await.remove(&ctx.gateway_session_id) {
            self.teardown(proc).await;
        }
        Ok(())
    }
}
