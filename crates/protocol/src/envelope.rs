use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::provider::{PermissionMode, Provider};
use crate::subtype::{ControlSubtype, ErrorCode};

/// Body of a `control_request`, keyed on `subtype`.
///
/// The mcp_* and rewind/hook variants pass their remaining fields through as
/// an opaque JSON object — the gateway brokers these to the adapter rather
/// than interpreting them itself, so there's nothing to gain by modeling
/// every provider's mcp payload shape here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "subtype", rename_all = "snake_case")]
pub enum ControlRequestPayload {
    Initialize {
        provider: Provider,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model: Option<String>,
    },
    CanUseTool {
        tool_name: String,
        input: serde_json::Value,
        tool_use_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        updated_input: Option<serde_json::Value>,
    },
    Interrupt {},
    SetPermissionMode {
        mode: PermissionMode,
    },
    SetModel {
        model: String,
    },
    SetMaxThinkingTokens {
        max_thinking_tokens: Option<u64>,
    },
    McpStatus(McpPassthrough),
    McpMessage(McpPassthrough),
    McpSetServers(McpPassthrough),
    McpReconnect(McpPassthrough),
    McpToggle(McpPassthrough),
    RewindFiles(McpPassthrough),
    HookCallback(McpPassthrough),
}

impl ControlRequestPayload {
    pub fn subtype(&self) -> ControlSubtype {
        match self {
            ControlRequestPayload::Initialize { .. } => ControlSubtype::Initialize,
            ControlRequestPayload::CanUseTool { .. } => ControlSubtype::CanUseTool,
            ControlRequestPayload::Interrupt {} => ControlSubtype::Interrupt,
            ControlRequestPayload::SetPermissionMode { .. } => ControlSubtype::SetPermissionMode,
            ControlRequestPayload::SetModel { .. } => ControlSubtype::SetModel,
            ControlRequestPayload::SetMaxThinkingTokens { .. } => {
                ControlSubtype::SetMaxThinkingTokens
            }
            ControlRequestPayload::McpStatus(_) => ControlSubtype::McpStatus,
            ControlRequestPayload::McpMessage(_) => ControlSubtype::McpMessage,
            ControlRequestPayload::McpSetServers(_) => ControlSubtype::McpSetServers,
            ControlRequestPayload::McpReconnect(_) => ControlSubtype::McpReconnect,
            ControlRequestPayload::McpToggle(_) => ControlSubtype::McpToggle,
            ControlRequestPayload::RewindFiles(_) => ControlSubtype::RewindFiles,
            ControlRequestPayload::HookCallback(_) => ControlSubtype::HookCallback,
        }
    }
}

/// Catch-all body for subtypes the gateway forwards to the adapter without
/// interpreting (all fields besides `subtype` land in `fields`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct McpPassthrough {
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

/// Body of a `control_response`, keyed on `subtype` (`"success"` or
/// `"error"`, not a `ControlSubtype` — this is a reply envelope, not a
/// request).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "subtype", rename_all = "lowercase")]
pub enum ControlResponseBody {
    Success {
        request_id: String,
        #[serde(default)]
        response: serde_json::Value,
    },
    Error {
        request_id: String,
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<ErrorCode>,
    },
}

impl ControlResponseBody {
    pub fn request_id(&self) -> &str {
        match self {
            ControlResponseBody::Success { request_id, .. } => request_id,
            ControlResponseBody::Error { request_id, .. } => request_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantEvent {
    pub subtype: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemEvent {
    pub subtype: String,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

/// The full set of envelope types the gateway reads and writes. Anything
/// whose `type` isn't a variant here is dropped by the router (§4.1 rule 7)
/// rather than rejected — tagged-enum deserialization already gives us that
/// for free via `Envelope::try_from_value`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Envelope {
    #[serde(rename = "control_request")]
    ControlRequest {
        request_id: String,
        request: ControlRequestPayload,
    },
    #[serde(rename = "control_response")]
    ControlResponse { response: ControlResponseBody },
    #[serde(rename = "control_cancel_request")]
    ControlCancelRequest { request_id: String },
    #[serde(rename = "user")]
    User {
        session_id: String,
        message: UserMessage,
    },
    #[serde(rename = "assistant")]
    Assistant {
        #[serde(skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        event: AssistantEvent,
    },
    #[serde(rename = "system")]
    System {
        #[serde(skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        event: SystemEvent,
    },
    #[serde(rename = "transport_state")]
    TransportState {
        #[serde(skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        state: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        payload: Option<serde_json::Value>,
    },
    #[serde(rename = "permission_cancelled")]
    PermissionCancelled {
        request_id: String,
        session_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    #[serde(rename = "keep_alive")]
    KeepAlive {},
    #[serde(rename = "update_environment_variables")]
    UpdateEnvironmentVariables {
        session_id: String,
        variables: HashMap<String, String>,
    },
    #[serde(rename = "error")]
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        code: ErrorCode,
        message: String,
    },
}

impl Envelope {
    pub fn type_tag(&self) -> &'static str {
        match self {
            Envelope::ControlRequest { .. } => "control_request",
            Envelope::ControlResponse { .. } => "control_response",
            Envelope::ControlCancelRequest { .. } => "control_cancel_request",
            Envelope::User { .. } => "user",
            Envelope::Assistant { .. } => "assistant",
            Envelope::System { .. } => "system",
            Envelope::TransportState { .. } => "transport_state",
            Envelope::PermissionCancelled { .. } => "permission_cancelled",
            Envelope::KeepAlive {} => "keep_alive",
            Envelope::UpdateEnvironmentVariables { .. } => "update_environment_variables",
            Envelope::Error { .. } => "error",
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        match self {
            Envelope::User { session_id, .. } => Some(session_id),
            Envelope::Assistant { session_id, .. } => session_id.as_deref(),
            Envelope::System { session_id, .. } => session_id.as_deref(),
            Envelope::TransportState { session_id, .. } => session_id.as_deref(),
            Envelope::PermissionCancelled { session_id, .. } => Some(session_id),
            Envelope::UpdateEnvironmentVariables { session_id, .. } => Some(session_id),
            Envelope::Error { session_id, .. } => session_id.as_deref(),
            Envelope::ControlRequest { .. }
            | Envelope::ControlResponse { .. }
            | Envelope::ControlCancelRequest { .. }
            | Envelope::KeepAlive {} => None,
        }
    }

    pub fn control_success(request_id: impl Into<String>, response: serde_json::Value) -> Self {
        Envelope::ControlResponse {
            response: ControlResponseBody::Success {
                request_id: request_id.into(),
                response,
            },
        }
    }

    pub fn control_error(
        request_id: impl Into<String>,
        code: ErrorCode,
        error: impl Into<String>,
    ) -> Self {
        Envelope::ControlResponse {
            response: ControlResponseBody::Error {
                request_id: request_id.into(),
                error: error.into(),
                code: Some(code),
            },
        }
    }

    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Envelope::Error {
            session_id: None,
            code,
            message: message.into(),
        }
    }
}
