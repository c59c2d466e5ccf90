use serde::{Deserialize, Serialize};

/// The closed set of `control_request` subtypes the router understands.
///
/// Anything outside this set fails parsing with `UNKNOWN_SUBTYPE` rather
/// than being forwarded blind to an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlSubtype {
    Initialize,
    CanUseTool,
    Interrupt,
    SetPermissionMode,
    SetModel,
    SetMaxThinkingTokens,
    McpStatus,
    McpMessage,
    McpSetServers,
    McpReconnect,
    McpToggle,
    RewindFiles,
    HookCallback,
}

impl ControlSubtype {
    pub const ALL: &'static [ControlSubtype] = &[
        ControlSubtype::Initialize,
        ControlSubtype::CanUseTool,
        ControlSubtype::Interrupt,
        ControlSubtype::SetPermissionMode,
        ControlSubtype::SetModel,
        ControlSubtype::SetMaxThinkingTokens,
        ControlSubtype::McpStatus,
        ControlSubtype::McpMessage,
        ControlSubtype::McpSetServers,
        ControlSubtype::McpReconnect,
        ControlSubtype::McpToggle,
        ControlSubtype::RewindFiles,
        ControlSubtype::HookCallback,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ControlSubtype::Initialize => "initialize",
            ControlSubtype::CanUseTool => "can_use_tool",
            ControlSubtype::Interrupt => "interrupt",
            ControlSubtype::SetPermissionMode => "set_permission_mode",
            ControlSubtype::SetModel => "set_model",
            ControlSubtype::SetMaxThinkingTokens => "set_max_thinking_tokens",
            ControlSubtype::McpStatus => "mcp_status",
            ControlSubtype::McpMessage => "mcp_message",
            ControlSubtype::McpSetServers => "mcp_set_servers",
            ControlSubtype::McpReconnect => "mcp_reconnect",
            ControlSubtype::McpToggle => "mcp_toggle",
            ControlSubtype::RewindFiles => "rewind_files",
            ControlSubtype::HookCallback => "hook_callback",
        }
    }

    /// Subtypes that require an active (initialized) adapter before they're
    /// accepted by the router. `initialize` is the one exception.
    pub fn requires_initialized_session(&self) -> bool {
        !matches!(self, ControlSubtype::Initialize)
    }
}

/// The closed taxonomy of error codes the gateway ever emits on the wire.
/// Kept as an enum, not a free-form string, so every call site is exhaustive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidEnvelope,
    UnknownSubtype,
    PolicyDenied,
    NotInitialized,
    RequestTimeout,
    RateLimited,
    InvalidArgument,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidEnvelope => "INVALID_ENVELOPE",
            ErrorCode::UnknownSubtype => "UNKNOWN_SUBTYPE",
            ErrorCode::PolicyDenied => "POLICY_DENIED",
            ErrorCode::NotInitialized => "NOT_INITIALIZED",
            ErrorCode::RequestTimeout => "REQUEST_TIMEOUT",
            ErrorCode::RateLimited => "RATE_LIMITED",
            ErrorCode::InvalidArgument => "INVALID_ARGUMENT",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
