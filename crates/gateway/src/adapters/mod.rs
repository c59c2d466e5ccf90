//! Adapter interface (§4.6): the abstract contract the router dispatches
//! control subtypes through. Every adapter declares a capability set; the
//! router only ever calls a method the adapter has advertised.

pub mod compat;
pub mod mock;
pub mod relay;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uag_protocol::{ControlSubtype, PermissionMode, Provider};

/// Context passed to every adapter method (§4.6).
#[derive(Debug, Clone)]
pub struct AdapterContext {
    pub meta_session_id: Option<String>,
    pub gateway_session_id: String,
    pub provider_session_id: Option<String>,
    pub project: String,
    pub cwd: String,
    pub provider: Provider,
    pub model: Option<String>,
    pub brain_url: Option<String>,
    pub permission_mode: PermissionMode,
    pub max_thinking_tokens: Option<u64>,
}

/// Result of a successful `initialize` call.
#[derive(Debug, Clone, Default)]
pub struct InitializeOutcome {
    pub provider_session_id: Option<String>,
    pub info: Option<serde_json::Value>,
}

/// Result of a successful `askUser` call.
#[derive(Debug, Clone)]
pub struct AskUserOutcome {
    pub text: String,
    pub provider_session_id: Option<String>,
    pub raw: Option<serde_json::Value>,
}

/// Error surfaced by an adapter method. Carries an [`uag_protocol::ErrorCode`]
/// when the adapter can identify one; otherwise the router maps it to
/// `INTERNAL_ERROR` (§7).
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct AdapterError {
    pub code: Option<uag_protocol::ErrorCode>,
    pub message: String,
}

impl AdapterError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(code: uag_protocol::ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
        }
    }
}

pub type AdapterResult<T> = std::result::Result<T, AdapterError>;

/// First-class capability data (§3, §4.6, §9): the set of control subtypes
/// this adapter implements, plus whether it can act as the native-relay
/// out-of-band session driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capabilities {
    pub provider: Provider,
    pub supports_sdk_url: bool,
    pub supported_control_subtypes: Vec<ControlSubtype>,
}

impl Capabilities {
    pub fn supports(&self, subtype: ControlSubtype) -> bool {
        self.supported_control_subtypes.contains(&subtype)
    }
}

/// Every provider adapter implements this contract. Only `initialize` and
/// `ask_user` are required; everything else mirrors an optional control
/// subtype and defaults to "not supported" so a fresh adapter need not stub
/// out every method.
#[async_trait]
pub trait Adapter: Send + Sync {
    fn capabilities(&self) -> &Capabilities;

    async fn initialize(&self, ctx: &AdapterContext) -> AdapterResult<InitializeOutcome>;

    async fn ask_user(&self, ctx: &AdapterContext, text: &str) -> AdapterResult<AskUserOutcome>;

    async fn set_model(&self, _ctx: &AdapterContext, _model: Option<&str>) -> AdapterResult<()> {
        Ok(())
    }

    async fn set_permission_mode(
        &self,
        _ctx: &AdapterContext,
        _mode: PermissionMode,
    ) -> AdapterResult<()> {
        Ok(())
    }

    async fn set_max_thinking_tokens(
        &self,
        _ctx: &AdapterContext,
        _tokens: Option<u64>,
    ) -> AdapterResult<()> {
        Ok(())
    }

    async fn interrupt(&self, _ctx: &AdapterContext) -> AdapterResult<()> {
        Ok(())
    }

    /// Forwarded `mcp_*` / `rewind_files` / `hook_callback` control requests.
    /// `subtype` tells the implementation which one; `body` is the
    /// passthrough fields. Defaults to `{"supported": false}` (§4.4 table).
    async fn mcp_passthrough(
        &self,
        _ctx: &AdapterContext,
        _subtype: ControlSubtype,
        _body: &serde_json::Map<String, serde_json::Value>,
    ) -> AdapterResult<serde_json::Value> {
        Ok(serde_json::json!({ "supported": false }))
    }
}
