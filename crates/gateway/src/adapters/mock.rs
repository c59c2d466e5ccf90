//! Deterministic in-process adapter used for tests and local development
//! (scenario 1, §8). Declares every control subtype supported so it also
//! exercises the full dispatch table without a real backend.

use async_trait::async_trait;
use uag_protocol::{ControlSubtype, PermissionMode, Provider};

use super::{Adapter, AdapterContext, AdapterResult, AskUserOutcome, Capabilities, InitializeOutcome};

pub struct MockAdapter {
    capabilities: Capabilities,
}

impl MockAdapter {
    pub fn new() -> Self {
        Self {
            capabilities: Capabilities {
                provider: Provider::Mock,
                supports_sdk_url: false,
                supported_control_subtypes: ControlSubtype::ALL.to_vec(),
            },
        }
    }
}

impl Default for MockAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Adapter for MockAdapter {
    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    async fn initialize(&self, ctx: &AdapterContext) -> AdapterResult<InitializeOutcome> {
        Ok(InitializeOutcome {
            provider_session_id: Some(format!("mock-{}", ctx.gateway_session_id)),
            info: Some(serde_json::json!({"provider": "mock"})),
        })
    }

    async fn ask_user(&self, _ctx: &AdapterContext, text: &str) -> AdapterResult<AskUserOutcome> {
        Ok(AskUserOutcome {
            text: format!("mock: {text}"),
            provider_session_id: None,
            raw: None,
        })
    }

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

    async fn mcp_passthrough(
        &self,
        _ctx: &AdapterContext,
        _subtype: ControlSubtype,
        _body: &serde_json::Map<String, serde_json::Value>,
    ) -> AdapterResult<serde_json::Value> {
        Ok(serde_json::json!({ "supported": true, "acknowledged": true }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> AdapterContext {
        AdapterContext {
            meta_session_id: None,
            gateway_session_id: "s1".into(),
            provider_session_id: None,
            project: String::new(),
            cwd: String::new(),
            provider: Provider::Mock,
            model: None,
            brain_url: None,
            permission_mode: PermissionMode::Default,
            max_thinking_tokens: None,
        }
    }

    #[tokio::test]
    async fn ask_user_echoes_with_prefix() {
        let adapter = MockAdapter::new();
        let out = adapter.ask_user(&ctx(), "hello").await.expect("ok");
        assert_eq!(out.text, "mock: hello");
    }

    #[tokio::test]
    async fn declares_every_subtype() {
        let adapter = MockAdapter::new();
        for subtype in ControlSubtype::ALL {
            assert!(adapter.capabilities().supports(*subtype));
        }
    }
}
