//! Fallback adapter for the three third-party CLI backends when no native
//! relay command is configured for them.
//!
//! Driving the real `claude`/`codex`/`gemini` CLIs (argument building,
//! stdout-line parsing) is explicitly out of scope for this gateway — it's
//! a narrow external collaborator behind the adapter interface. This
//! adapter is what the router talks to until a [`super::relay::RelayAdapter`]
//! is configured for the provider: it supports the core subtypes but
//! deliberately omits the mcp_*/rewind_files/hook_callback set, which
//! exercises the compatibility path in §4.4 rule 4 and §8 scenario 4.

use async_trait::async_trait;
use uag_protocol::{ControlSubtype, PermissionMode, Provider};

use super::{Adapter, AdapterContext, AdapterResult, AskUserOutcome, Capabilities, InitializeOutcome};

pub struct CompatAdapter {
    capabilities: Capabilities,
}

impl CompatAdapter {
    pub fn new(provider: Provider) -> Self {
        Self {
            capabilities: Capabilities {
                provider,
                supports_sdk_url: true,
                supported_control_subtypes: vec![
                    ControlSubtype::Initialize,
                    ControlSubtype::CanUseTool,
                    ControlSubtype::Interrupt,
                    ControlSubtype::SetPermissionMode,
                    ControlSubtype::SetModel,
                    ControlSubtype::SetMaxThinkingTokens,
                ],
            },
        }
    }
}

#[async_trait]
impl Adapter for CompatAdapter {
    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    async fn initialize(&self, ctx: &AdapterContext) -> AdapterResult<InitializeOutcome> {
        Ok(InitializeOutcome {
            provider_session_id: Some(format!(
                "{}-{}",
                self.capabilities.provider, ctx.gateway_session_id
            )),
            info: Some(serde_json::json!({"provider": self.capabilities.provider.to_string(), "mode": "compat"})),
        })
    }

    async fn ask_user(&self, ctx: &AdapterContext, text: &str) -> AdapterResult<AskUserOutcome> {
        Ok(AskUserOutcome {
            text: format!("[{} compat] {text}", ctx.provider),
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

    async fn interrupt(&self, _ctx: &AdapterContext) -> AdapterResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn omits_mcp_and_rewind_subtypes() {
        let adapter = CompatAdapter::new(Provider::Claude);
        assert!(!adapter.capabilities().supports(ControlSubtype::RewindFiles));
        assert!(!adapter.capabilities().supports(ControlSubtype::McpStatus));
        assert!(adapter.capabilities().supports(ControlSubtype::CanUseTool));
    }
}
