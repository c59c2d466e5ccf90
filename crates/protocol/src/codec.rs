use crate::envelope::{ControlRequestPayload, Envelope};
use crate::error::{CodecError, CodecResult};
use crate::subtype::ErrorCode;

const KNOWN_TYPES: &[&str] = &[
    "control_request",
    "control_response",
    "control_cancel_request",
    "user",
    "assistant",
    "system",
    "transport_state",
    "permission_cancelled",
    "keep_alive",
    "update_environment_variables",
    "error",
];

/// Parse one wire frame, applying the ordered rules from the envelope
/// design: object-with-string-`type` first, then per-type shape, then
/// per-subtype shape. Returns `Ok(None)` for a syntactically valid envelope
/// whose `type` the router doesn't recognize — those are dropped, not
/// rejected. Everything else that fails validation is `Err`.
pub fn parse_envelope(raw: &str) -> CodecResult<Option<Envelope>> {
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| CodecError::invalid_envelope(format!("not valid JSON: {e}")))?;

    let obj = value
        .as_object()
        .ok_or_else(|| CodecError::invalid_envelope("envelope must be a JSON object"))?;

    let type_tag = obj
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or_else(|| CodecError::invalid_envelope("envelope must have a string \"type\""))?;

    if !KNOWN_TYPES.contains(&type_tag) {
        return Ok(None);
    }

    let envelope: Envelope = serde_json::from_value(value)
        .map_err(|e| CodecError::invalid_envelope(format!("malformed {type_tag}: {e}")))?;

    validate(&envelope)?;
    Ok(Some(envelope))
}

fn validate(envelope: &Envelope) -> CodecResult<()> {
    match envelope {
        Envelope::ControlRequest {
            request_id,
            request,
        } => {
            if request_id.trim().is_empty() {
                return Err(CodecError::invalid_envelope(
                    "control_request.request_id must be non-empty",
                ));
            }
            validate_control_request(request)?;
        }
        Envelope::ControlCancelRequest { request_id } => {
            if request_id.trim().is_empty() {
                return Err(CodecError::invalid_envelope(
                    "control_cancel_request.request_id must be non-empty",
                ));
            }
        }
        Envelope::User { session_id, message } => {
            if session_id.trim().is_empty() {
                return Err(CodecError::invalid_envelope(
                    "user.session_id must be non-empty",
                ));
            }
            if message.role != "user" {
                return Err(CodecError::invalid_envelope(
                    "user.message.role must be \"user\"",
                ));
            }
            if message.content.is_empty() {
                return Err(CodecError::invalid_envelope(
                    "user.message.content must be non-empty",
                ));
            }
        }
        // Remaining recognized types pass through unvalidated beyond their
        // own struct shape (rule 6) — the serde deserialize above already
        // enforced that.
        Envelope::ControlResponse { .. }
        | Envelope::Assistant { .. }
        | Envelope::System { .. }
        | Envelope::TransportState { .. }
        | Envelope::PermissionCancelled { .. }
        | Envelope::KeepAlive {}
        | Envelope::UpdateEnvironmentVariables { .. }
        | Envelope::Error { .. } => {}
    }
    Ok(())
}

fn validate_control_request(request: &ControlRequestPayload) -> CodecResult<()> {
    match request {
        ControlRequestPayload::CanUseTool {
            tool_name,
            tool_use_id,
            ..
        } => {
            if tool_name.trim().is_empty() {
                return Err(CodecError::new(
                    ErrorCode::InvalidArgument,
                    "can_use_tool.tool_name must be non-empty",
                ));
            }
            if tool_use_id.trim().is_empty() {
                return Err(CodecError::new(
                    ErrorCode::InvalidArgument,
                    "can_use_tool.tool_use_id must be non-empty",
                ));
            }
        }
        ControlRequestPayload::SetModel { model } => {
            if model.trim().is_empty() {
                return Err(CodecError::new(
                    ErrorCode::InvalidArgument,
                    "set_model.model must be non-empty",
                ));
            }
        }
        _ => {}
    }
    Ok(())
}

/// Serialize an envelope back to its wire form (single-line JSON, matching
/// how both the native adapters and the WebSocket transport frame
/// messages).
pub fn encode_envelope(envelope: &Envelope) -> CodecResult<String> {
    serde_json::to_string(envelope).map_err(CodecError::from)
}

impl From<serde_json::Error> for CodecError {
    fn from(e: serde_json::Error) -> Self {
        CodecError::new(ErrorCode::InternalError, e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Provider;

    #[test]
    fn round_trips_a_user_message() {
        let raw = r#"{"type":"user","session_id":"s1","message":{"role":"user","content":"hi"}}"#;
        let envelope = parse_envelope(raw).expect("parse").expect("recognized");
        let encoded = encode_envelope(&envelope).expect("encode");
        let reparsed = parse_envelope(&encoded).expect("parse").expect("recognized");
        assert_eq!(envelope.session_id(), reparsed.session_id());
        match reparsed {
            Envelope::User { message, .. } => assert_eq!(message.content, "hi"),
            other => panic!("unexpected envelope: {other:?}"),
        }
    }

    #[test]
    fn unknown_type_is_dropped_not_rejected() {
        let raw = r#"{"type":"some_future_type","x":1}"#;
        let parsed = parse_envelope(raw).expect("should not error");
        assert!(parsed.is_none());
    }

    #[test]
    fn non_object_input_is_rejected() {
        let err = parse_envelope("42").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidEnvelope);
    }

    #[test]
    fn control_request_requires_nonempty_request_id() {
        let raw = r#"{"type":"control_request","request_id":"","request":{"subtype":"interrupt"}}"#;
        let err = parse_envelope(raw).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidEnvelope);
    }

    #[test]
    fn initialize_requires_a_known_provider() {
        let raw = r#"{"type":"control_request","request_id":"r1","request":{"subtype":"initialize","provider":"not-a-provider"}}"#;
        let err = parse_envelope(raw).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidEnvelope);
    }

    #[test]
    fn initialize_parses_provider_and_model() {
        let raw = r#"{"type":"control_request","request_id":"r1","request":{"subtype":"initialize","provider":"mock","model":"mock-1"}}"#;
        let envelope = parse_envelope(raw).expect("parse").expect("recognized");
        match envelope {
            Envelope::ControlRequest { request, .. } => match request {
                ControlRequestPayload::Initialize { provider, model } => {
                    assert_eq!(provider, Provider::Mock);
                    assert_eq!(model.as_deref(), Some("mock-1"));
                }
                other => panic!("unexpected request: {other:?}"),
            },
            other => panic!("unexpected envelope: {other:?}"),
        }
    }

    #[test]
    fn user_message_wrong_role_is_rejected() {
        let raw = r#"{"type":"user","session_id":"s1","message":{"role":"assistant","content":"hi"}}"#;
        let err = parse_envelope(raw).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidEnvelope);
    }

    #[test]
    fn can_use_tool_requires_tool_name() {
        let raw = r#"{"type":"control_request","request_id":"r1","request":{"subtype":"can_use_tool","tool_name":"","input":{},"tool_use_id":"t1"}}"#;
        let err = parse_envelope(raw).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidArgument);
    }

    #[test]
    fn mcp_passthrough_keeps_arbitrary_fields() {
        let raw = r#"{"type":"control_request","request_id":"r1","request":{"subtype":"mcp_status","server":"fs","detail":{"ok":true}}}"#;
        let envelope = parse_envelope(raw).expect("parse").expect("recognized");
        match envelope {
            Envelope::ControlRequest { request, .. } => match request {
                ControlRequestPayload::McpStatus(passthrough) => {
                    assert_eq!(
                        passthrough.fields.get("server").and_then(|v| v.as_str()),
                        Some("fs")
                    );
                }
                other => panic!("unexpected request: {other:?}"),
            },
            other => panic!("unexpected envelope: {other:?}"),
        }
    }

    #[test]
    fn keep_alive_round_trips() {
        let raw = r#"{"type":"keep_alive"}"#;
        let envelope = parse_envelope(raw).expect("parse").expect("recognized");
        assert_eq!(envelope.type_tag(), "keep_alive");
        let encoded = encode_envelope(&envelope).expect("encode");
        assert!(encoded.contains("keep_alive"));
    }

    #[test]
    fn control_response_success_round_trips() {
        let envelope = Envelope::control_success("r1", serde_json::json!({"ok": true}));
        let encoded = encode_envelope(&envelope).expect("encode");
        let reparsed = parse_envelope(&encoded).expect("parse").expect("recognized");
        match reparsed {
            Envelope::ControlResponse { response } => {
                assert_eq!(response.request_id(), "r1");
            }
            other => panic!("unexpected envelope: {other:?}"),
        }
    }
}
