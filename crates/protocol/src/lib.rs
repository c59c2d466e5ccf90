//! Wire envelopes for the unified agent gateway.
//!
//! Every message crossing the gateway boundary — client to gateway, gateway
//! to adapter, adapter back to gateway — is one [`Envelope`]. This crate
//! owns the closed taxonomy of envelope types, control-request subtypes,
//! providers, and error codes, plus the parse/validate/encode functions in
//! [`codec`].

mod codec;
mod envelope;
mod error;
mod provider;
mod subtype;

pub use codec::{encode_envelope, parse_envelope};
pub use envelope::{
    AssistantEvent, ControlRequestPayload, ControlResponseBody, Envelope, McpPassthrough,
    SystemEvent, UserMessage,
};
pub use error::{CodecError, CodecResult};
pub use provider::{PermissionMode, Provider};
pub use subtype::{ControlSubtype, ErrorCode};
