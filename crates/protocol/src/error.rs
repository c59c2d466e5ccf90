use crate::subtype::ErrorCode;

/// Failure to parse or validate a raw wire frame into an [`crate::Envelope`].
///
/// Carries an [`ErrorCode`] so callers can reply with a `control_response`
/// error or an `error` envelope without re-deriving the code from the
/// message text.
#[derive(Debug, thiserror::Error)]
#[error("{code}: {message}")]
pub struct CodecError {
    pub code: ErrorCode,
    pub message: String,
}

impl CodecError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_envelope(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidEnvelope, message)
    }

    pub fn unknown_subtype(subtype: impl std::fmt::Display) -> Self {
        Self::new(
            ErrorCode::UnknownSubtype,
            format!("unrecognized control subtype: {subtype}"),
        )
    }
}

pub type CodecResult<T> = std::result::Result<T, CodecError>;
