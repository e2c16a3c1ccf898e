//! Error types for the negotiation agent

use crate::agent::NegotiationState;
use thiserror::Error;

/// A type alias for handling `Result`s with `Error`
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the negotiation agent, its handlers and allocators
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Operation not allowed in the current negotiation state
    #[error("Cannot {operation} in state {state}")]
    InvalidState {
        operation: &'static str,
        state: NegotiationState,
    },

    /// Session entered again from the thread that is already using it
    #[error("Cannot {0} while the session is in use by this thread")]
    SessionBusy(&'static str),

    /// Unknown handler, group or session
    #[error("Not found: {0}")]
    NotFound(String),

    /// Codec already configured on the handler
    #[error("Duplicate codec: {0}")]
    DuplicateCodec(String),

    /// RTP header extension id already taken
    #[error("Duplicate extmap id: {0}")]
    DuplicateExtmapId(u16),

    /// Handler is already a member of a group with the same semantics
    #[error("Handler {handler} already belongs to a {semantics} group")]
    AlreadyInGroup { handler: u32, semantics: String },

    /// No free dynamic payload type or extmap id remains
    #[error("Allocation exhausted: {0}")]
    AllocationExhausted(String),

    /// Codec has a static payload type and cannot take a dynamic one
    #[error("Codec has a static payload type: {0}")]
    StaticCodecConflict(String),

    /// Handler cannot serve the media (kind or empty codec intersection)
    #[error("Unsupported media: {0}")]
    UnsupportedMedia(String),

    /// Offered transport protocol is not managed by the handler
    #[error("Protocol mismatch: handler manages {expected}, offer uses {offered}")]
    ProtocolMismatch { expected: String, offered: String },

    /// Remote description is structurally unusable
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Invalid argument passed by the caller
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// SDP text could not be parsed
    #[error("SDP error: {0}")]
    Sdp(#[from] rvoip_sdp_core::Error),
}

impl Error {
    /// Create an invalid state error
    pub fn invalid_state(operation: &'static str, state: NegotiationState) -> Self {
        Self::InvalidState { operation, state }
    }

    /// Create a not found error
    pub fn not_found<S: Into<String>>(what: S) -> Self {
        Self::NotFound(what.into())
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Media-level mismatches: the agent rejects the single media line
    /// instead of failing the whole negotiation.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::UnsupportedMedia(_) | Error::ProtocolMismatch { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(err.to_string())
    }
}
