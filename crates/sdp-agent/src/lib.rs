//! # rvoip-sdp-agent
//!
//! SDP offer/answer (RFC 3264) negotiation engine.
//!
//! An [`SdpAgent`] holds media handlers, one per media line it wants to
//! negotiate, and turns them into offers and answers while keeping the m-line
//! layout stable across renegotiations.
//!
//! ## Components
//!
//! - **Handlers**: RTP (AVP, AVPF, SAVP, SAVPF) and SCTP data channel
//!   capabilities, see [`handler`]
//! - **Extensions**: per-media plug-ins such as SDES key exchange, see [`extension`]
//! - **Groups**: BUNDLE and other `a=group` semantics
//! - **Sessions and endpoint**: thread-safe wrappers driven with SDP text
//!
//! ## Usage
//!
//! ```rust
//! use rvoip_sdp_agent::{MediaHandler, NegotiationState, SdpAgent};
//!
//! let mut offerer = SdpAgent::with_address(false, "10.0.0.1");
//! let mut audio = MediaHandler::rtp_avp();
//! audio.add_audio_codec("PCMU/8000/1")?;
//! offerer.add_handler("audio", audio.clone())?;
//!
//! let mut answerer = SdpAgent::with_address(false, "10.0.0.2");
//! answerer.add_handler("audio", audio)?;
//!
//! let offer = offerer.create_offer()?;
//! offerer.set_local_description(&offer)?;
//!
//! answerer.set_remote_description(&offer)?;
//! let answer = answerer.create_answer()?;
//! answerer.set_local_description(&answer)?;
//!
//! offerer.set_remote_description(&answer)?;
//! assert_eq!(offerer.state(), NegotiationState::Negotiated);
//! assert_eq!(answer.media_descriptions[0].formats, vec!["0"]);
//! # Ok::<(), rvoip_sdp_agent::Error>(())
//! ```

pub mod agent;
pub mod codec;
pub mod config;
pub mod context;
pub mod endpoint;
pub mod error;
pub mod extension;
pub mod group;
pub mod handler;
pub mod payload;
pub mod policy;
pub mod session;

// Re-export commonly used types
pub use agent::{HandlerId, NegotiationState, SdpAgent};
pub use codec::Codec;
pub use config::{AgentConfig, EndpointConfig};
pub use context::{MediaSlot, SdpMessageContext, SdpType};
pub use endpoint::SdpEndpoint;
pub use error::{Error, Result};
pub use extension::MediaExtension;
pub use group::{GroupId, GroupSemantics, MediaGroup};
pub use handler::{MediaHandler, MediaProfile};
pub use payload::{DynamicPayloadManager, ExtmapRegistry, PayloadManager, SharedPayloadManager};
pub use session::MediaSession;

/// Version information for the negotiation engine
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Commonly used types
pub mod prelude {
    pub use crate::agent::{HandlerId, NegotiationState, SdpAgent};
    pub use crate::config::{AgentConfig, EndpointConfig};
    pub use crate::error::{Error, Result};
    pub use crate::extension::{ConnectionExtension, MediaExtension, SdesExtension};
    pub use crate::group::{GroupId, GroupSemantics};
    pub use crate::handler::{MediaHandler, MediaProfile};
    pub use crate::payload::DynamicPayloadManager;
    pub use rvoip_sdp_core::{MediaDescription, MediaDirection, SdpSession};
}
