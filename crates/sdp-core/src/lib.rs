//! # rvoip-sdp-core
//!
//! Session Description Protocol (RFC 8866) document model for the rvoip
//! offer/answer engine.
//!
//! This crate only knows about SDP text and its typed representation. It
//! does not negotiate anything; see `rvoip-sdp-agent` for the offer/answer
//! state machine built on top of it.
//!
//! ## Parsing and printing
//!
//! ```
//! use rvoip_sdp_core::{parse_sdp, MediaDirection};
//!
//! let sdp = parse_sdp(
//!     "v=0\r\n\
//!      o=- 1 0 IN IP4 10.0.0.1\r\n\
//!      s=-\r\n\
//!      t=0 0\r\n\
//!      m=audio 9 RTP/AVP 0\r\n\
//!      a=sendonly\r\n",
//! ).unwrap();
//!
//! let audio = &sdp.media_descriptions[0];
//! assert_eq!(audio.direction(), Some(MediaDirection::SendOnly));
//! assert!(sdp.to_string().contains("m=audio 9 RTP/AVP 0\r\n"));
//! ```

pub mod attributes;
pub mod error;
pub mod parser;
pub mod types;

pub use attributes::MediaDirection;
pub use error::{Error, Result};
pub use parser::{parse_attribute, parse_media_description_line, parse_sdp, parse_sdp_bytes};
pub use types::{
    Bandwidth, ConnectionData, CryptoAttribute, FmtpAttribute, MediaDescription, Origin, ParsedAttribute,
    RtpMapAttribute, SdpSession, TimeDescription,
};

/// Commonly used types
pub mod prelude {
    pub use crate::attributes::MediaDirection;
    pub use crate::error::{Error, Result};
    pub use crate::parser::parse_sdp;
    pub use crate::types::*;
}
