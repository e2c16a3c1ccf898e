//! SDP attribute parsers
//!
//! One module per attribute family. Every parser takes the attribute value
//! (the part after `a=<name>:`) and returns the typed representation.

pub mod common;

// Media attribute modules
pub mod rtpmap;
pub mod fmtp;
pub mod direction;

// Grouping and stream management
pub mod group;

// RTCP-related
pub mod rtcp_fb;

// Extension modules
pub mod extmap;
pub mod crypto;

// Data channel
pub mod sctpmap;

pub use direction::MediaDirection;
pub use rtpmap::parse_rtpmap;
pub use fmtp::parse_fmtp;
pub use group::parse_group;
pub use rtcp_fb::parse_rtcp_fb;
pub use extmap::parse_extmap;
pub use crypto::parse_crypto;
pub use sctpmap::parse_sctpmap;
