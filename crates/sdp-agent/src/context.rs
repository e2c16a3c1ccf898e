//! SDP message context
//!
//! The negotiation-side view of a session description: an arena of media
//! slots, each optionally bound to the handler that produced or will answer
//! it, plus the session-level group lines. A context is built by the agent or
//! from a received [`SdpSession`], and packed back into one for the wire.

use crate::agent::HandlerId;
use crate::error::{Error, Result};
use rvoip_sdp_core::{
    Bandwidth, ConnectionData, MediaDescription, Origin, ParsedAttribute, SdpSession, TimeDescription,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SdpType {
    Offer,
    Answer,
}

impl fmt::Display for SdpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SdpType::Offer => f.write_str("offer"),
            SdpType::Answer => f.write_str("answer"),
        }
    }
}

/// One m-line position. The index never changes once negotiated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSlot {
    pub index: usize,
    pub handler: Option<HandlerId>,
    pub media: MediaDescription,
}

impl MediaSlot {
    pub fn kind(&self) -> &str {
        &self.media.media
    }

    pub fn mid(&self) -> Option<&str> {
        self.media.mid()
    }

    pub fn is_rejected(&self) -> bool {
        self.media.is_rejected()
    }

    pub fn is_vacant(&self) -> bool {
        self.handler.is_none()
    }
}

/// `a=group` line content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupAttribute {
    pub semantics: String,
    pub mids: Vec<String>,
}

/// What makes two descriptions "the same" for versioning purposes: the whole
/// m-line minus SDES key material, which is regenerated for every description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFingerprint {
    pub rejected: bool,
    pub mid: Option<String>,
    pub media: MediaDescription,
}

#[derive(Debug, Clone)]
pub struct SdpMessageContext {
    sdp_type: SdpType,
    origin: Origin,
    session_name: String,
    connection: Option<ConnectionData>,
    bandwidths: Vec<Bandwidth>,
    attributes: Vec<ParsedAttribute>,
    groups: Vec<GroupAttribute>,
    slots: Vec<MediaSlot>,
}

impl SdpMessageContext {
    pub fn new(sdp_type: SdpType, origin: Origin, session_name: impl Into<String>) -> Self {
        Self {
            sdp_type,
            origin,
            session_name: session_name.into(),
            connection: None,
            bandwidths: Vec::new(),
            attributes: Vec::new(),
            groups: Vec::new(),
            slots: Vec::new(),
        }
    }

    /// Builds an unbound context from a received description
    pub fn from_sdp(sdp: &SdpSession, sdp_type: SdpType) -> Result<Self> {
        let mut seen = HashSet::new();
        for media in &sdp.media_descriptions {
            if let Some(mid) = media.mid() {
                if !seen.insert(mid) {
                    return Err(Error::MalformedInput(format!("duplicate mid {mid}")));
                }
            }
        }

        let mut ctx = Self::new(sdp_type, sdp.origin.clone(), sdp.session_name.clone());
        ctx.connection = sdp.connection_info.clone();
        ctx.bandwidths = sdp.bandwidths.clone();

        for attr in &sdp.generic_attributes {
            match attr {
                ParsedAttribute::Group(semantics, mids) => ctx.groups.push(GroupAttribute {
                    semantics: semantics.clone(),
                    mids: mids.clone(),
                }),
                other => ctx.attributes.push(other.clone()),
            }
        }

        for media in &sdp.media_descriptions {
            ctx.push_slot(None, media.clone());
        }
        Ok(ctx)
    }

    /// Wire form of the context
    pub fn pack(&self) -> SdpSession {
        let mut sdp = SdpSession::new(self.origin.clone(), self.session_name.clone());
        sdp.connection_info = self.connection.clone();
        sdp.bandwidths = self.bandwidths.clone();
        sdp.time_descriptions = vec![TimeDescription::default()];

        for group in &self.groups {
            sdp.add_attribute(ParsedAttribute::Group(group.semantics.clone(), group.mids.clone()));
        }
        for attr in &self.attributes {
            sdp.add_attribute(attr.clone());
        }
        sdp.media_descriptions = self.slots.iter().map(|s| s.media.clone()).collect();
        sdp
    }

    pub fn sdp_type(&self) -> SdpType {
        self.sdp_type
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn version(&self) -> u64 {
        self.origin.sess_version
    }

    pub fn slots(&self) -> &[MediaSlot] {
        &self.slots
    }

    pub(crate) fn slots_mut(&mut self) -> &mut [MediaSlot] {
        &mut self.slots
    }

    pub fn groups(&self) -> &[GroupAttribute] {
        &self.groups
    }

    pub fn slot_by_mid(&self, mid: &str) -> Option<&MediaSlot> {
        self.slots.iter().find(|s| s.mid() == Some(mid))
    }

    pub(crate) fn set_version(&mut self, version: u64) {
        self.origin.sess_version = version;
    }

    pub fn connection(&self) -> Option<&ConnectionData> {
        self.connection.as_ref()
    }

    pub(crate) fn set_connection(&mut self, connection: ConnectionData) {
        self.connection = Some(connection);
    }

    pub(crate) fn push_slot(&mut self, handler: Option<HandlerId>, media: MediaDescription) {
        let index = self.slots.len();
        self.slots.push(MediaSlot { index, handler, media });
    }

    pub(crate) fn add_group(&mut self, semantics: impl Into<String>, mids: Vec<String>) {
        self.groups.push(GroupAttribute {
            semantics: semantics.into(),
            mids,
        });
    }

    pub fn media_fingerprint(&self) -> Vec<MediaFingerprint> {
        self.slots
            .iter()
            .map(|s| {
                let mut media = s.media.clone();
                media.attributes.retain(|a| !matches!(a, ParsedAttribute::Crypto(_)));
                MediaFingerprint {
                    rejected: s.is_rejected(),
                    mid: s.mid().map(str::to_string),
                    media,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rvoip_sdp_core::parse_sdp;

    const SDP: &str = "v=0\r\n\
        o=- 42 3 IN IP4 1.1.1.1\r\n\
        s=-\r\n\
        c=IN IP4 1.1.1.1\r\n\
        t=0 0\r\n\
        a=group:BUNDLE audio0 video0\r\n\
        a=ice-lite\r\n\
        m=audio 9 RTP/AVP 0\r\n\
        a=mid:audio0\r\n\
        m=video 0 RTP/AVP\r\n\
        a=mid:video0\r\n";

    #[test]
    fn test_from_sdp_and_pack() {
        let sdp = parse_sdp(SDP).unwrap();
        let ctx = SdpMessageContext::from_sdp(&sdp, SdpType::Offer).unwrap();
        assert_eq!(ctx.version(), 3);
        assert_eq!(ctx.slots().len(), 2);
        assert_eq!(ctx.groups()[0].mids, vec!["audio0", "video0"]);
        assert!(ctx.slots()[1].is_rejected());
        assert!(ctx.slots().iter().all(|s| s.is_vacant()));
        assert_eq!(ctx.slot_by_mid("video0").map(|s| s.index), Some(1));
        assert_eq!(ctx.pack(), sdp);
    }

    #[test]
    fn test_duplicate_mid_rejected() {
        let sdp = parse_sdp(&SDP.replace("a=mid:video0", "a=mid:audio0")).unwrap();
        assert!(matches!(
            SdpMessageContext::from_sdp(&sdp, SdpType::Offer),
            Err(Error::MalformedInput(_))
        ));
    }

    #[test]
    fn test_fingerprint() {
        let sdp = parse_sdp(SDP).unwrap();
        let ctx = SdpMessageContext::from_sdp(&sdp, SdpType::Answer).unwrap();
        let fp = ctx.media_fingerprint();
        assert_eq!(fp[0].mid.as_deref(), Some("audio0"));
        assert!(!fp[0].rejected);
        assert!(fp[1].rejected);

        // fresh SDES keys leave the fingerprint alone
        let keyed = SDP.replace(
            "a=mid:audio0\r\n",
            "a=mid:audio0\r\na=crypto:1 AES_CM_128_HMAC_SHA1_80 inline:PS1uQCVeeCFCanVmcjkpPywjNWhcYD0mXXtxaVBR\r\n",
        );
        let keyed = SdpMessageContext::from_sdp(&parse_sdp(&keyed).unwrap(), SdpType::Answer).unwrap();
        assert_eq!(keyed.media_fingerprint(), fp);

        // a codec change does not
        let recoded = SDP.replace("RTP/AVP 0\r\n", "RTP/AVP 0 8\r\n");
        let recoded = SdpMessageContext::from_sdp(&parse_sdp(&recoded).unwrap(), SdpType::Answer).unwrap();
        assert_ne!(recoded.media_fingerprint(), fp);
    }
}
