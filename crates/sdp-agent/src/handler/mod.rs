//! Media handlers
//!
//! A [`MediaHandler`] knows how to offer and answer one m-line for one
//! protocol family. The family is a closed set ([`MediaProfile`]); what a
//! handler actually offers is its protocol-specific [`Capabilities`] plus
//! any attached [`MediaExtension`]s.

use crate::error::{Error, Result};
use crate::extension::MediaExtension;
use crate::payload::SharedPayloadManager;
use rvoip_sdp_core::{Bandwidth, ConnectionData, MediaDescription, MediaDirection};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

pub mod rtp;
pub mod sctp;

pub use rtp::{PayloadEntry, RtpCapabilities};
pub use sctp::SctpCapabilities;

/// Port written in generated m-lines; the transport fills in real candidates
pub const DEFAULT_PORT: u16 = 9;

/// Protocol family served by a handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaProfile {
    /// RTP/AVP
    Avp,
    /// RTP/AVPF
    Avpf,
    /// RTP/SAVP
    Savp,
    /// RTP/SAVPF
    Savpf,
    /// SCTP over DTLS for data channels
    Sctp,
}

impl MediaProfile {
    /// Protocol token used in offers
    pub fn protocol(&self) -> &'static str {
        match self {
            MediaProfile::Avp => "RTP/AVP",
            MediaProfile::Avpf => "RTP/AVPF",
            MediaProfile::Savp => "RTP/SAVP",
            MediaProfile::Savpf => "RTP/SAVPF",
            MediaProfile::Sctp => "DTLS/SCTP",
        }
    }

    /// Protocols this profile can answer. The answer echoes the offered token.
    pub fn managed_protocols(&self) -> &'static [&'static str] {
        match self {
            MediaProfile::Avp => &["RTP/AVP"],
            MediaProfile::Avpf => &["RTP/AVPF", "RTP/AVP"],
            MediaProfile::Savp => &["RTP/SAVP"],
            MediaProfile::Savpf => &["RTP/SAVPF", "UDP/TLS/RTP/SAVPF", "RTP/SAVP"],
            MediaProfile::Sctp => &["DTLS/SCTP", "UDP/DTLS/SCTP", "TCP/DTLS/SCTP"],
        }
    }

    pub fn manages(&self, protocol: &str) -> bool {
        self.managed_protocols().iter().any(|p| p.eq_ignore_ascii_case(protocol))
    }

    pub fn is_rtp(&self) -> bool {
        !matches!(self, MediaProfile::Sctp)
    }

    /// Profiles that carry RTCP feedback messages
    pub fn has_feedback(&self) -> bool {
        matches!(self, MediaProfile::Avpf | MediaProfile::Savpf)
    }

    pub fn supports_kind(&self, kind: &str) -> bool {
        match self {
            MediaProfile::Sctp => kind == "application",
            _ => matches!(kind, "audio" | "video"),
        }
    }
}

impl fmt::Display for MediaProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.protocol())
    }
}

/// Address the agent generates descriptions for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalAddress {
    pub use_ipv6: bool,
    pub address: String,
}

impl LocalAddress {
    pub fn addr_type(&self) -> &'static str {
        if self.use_ipv6 { "IP6" } else { "IP4" }
    }

    pub fn connection(&self) -> ConnectionData {
        ConnectionData::new(self.addr_type(), self.address.clone())
    }
}

/// Protocol-specific state of a handler
#[derive(Debug, Clone)]
pub enum Capabilities {
    Rtp(RtpCapabilities),
    Sctp(SctpCapabilities),
}

/// One configured media capability.
///
/// Handlers are registered into an agent by value; extensions keep their
/// observable state behind `Arc`s so a clone still reports to the same place.
#[derive(Debug, Clone)]
pub struct MediaHandler {
    profile: MediaProfile,
    addr: Option<LocalAddress>,
    bandwidths: Vec<Bandwidth>,
    extensions: Vec<Box<dyn MediaExtension>>,
    direction: MediaDirection,
    capabilities: Capabilities,
}

impl MediaHandler {
    fn with_profile(profile: MediaProfile) -> Self {
        let capabilities = match profile {
            MediaProfile::Sctp => Capabilities::Sctp(SctpCapabilities::default()),
            _ => Capabilities::Rtp(RtpCapabilities::default()),
        };
        Self {
            profile,
            addr: None,
            bandwidths: Vec::new(),
            extensions: Vec::new(),
            direction: MediaDirection::SendRecv,
            capabilities,
        }
    }

    pub fn rtp_avp() -> Self {
        Self::with_profile(MediaProfile::Avp)
    }

    pub fn rtp_avpf() -> Self {
        Self::with_profile(MediaProfile::Avpf)
    }

    pub fn rtp_savp() -> Self {
        Self::with_profile(MediaProfile::Savp)
    }

    pub fn rtp_savpf() -> Self {
        Self::with_profile(MediaProfile::Savpf)
    }

    pub fn sctp() -> Self {
        Self::with_profile(MediaProfile::Sctp)
    }

    pub fn new(profile: MediaProfile) -> Self {
        Self::with_profile(profile)
    }

    pub fn profile(&self) -> MediaProfile {
        self.profile
    }

    pub fn protocol(&self) -> &'static str {
        self.profile.protocol()
    }

    pub fn manages(&self, protocol: &str) -> bool {
        self.profile.manages(protocol)
    }

    /// Overrides the agent address for this media (adds a media-level `c=`)
    pub fn set_addr(&mut self, use_ipv6: bool, address: impl Into<String>) {
        self.addr = Some(LocalAddress {
            use_ipv6,
            address: address.into(),
        });
    }

    pub fn add_bandwidth(&mut self, bwtype: impl Into<String>, value: u32) {
        let bwtype = bwtype.into();
        self.bandwidths.retain(|b| b.bwtype != bwtype);
        self.bandwidths.push(Bandwidth::new(bwtype, value));
    }

    pub fn bandwidths(&self) -> &[Bandwidth] {
        &self.bandwidths
    }

    pub fn add_extension(&mut self, extension: Box<dyn MediaExtension>) {
        debug!("Adding {} extension to {} handler", extension.name(), self.profile);
        self.extensions.push(extension);
    }

    pub fn extensions(&self) -> &[Box<dyn MediaExtension>] {
        &self.extensions
    }

    pub fn set_direction(&mut self, direction: MediaDirection) {
        self.direction = direction;
    }

    pub fn direction(&self) -> MediaDirection {
        self.direction
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn rtp(&self) -> Option<&RtpCapabilities> {
        match &self.capabilities {
            Capabilities::Rtp(rtp) => Some(rtp),
            Capabilities::Sctp(_) => None,
        }
    }

    fn rtp_mut(&mut self) -> Result<&mut RtpCapabilities> {
        match &mut self.capabilities {
            Capabilities::Rtp(rtp) => Ok(rtp),
            Capabilities::Sctp(_) => Err(Error::InvalidArgument(format!(
                "{} handler has no RTP capabilities",
                self.profile
            ))),
        }
    }

    pub fn sctp_capabilities_mut(&mut self) -> Result<&mut SctpCapabilities> {
        match &mut self.capabilities {
            Capabilities::Sctp(sctp) => Ok(sctp),
            Capabilities::Rtp(_) => Err(Error::InvalidArgument(format!(
                "{} handler has no SCTP capabilities",
                self.profile
            ))),
        }
    }

    pub fn set_payload_manager(&mut self, manager: SharedPayloadManager) -> Result<()> {
        self.rtp_mut()?.set_payload_manager(manager);
        Ok(())
    }

    /// Adds an audio codec (`"opus/48000/2"`), returning its payload type
    pub fn add_audio_codec(&mut self, codec: &str) -> Result<u8> {
        self.rtp_mut()?.add_codec("audio", codec)
    }

    /// Adds a video codec (`"VP8/90000"`), returning its payload type
    pub fn add_video_codec(&mut self, codec: &str) -> Result<u8> {
        self.rtp_mut()?.add_codec("video", codec)
    }

    /// Adds an audio payload with a caller-chosen dynamic payload type
    pub fn add_generic_audio_payload(&mut self, payload_type: u8, codec: &str) -> Result<()> {
        self.rtp_mut()?.add_generic_payload("audio", payload_type, codec)
    }

    /// Adds a video payload with a caller-chosen dynamic payload type
    pub fn add_generic_video_payload(&mut self, payload_type: u8, codec: &str) -> Result<()> {
        self.rtp_mut()?.add_generic_payload("video", payload_type, codec)
    }

    /// Format parameters offered for `payload_type`
    pub fn add_fmtp(&mut self, payload_type: u8, parameters: &str) -> Result<()> {
        self.rtp_mut()?.add_fmtp(payload_type, parameters)
    }

    pub fn add_extmap(&mut self, id: u16, uri: &str) -> Result<()> {
        self.rtp_mut()?.extmaps.add(id, uri)
    }

    pub fn allocate_extmap(&mut self, uri: &str) -> Result<u16> {
        self.rtp_mut()?.extmaps.allocate(uri)
    }

    pub fn set_rtcp_mux(&mut self, enabled: bool) -> Result<()> {
        self.rtp_mut()?.rtcp_mux = enabled;
        Ok(())
    }

    pub fn set_nack(&mut self, enabled: bool) -> Result<()> {
        self.rtp_mut()?.nack = enabled;
        Ok(())
    }

    pub fn set_goog_remb(&mut self, enabled: bool) -> Result<()> {
        self.rtp_mut()?.goog_remb = enabled;
        Ok(())
    }

    fn apply_common(&self, media: &mut MediaDescription) {
        if let Some(addr) = &self.addr {
            media.connection_info = Some(addr.connection());
        }
        media.bandwidths.extend(self.bandwidths.iter().cloned());
    }

    /// Builds the offered m-line for `kind`
    pub fn create_offer(&self, kind: &str) -> Result<MediaDescription> {
        if !self.profile.supports_kind(kind) {
            return Err(Error::UnsupportedMedia(format!("{} handler cannot offer {kind}", self.profile)));
        }

        let mut media = match &self.capabilities {
            Capabilities::Rtp(rtp) => rtp.create_offer(kind, self.profile, self.direction)?,
            Capabilities::Sctp(sctp) => sctp.create_offer(kind, self.profile, self.direction),
        };
        self.apply_common(&mut media);

        for ext in &self.extensions {
            if let Err(e) = ext.add_offer_attributes(&mut media) {
                warn!("Extension {} failed to add offer attributes: {}", ext.name(), e);
            }
        }
        Ok(media)
    }

    /// Builds the answer to one offered m-line.
    ///
    /// Returns `ProtocolMismatch` or `UnsupportedMedia` when the media cannot
    /// be accepted, including when an extension refuses it; the agent turns
    /// those into a rejected m-line.
    pub fn create_answer(&self, offer: &MediaDescription) -> Result<MediaDescription> {
        if !self.profile.supports_kind(&offer.media) {
            return Err(Error::UnsupportedMedia(format!(
                "{} handler cannot answer {}",
                self.profile, offer.media
            )));
        }
        if !self.manages(&offer.protocol) {
            return Err(Error::ProtocolMismatch {
                expected: self.protocol().to_string(),
                offered: offer.protocol.clone(),
            });
        }

        let mut media = match &self.capabilities {
            Capabilities::Rtp(rtp) => {
                rtp.create_answer(offer, self.profile, self.direction, &self.extensions)?
            }
            Capabilities::Sctp(sctp) => sctp.create_answer(offer, self.direction, &self.extensions)?,
        };
        self.apply_common(&mut media);

        for ext in &self.extensions {
            match ext.add_answer_attributes(offer, &mut media) {
                Ok(()) => {}
                // e.g. no acceptable SRTP key: the media cannot be accepted
                Err(e) if e.is_recoverable() => return Err(e),
                Err(e) => warn!("Extension {} failed to add answer attributes: {}", ext.name(), e),
            }
        }
        Ok(media)
    }

    /// Lets extensions observe the answer to a media this handler offered
    pub fn process_answer(&self, answer: &MediaDescription) {
        for ext in &self.extensions {
            if let Err(e) = ext.process_answer_attributes(answer) {
                warn!("Extension {} failed to process answer: {}", ext.name(), e);
            }
        }
    }
}
