//! Codec descriptions and the RFC 3551 static payload table

use crate::error::{Error, Result};
use rvoip_sdp_core::RtpMapAttribute;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An RTP encoding as written in rtpmap lines: `<name>/<clock rate>[/<channels>]`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Codec {
    pub name: String,
    pub clock_rate: u32,
    pub channels: Option<u32>,
}

impl Codec {
    pub fn new(name: impl Into<String>, clock_rate: u32, channels: Option<u32>) -> Self {
        Self {
            name: name.into(),
            clock_rate,
            channels,
        }
    }

    /// Same encoding name (case-insensitive), clock rate and channel count.
    /// A missing channel count counts as one channel.
    pub fn matches(&self, other: &Codec) -> bool {
        self.name.eq_ignore_ascii_case(&other.name)
            && self.clock_rate == other.clock_rate
            && self.channels.unwrap_or(1) == other.channels.unwrap_or(1)
    }

    pub fn from_rtpmap(rtpmap: &RtpMapAttribute) -> Self {
        Self {
            name: rtpmap.encoding_name.clone(),
            clock_rate: rtpmap.clock_rate,
            channels: rtpmap.encoding_params.as_deref().and_then(|p| p.parse().ok()),
        }
    }

    pub fn to_rtpmap(&self, payload_type: u8) -> RtpMapAttribute {
        RtpMapAttribute {
            payload_type,
            encoding_name: self.name.clone(),
            clock_rate: self.clock_rate,
            encoding_params: self.channels.map(|c| c.to_string()),
        }
    }

    /// Static payload type assigned to this codec by RFC 3551, if any
    pub fn static_payload_type(&self) -> Option<u8> {
        STATIC_PAYLOADS
            .iter()
            .find(|(_, name, rate, channels)| self.matches(&Codec::new(*name, *rate, *channels)))
            .map(|(pt, ..)| *pt)
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.clock_rate)?;
        if let Some(channels) = self.channels {
            write!(f, "/{channels}")?;
        }
        Ok(())
    }
}

impl FromStr for Codec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidArgument(format!("Invalid codec description: {s}"));
        let mut parts = s.trim().split('/');

        let name = parts.next().filter(|n| !n.is_empty()).ok_or_else(invalid)?;
        let clock_rate = parts.next().and_then(|r| r.parse().ok()).ok_or_else(invalid)?;
        let channels = match parts.next() {
            Some(c) => Some(c.parse().map_err(|_| invalid())?),
            None => None,
        };
        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(Codec::new(name, clock_rate, channels))
    }
}

/// RFC 3551 static payload types: (payload type, name, clock rate, channels)
const STATIC_PAYLOADS: &[(u8, &str, u32, Option<u32>)] = &[
    (0, "PCMU", 8000, Some(1)),
    (3, "GSM", 8000, Some(1)),
    (4, "G723", 8000, Some(1)),
    (5, "DVI4", 8000, Some(1)),
    (6, "DVI4", 16000, Some(1)),
    (7, "LPC", 8000, Some(1)),
    (8, "PCMA", 8000, Some(1)),
    (9, "G722", 8000, Some(1)),
    (10, "L16", 44100, Some(2)),
    (11, "L16", 44100, Some(1)),
    (12, "QCELP", 8000, Some(1)),
    (13, "CN", 8000, Some(1)),
    (14, "MPA", 90000, None),
    (15, "G728", 8000, Some(1)),
    (16, "DVI4", 11025, Some(1)),
    (17, "DVI4", 22050, Some(1)),
    (18, "G729", 8000, Some(1)),
    (25, "CelB", 90000, None),
    (26, "JPEG", 90000, None),
    (28, "nv", 90000, None),
    (31, "H261", 90000, None),
    (32, "MPV", 90000, None),
    (33, "MP2T", 90000, None),
    (34, "H263", 90000, None),
];

/// Codec implied by a static payload type
pub fn static_codec(payload_type: u8) -> Option<Codec> {
    STATIC_PAYLOADS
        .iter()
        .find(|(pt, ..)| *pt == payload_type)
        .map(|(_, name, rate, channels)| Codec::new(*name, *rate, *channels))
}
