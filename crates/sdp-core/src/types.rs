//! SDP document model
//!
//! The types in this module describe a parsed SDP document (RFC 8866) in the
//! shape the negotiation layer works with: an ordered list of media
//! descriptions, each carrying an ordered list of typed attributes.
//!
//! All types render back to wire format through [`std::fmt::Display`], using
//! `\r\n` line endings.

use crate::attributes::MediaDirection;
use serde::{Deserialize, Serialize};
use std::fmt;

/// `a=rtpmap:<payload type> <encoding name>/<clock rate>[/<encoding parameters>]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtpMapAttribute {
    pub payload_type: u8,
    pub encoding_name: String,
    pub clock_rate: u32,
    /// Channel count for audio, absent for video
    pub encoding_params: Option<String>,
}

impl fmt::Display for RtpMapAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.payload_type, self.encoding_name, self.clock_rate)?;
        if let Some(params) = &self.encoding_params {
            write!(f, "/{params}")?;
        }
        Ok(())
    }
}

/// `a=fmtp:<format> <format specific parameters>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FmtpAttribute {
    pub format: String,
    pub parameters: String,
}

/// `a=crypto:<tag> <crypto-suite> <key-params> [<session-params>]` (RFC 4568)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoAttribute {
    pub tag: u32,
    pub suite: String,
    /// Raw key parameters, e.g. `inline:<base64>|2^31|1:1`
    pub key_params: Vec<String>,
    pub session_params: Vec<String>,
}

impl fmt::Display for CryptoAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.tag, self.suite, self.key_params.join(";"))?;
        for param in &self.session_params {
            write!(f, " {param}")?;
        }
        Ok(())
    }
}

/// A typed SDP attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParsedAttribute {
    RtpMap(RtpMapAttribute),
    Fmtp(FmtpAttribute),
    Direction(MediaDirection),
    Ptime(u32),
    MaxPtime(u32),
    Setup(String),
    Mid(String),
    /// `a=group:<semantics> <mid>...`
    Group(String, Vec<String>),
    RtcpMux,
    /// `a=rtcp-fb:<payload|*> <type> [<parameter>]`
    RtcpFb(String, String, Option<String>),
    /// `a=extmap:<id>[/<direction>] <uri> [<attributes>]`
    ExtMap(u16, Option<String>, String, Option<String>),
    /// `a=sctpmap:<port> <application> <streams>`
    SctpMap(u16, String, u32),
    Crypto(CryptoAttribute),
    /// Property attribute without a value
    Flag(String),
    /// Any other `a=<name>:<value>` attribute
    Value(String, String),
}

impl ParsedAttribute {
    /// Attribute name, e.g. `"fmtp"` or `"sendonly"`
    pub fn key(&self) -> &str {
        match self {
            ParsedAttribute::RtpMap(_) => "rtpmap",
            ParsedAttribute::Fmtp(_) => "fmtp",
            ParsedAttribute::Direction(dir) => dir.as_str(),
            ParsedAttribute::Ptime(_) => "ptime",
            ParsedAttribute::MaxPtime(_) => "maxptime",
            ParsedAttribute::Setup(_) => "setup",
            ParsedAttribute::Mid(_) => "mid",
            ParsedAttribute::Group(..) => "group",
            ParsedAttribute::RtcpMux => "rtcp-mux",
            ParsedAttribute::RtcpFb(..) => "rtcp-fb",
            ParsedAttribute::ExtMap(..) => "extmap",
            ParsedAttribute::SctpMap(..) => "sctpmap",
            ParsedAttribute::Crypto(_) => "crypto",
            ParsedAttribute::Flag(name) => name,
            ParsedAttribute::Value(name, _) => name,
        }
    }

    /// Attribute value after the colon, if the attribute has one
    pub fn value(&self) -> Option<String> {
        match self {
            ParsedAttribute::RtpMap(rtpmap) => Some(rtpmap.to_string()),
            ParsedAttribute::Fmtp(fmtp) => Some(format!("{} {}", fmtp.format, fmtp.parameters)),
            ParsedAttribute::Direction(_) | ParsedAttribute::RtcpMux | ParsedAttribute::Flag(_) => None,
            ParsedAttribute::Ptime(v) | ParsedAttribute::MaxPtime(v) => Some(v.to_string()),
            ParsedAttribute::Setup(v) | ParsedAttribute::Mid(v) => Some(v.clone()),
            ParsedAttribute::Group(semantics, mids) => {
                let mut value = semantics.clone();
                for mid in mids {
                    value.push(' ');
                    value.push_str(mid);
                }
                Some(value)
            }
            ParsedAttribute::RtcpFb(pt, fb_type, param) => Some(match param {
                Some(param) => format!("{pt} {fb_type} {param}"),
                None => format!("{pt} {fb_type}"),
            }),
            ParsedAttribute::ExtMap(id, direction, uri, params) => {
                let mut value = id.to_string();
                if let Some(direction) = direction {
                    value.push('/');
                    value.push_str(direction);
                }
                value.push(' ');
                value.push_str(uri);
                if let Some(params) = params {
                    value.push(' ');
                    value.push_str(params);
                }
                Some(value)
            }
            ParsedAttribute::SctpMap(port, app, streams) => Some(format!("{port} {app} {streams}")),
            ParsedAttribute::Crypto(crypto) => Some(crypto.to_string()),
            ParsedAttribute::Value(_, value) => Some(value.clone()),
        }
    }

    pub fn is_direction(&self) -> bool {
        matches!(self, ParsedAttribute::Direction(_))
    }
}

impl fmt::Display for ParsedAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value() {
            Some(value) => write!(f, "a={}:{}", self.key(), value),
            None => write!(f, "a={}", self.key()),
        }
    }
}

/// `o=<username> <sess-id> <sess-version> <nettype> <addrtype> <unicast-address>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    pub username: String,
    pub sess_id: u64,
    pub sess_version: u64,
    pub net_type: String,
    pub addr_type: String,
    pub unicast_address: String,
}

impl Origin {
    pub fn new(
        username: impl Into<String>,
        sess_id: u64,
        sess_version: u64,
        addr_type: impl Into<String>,
        unicast_address: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            sess_id,
            sess_version,
            net_type: "IN".to_string(),
            addr_type: addr_type.into(),
            unicast_address: unicast_address.into(),
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "o={} {} {} {} {} {}",
            self.username, self.sess_id, self.sess_version, self.net_type, self.addr_type, self.unicast_address
        )
    }
}

/// `c=<nettype> <addrtype> <connection-address>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionData {
    pub net_type: String,
    pub addr_type: String,
    pub connection_address: String,
}

impl ConnectionData {
    pub fn new(addr_type: impl Into<String>, connection_address: impl Into<String>) -> Self {
        Self {
            net_type: "IN".to_string(),
            addr_type: addr_type.into(),
            connection_address: connection_address.into(),
        }
    }
}

impl fmt::Display for ConnectionData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c={} {} {}", self.net_type, self.addr_type, self.connection_address)
    }
}

/// `b=<bwtype>:<bandwidth>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bandwidth {
    pub bwtype: String,
    pub bandwidth: u32,
}

impl Bandwidth {
    pub fn new(bwtype: impl Into<String>, bandwidth: u32) -> Self {
        Self { bwtype: bwtype.into(), bandwidth }
    }
}

impl fmt::Display for Bandwidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b={}:{}", self.bwtype, self.bandwidth)
    }
}

/// `t=<start-time> <stop-time>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TimeDescription {
    pub start_time: u64,
    pub stop_time: u64,
}

impl fmt::Display for TimeDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t={} {}", self.start_time, self.stop_time)
    }
}

/// One `m=` section with its media-level lines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaDescription {
    /// Media kind: audio, video, application, ...
    pub media: String,
    pub port: u16,
    pub protocol: String,
    pub formats: Vec<String>,
    pub connection_info: Option<ConnectionData>,
    pub bandwidths: Vec<Bandwidth>,
    pub attributes: Vec<ParsedAttribute>,
}

impl MediaDescription {
    pub fn new(
        media: impl Into<String>,
        port: u16,
        protocol: impl Into<String>,
        formats: Vec<String>,
    ) -> Self {
        Self {
            media: media.into(),
            port,
            protocol: protocol.into(),
            formats,
            connection_info: None,
            bandwidths: Vec::new(),
            attributes: Vec::new(),
        }
    }

    /// A media line with port 0, meaning the stream is rejected or disabled
    pub fn rejected(media: impl Into<String>, protocol: impl Into<String>) -> Self {
        Self::new(media, 0, protocol, Vec::new())
    }

    pub fn is_rejected(&self) -> bool {
        self.port == 0
    }

    pub fn push_attribute(&mut self, attr: ParsedAttribute) {
        self.attributes.push(attr);
    }

    pub fn with_attribute(mut self, attr: ParsedAttribute) -> Self {
        self.attributes.push(attr);
        self
    }

    pub fn with_connection(mut self, connection: ConnectionData) -> Self {
        self.connection_info = Some(connection);
        self
    }

    pub fn with_bandwidth(mut self, bandwidth: Bandwidth) -> Self {
        self.bandwidths.push(bandwidth);
        self
    }

    /// Exact attribute match
    pub fn has_attribute(&self, attr: &ParsedAttribute) -> bool {
        self.attributes.iter().any(|a| a == attr)
    }

    pub fn has_attribute_key(&self, key: &str) -> bool {
        self.attributes.iter().any(|a| a.key() == key)
    }

    pub fn attributes_by_key<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a ParsedAttribute> + 'a {
        self.attributes.iter().filter(move |a| a.key() == key)
    }

    /// Value of the first `a=<key>:<value>` attribute
    pub fn attribute_value(&self, key: &str) -> Option<String> {
        self.attributes.iter().find(|a| a.key() == key).and_then(|a| a.value())
    }

    pub fn rtpmaps(&self) -> impl Iterator<Item = &RtpMapAttribute> {
        self.attributes.iter().filter_map(|a| match a {
            ParsedAttribute::RtpMap(rtpmap) => Some(rtpmap),
            _ => None,
        })
    }

    pub fn rtpmap(&self, format: &str) -> Option<&RtpMapAttribute> {
        self.rtpmaps().find(|r| r.payload_type.to_string() == format)
    }

    pub fn fmtps(&self) -> impl Iterator<Item = &FmtpAttribute> {
        self.attributes.iter().filter_map(|a| match a {
            ParsedAttribute::Fmtp(fmtp) => Some(fmtp),
            _ => None,
        })
    }

    pub fn fmtp(&self, format: &str) -> Option<&FmtpAttribute> {
        self.fmtps().find(|f| f.format == format)
    }

    pub fn sctpmaps(&self) -> impl Iterator<Item = (u16, &str, u32)> {
        self.attributes.iter().filter_map(|a| match a {
            ParsedAttribute::SctpMap(port, app, streams) => Some((*port, app.as_str(), *streams)),
            _ => None,
        })
    }

    pub fn crypto_attributes(&self) -> impl Iterator<Item = &CryptoAttribute> {
        self.attributes.iter().filter_map(|a| match a {
            ParsedAttribute::Crypto(crypto) => Some(crypto),
            _ => None,
        })
    }

    /// Explicit direction attribute, if any
    pub fn direction(&self) -> Option<MediaDirection> {
        self.attributes.iter().find_map(|a| match a {
            ParsedAttribute::Direction(dir) => Some(*dir),
            _ => None,
        })
    }

    pub fn mid(&self) -> Option<&str> {
        self.attributes.iter().find_map(|a| match a {
            ParsedAttribute::Mid(mid) => Some(mid.as_str()),
            _ => None,
        })
    }

    /// Replaces any existing mid with `mid`
    pub fn set_mid(&mut self, mid: impl Into<String>) {
        self.attributes.retain(|a| !matches!(a, ParsedAttribute::Mid(_)));
        self.attributes.push(ParsedAttribute::Mid(mid.into()));
    }
}

impl fmt::Display for MediaDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m={} {} {}", self.media, self.port, self.protocol)?;
        for format in &self.formats {
            write!(f, " {format}")?;
        }
        f.write_str("\r\n")?;
        if let Some(connection) = &self.connection_info {
            write!(f, "{connection}\r\n")?;
        }
        for bandwidth in &self.bandwidths {
            write!(f, "{bandwidth}\r\n")?;
        }
        for attr in &self.attributes {
            write!(f, "{attr}\r\n")?;
        }
        Ok(())
    }
}

/// A complete SDP session description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdpSession {
    pub version: String,
    pub origin: Origin,
    pub session_name: String,
    pub connection_info: Option<ConnectionData>,
    pub bandwidths: Vec<Bandwidth>,
    pub time_descriptions: Vec<TimeDescription>,
    /// Session-level attributes
    pub generic_attributes: Vec<ParsedAttribute>,
    pub media_descriptions: Vec<MediaDescription>,
}

impl SdpSession {
    pub fn new(origin: Origin, session_name: impl Into<String>) -> Self {
        Self {
            version: "0".to_string(),
            origin,
            session_name: session_name.into(),
            connection_info: None,
            bandwidths: Vec::new(),
            time_descriptions: vec![TimeDescription::default()],
            generic_attributes: Vec::new(),
            media_descriptions: Vec::new(),
        }
    }

    pub fn with_connection(mut self, connection: ConnectionData) -> Self {
        self.connection_info = Some(connection);
        self
    }

    pub fn with_media(mut self, media: MediaDescription) -> Self {
        self.media_descriptions.push(media);
        self
    }

    pub fn add_attribute(&mut self, attr: ParsedAttribute) {
        self.generic_attributes.push(attr);
    }

    /// Session-level `a=group` attributes as `(semantics, mids)`
    pub fn groups(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.generic_attributes.iter().filter_map(|a| match a {
            ParsedAttribute::Group(semantics, mids) => Some((semantics.as_str(), mids.as_slice())),
            _ => None,
        })
    }

    /// Wire form as bytes, ready to be placed in a message body
    pub fn to_bytes(&self) -> bytes::Bytes {
        bytes::Bytes::from(self.to_string())
    }
}

impl fmt::Display for SdpSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v={}\r\n", self.version)?;
        write!(f, "{}\r\n", self.origin)?;
        write!(f, "s={}\r\n", self.session_name)?;
        if let Some(connection) = &self.connection_info {
            write!(f, "{connection}\r\n")?;
        }
        for bandwidth in &self.bandwidths {
            write!(f, "{bandwidth}\r\n")?;
        }
        for time in &self.time_descriptions {
            write!(f, "{time}\r\n")?;
        }
        for attr in &self.generic_attributes {
            write!(f, "{attr}\r\n")?;
        }
        for media in &self.media_descriptions {
            write!(f, "{media}")?;
        }
        Ok(())
    }
}
