//! Agent and endpoint configuration
//!
//! Both structs are plain serde types with defaults, so they can be filled
//! from JSON and partially overridden.

use crate::codec::Codec;
use crate::error::{Error, Result};
use crate::handler::MediaProfile;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Configuration of one [`SdpAgent`](crate::agent::SdpAgent)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Generate IP6 addresses instead of IP4
    pub use_ipv6: bool,

    /// Address written in `o=` and `c=`; unspecified address when unset
    pub addr: Option<String>,

    /// `s=` line
    pub session_name: String,

    /// Username of the `o=` line
    pub username: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            use_ipv6: false,
            addr: None,
            session_name: "-".to_string(),
            username: "-".to_string(),
        }
    }
}

impl AgentConfig {
    /// Validate the configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if let Some(addr) = &self.addr {
            if addr.is_empty() || addr.contains(char::is_whitespace) {
                return Err(format!("invalid address '{addr}'"));
            }
            if let Ok(ip) = addr.parse::<IpAddr>() {
                if ip.is_ipv6() != self.use_ipv6 {
                    return Err(format!("address {addr} does not match use_ipv6={}", self.use_ipv6));
                }
            }
        }

        if self.session_name.is_empty() {
            return Err("session_name cannot be empty".to_string());
        }
        if self.username.is_empty() || self.username.contains(char::is_whitespace) {
            return Err("username must be a non-empty token".to_string());
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate().map_err(Error::config)?;
        Ok(config)
    }
}

/// Configuration of an [`SdpEndpoint`](crate::endpoint::SdpEndpoint) and
/// the sessions it creates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Agent settings used for every session
    pub agent: AgentConfig,

    /// Audio codecs in preference order, as `name/rate[/channels]`
    pub audio_codecs: Vec<String>,

    /// Video codecs in preference order
    pub video_codecs: Vec<String>,

    /// RTP profile of the audio and video handlers
    pub profile: MediaProfile,

    /// Put audio and video in one BUNDLE group
    pub bundle: bool,

    /// Offer an SCTP data channel
    pub data_channels: bool,

    /// Offer and accept rtcp-mux
    pub rtcp_mux: bool,

    /// `b=AS` on audio, in kbps; 0 means unlimited
    pub max_audio_recv_bandwidth: u32,

    /// `b=AS` on video, in kbps; 0 means unlimited
    pub max_video_recv_bandwidth: u32,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            agent: AgentConfig::default(),
            audio_codecs: vec![
                "opus/48000/2".to_string(),
                "PCMU/8000/1".to_string(),
                "PCMA/8000/1".to_string(),
            ],
            video_codecs: vec!["VP8/90000".to_string(), "H264/90000".to_string()],
            profile: MediaProfile::Avpf,
            bundle: true,
            data_channels: false,
            rtcp_mux: true,
            max_audio_recv_bandwidth: 0,
            max_video_recv_bandwidth: 0,
        }
    }
}

impl EndpointConfig {
    /// Validate the configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        self.agent.validate()?;

        if !self.profile.is_rtp() {
            return Err(format!("{} is not an RTP profile", self.profile));
        }
        if self.audio_codecs.is_empty() && self.video_codecs.is_empty() && !self.data_channels {
            return Err("no media configured".to_string());
        }
        for codec in self.audio_codecs.iter().chain(&self.video_codecs) {
            codec
                .parse::<Codec>()
                .map_err(|e| format!("invalid codec '{codec}': {e}"))?;
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate().map_err(Error::config)?;
        Ok(config)
    }
}
