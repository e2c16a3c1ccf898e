//! SDP endpoint
//!
//! Creates [`MediaSession`]s from an [`EndpointConfig`] and drives them with
//! SDP text, the way a signalling layer uses the negotiation engine.

use crate::agent::{HandlerId, SdpAgent};
use crate::config::EndpointConfig;
use crate::error::{Error, Result};
use crate::extension::SdesExtension;
use crate::handler::{MediaHandler, MediaProfile};
use crate::payload::{DynamicPayloadManager, SharedPayloadManager};
use crate::session::MediaSession;
use dashmap::DashMap;
use parking_lot::RwLock;
use rvoip_sdp_core::parse_sdp;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

pub struct SdpEndpoint {
    config: RwLock<EndpointConfig>,
    sessions: DashMap<Uuid, Arc<MediaSession>>,
}

impl SdpEndpoint {
    pub fn new(config: EndpointConfig) -> Result<Self> {
        config.validate().map_err(Error::config)?;
        Ok(Self {
            config: RwLock::new(config),
            sessions: DashMap::new(),
        })
    }

    /// Snapshot of the current configuration
    pub fn config(&self) -> EndpointConfig {
        self.config.read().clone()
    }

    pub fn max_audio_recv_bandwidth(&self) -> u32 {
        self.config.read().max_audio_recv_bandwidth
    }

    /// Applies to sessions created afterwards
    pub fn set_max_audio_recv_bandwidth(&self, kbps: u32) {
        self.config.write().max_audio_recv_bandwidth = kbps;
    }

    pub fn max_video_recv_bandwidth(&self) -> u32 {
        self.config.read().max_video_recv_bandwidth
    }

    /// Applies to sessions created afterwards
    pub fn set_max_video_recv_bandwidth(&self, kbps: u32) {
        self.config.write().max_video_recv_bandwidth = kbps;
    }

    fn rtp_handler(
        config: &EndpointConfig,
        manager: &SharedPayloadManager,
        kind: &str,
    ) -> Result<MediaHandler> {
        let mut handler = MediaHandler::new(config.profile);
        handler.set_payload_manager(Arc::clone(manager))?;
        handler.set_rtcp_mux(config.rtcp_mux)?;

        let (codecs, bandwidth) = match kind {
            "audio" => (&config.audio_codecs, config.max_audio_recv_bandwidth),
            _ => (&config.video_codecs, config.max_video_recv_bandwidth),
        };
        for codec in codecs {
            match kind {
                "audio" => handler.add_audio_codec(codec)?,
                _ => handler.add_video_codec(codec)?,
            };
        }
        if bandwidth > 0 {
            handler.add_bandwidth("AS", bandwidth);
        }
        if matches!(config.profile, MediaProfile::Savp | MediaProfile::Savpf) {
            handler.add_extension(Box::new(SdesExtension::default()));
        }
        Ok(handler)
    }

    fn build_agent(config: &EndpointConfig) -> Result<SdpAgent> {
        let mut agent = SdpAgent::new(config.agent.clone());
        // Audio and video share one payload space so they can be bundled
        let manager = DynamicPayloadManager::new().shared();
        let mut members: Vec<HandlerId> = Vec::new();

        if !config.audio_codecs.is_empty() {
            let handler = Self::rtp_handler(config, &manager, "audio")?;
            members.push(agent.add_handler("audio", handler)?);
        }
        if !config.video_codecs.is_empty() {
            let handler = Self::rtp_handler(config, &manager, "video")?;
            members.push(agent.add_handler("video", handler)?);
        }
        if config.data_channels {
            members.push(agent.add_handler("application", MediaHandler::sctp())?);
        }

        if config.bundle && !members.is_empty() {
            let group = agent.create_bundle_group()?;
            for id in members {
                agent.add_handler_to_group(group, id)?;
            }
        }
        Ok(agent)
    }

    /// Creates a session configured from the current endpoint settings
    pub fn create_session(&self) -> Result<Uuid> {
        let config = self.config();
        let session = MediaSession::new(Self::build_agent(&config)?);
        let id = session.id();
        self.sessions.insert(id, Arc::new(session));
        info!("Created session {} ({} active)", id, self.sessions.len());
        Ok(id)
    }

    pub fn session(&self, id: &Uuid) -> Option<Arc<MediaSession>> {
        self.sessions.get(id).map(|s| Arc::clone(s.value()))
    }

    fn get(&self, id: &Uuid) -> Result<Arc<MediaSession>> {
        self.session(id).ok_or_else(|| Error::not_found(format!("session {id}")))
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn generate_offer(&self, id: &Uuid) -> Result<String> {
        let offer = self.get(id)?.generate_offer()?;
        Ok(offer.to_string())
    }

    /// Returns the answer to `offer`
    pub fn process_offer(&self, id: &Uuid, offer: &str) -> Result<String> {
        let session = self.get(id)?;
        let offer = parse_sdp(offer)?;
        let answer = session.process_offer(&offer)?;
        Ok(answer.to_string())
    }

    /// Returns the local description that `answer` completed
    pub fn process_answer(&self, id: &Uuid, answer: &str) -> Result<String> {
        let session = self.get(id)?;
        let answer = parse_sdp(answer)?;
        session.process_answer(&answer)?;
        session
            .local_sdp()?
            .map(|sdp| sdp.to_string())
            .ok_or_else(|| Error::not_found(format!("local description of session {id}")))
    }

    pub fn local_session_descriptor(&self, id: &Uuid) -> Result<Option<String>> {
        Ok(self.get(id)?.local_sdp()?.map(|sdp| sdp.to_string()))
    }

    pub fn remote_session_descriptor(&self, id: &Uuid) -> Result<Option<String>> {
        Ok(self.get(id)?.remote_sdp()?.map(|sdp| sdp.to_string()))
    }

    pub fn release_session(&self, id: &Uuid) -> Result<()> {
        self.sessions
            .remove(id)
            .map(|_| debug!("Released session {}", id))
            .ok_or_else(|| Error::not_found(format!("session {id}")))
    }
}
