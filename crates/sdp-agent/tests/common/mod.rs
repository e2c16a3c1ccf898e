//! Helpers shared by the integration tests

#![allow(dead_code)]

use rvoip_sdp_agent::{DynamicPayloadManager, MediaHandler, SdpAgent};
use rvoip_sdp_core::{parse_sdp, MediaDescription, SdpSession};
use tracing_subscriber::EnvFilter;

pub const OFFERER_ADDR: &str = "222.222.222.222";
pub const ANSWERER_ADDR: &str = "111.111.111.111";

pub const AUDIO_CODECS: &[&str] = &["PCMU/8000/1", "opus/48000/2", "AMR/8000/1"];
pub const VIDEO_CODECS: &[&str] = &["H263-1998/90000", "VP8/90000", "MP4V-ES/90000", "H264/90000"];

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Audio and video codecs on one handler with its own payload space
pub fn set_default_codecs(handler: &mut MediaHandler) {
    handler
        .set_payload_manager(DynamicPayloadManager::new().shared())
        .unwrap();
    for codec in AUDIO_CODECS {
        handler.add_audio_codec(codec).unwrap();
    }
    for codec in VIDEO_CODECS {
        handler.add_video_codec(codec).unwrap();
    }
}

pub fn avp_handler() -> MediaHandler {
    let mut handler = MediaHandler::rtp_avp();
    set_default_codecs(&mut handler);
    handler
}

pub fn avpf_handler() -> MediaHandler {
    let mut handler = MediaHandler::rtp_avpf();
    set_default_codecs(&mut handler);
    handler
}

pub fn offerer() -> SdpAgent {
    SdpAgent::with_address(false, OFFERER_ADDR)
}

pub fn answerer() -> SdpAgent {
    SdpAgent::with_address(false, ANSWERER_ADDR)
}

/// Sends `sdp` through its text form, as a peer would receive it
pub fn over_the_wire(sdp: &SdpSession) -> SdpSession {
    parse_sdp(&sdp.to_string()).unwrap()
}

/// Answer to `offer` from `answerer`, committed as its local description
pub fn answer_offer(answerer: &mut SdpAgent, offer: &SdpSession) -> SdpSession {
    answerer.set_remote_description(&over_the_wire(offer)).unwrap();
    let answer = answerer.create_answer().unwrap();
    answerer.set_local_description(&answer).unwrap();
    answer
}

/// Runs a complete offer/answer round and returns (offer, answer)
pub fn negotiate(offerer: &mut SdpAgent, answerer: &mut SdpAgent) -> (SdpSession, SdpSession) {
    let offer = offerer.create_offer().unwrap();
    offerer.set_local_description(&offer).unwrap();
    let answer = answer_offer(answerer, &offer);
    offerer.set_remote_description(&over_the_wire(&answer)).unwrap();
    (offer, answer)
}

pub fn formats(media: &MediaDescription) -> Vec<&str> {
    media.formats.iter().map(String::as_str).collect()
}

pub fn mids(sdp: &SdpSession) -> Vec<Option<&str>> {
    sdp.media_descriptions.iter().map(|m| m.mid()).collect()
}

/// `(kind, active)` per media line
pub fn layout(sdp: &SdpSession) -> Vec<(&str, bool)> {
    sdp.media_descriptions
        .iter()
        .map(|m| (m.media.as_str(), !m.is_rejected()))
        .collect()
}

pub fn groups(sdp: &SdpSession) -> Vec<(String, Vec<String>)> {
    sdp.groups()
        .map(|(semantics, mids)| (semantics.to_string(), mids.to_vec()))
        .collect()
}
