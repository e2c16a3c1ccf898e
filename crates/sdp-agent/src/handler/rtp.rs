//! RTP capabilities: codec tables, header extensions and RTCP options

use super::{DEFAULT_PORT, MediaProfile};
use crate::codec::{Codec, static_codec};
use crate::error::{Error, Result};
use crate::extension::MediaExtension;
use crate::payload::{DYNAMIC_PAYLOAD_RANGE, ExtmapRegistry, SharedPayloadManager, assign_payload};
use crate::policy;
use rvoip_sdp_core::{FmtpAttribute, MediaDescription, MediaDirection, ParsedAttribute};
use tracing::{debug, trace};

/// A payload type offered by a handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadEntry {
    pub payload_type: u8,
    pub codec: Codec,
    pub fmtp: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RtpCapabilities {
    audio: Vec<PayloadEntry>,
    video: Vec<PayloadEntry>,
    payload_manager: Option<SharedPayloadManager>,
    pub(crate) extmaps: ExtmapRegistry,
    pub(crate) rtcp_mux: bool,
    pub(crate) nack: bool,
    pub(crate) goog_remb: bool,
}

impl Default for RtpCapabilities {
    fn default() -> Self {
        Self {
            audio: Vec::new(),
            video: Vec::new(),
            payload_manager: None,
            extmaps: ExtmapRegistry::new(),
            rtcp_mux: true,
            nack: true,
            goog_remb: true,
        }
    }
}

impl RtpCapabilities {
    pub fn set_payload_manager(&mut self, manager: SharedPayloadManager) {
        self.payload_manager = Some(manager);
    }

    /// Payloads configured for `kind`, in offer order
    pub fn entries(&self, kind: &str) -> &[PayloadEntry] {
        match kind {
            "audio" => &self.audio,
            "video" => &self.video,
            _ => &[],
        }
    }

    fn entries_mut(&mut self, kind: &str) -> Result<&mut Vec<PayloadEntry>> {
        match kind {
            "audio" => Ok(&mut self.audio),
            "video" => Ok(&mut self.video),
            other => Err(Error::UnsupportedMedia(format!("RTP handlers carry audio or video, not {other}"))),
        }
    }

    pub fn extmaps(&self) -> &ExtmapRegistry {
        &self.extmaps
    }

    pub fn rtcp_mux(&self) -> bool {
        self.rtcp_mux
    }

    pub(crate) fn add_codec(&mut self, kind: &str, description: &str) -> Result<u8> {
        let codec: Codec = description.parse()?;
        if self.entries(kind).iter().any(|e| e.codec.matches(&codec)) {
            return Err(Error::DuplicateCodec(codec.to_string()));
        }

        let payload_type = assign_payload(self.payload_manager.as_ref(), &codec)?;
        debug!("Added {} codec {} as payload {}", kind, codec, payload_type);
        self.entries_mut(kind)?.push(PayloadEntry {
            payload_type,
            codec,
            fmtp: None,
        });
        Ok(payload_type)
    }

    pub(crate) fn add_generic_payload(&mut self, kind: &str, payload_type: u8, description: &str) -> Result<()> {
        let codec: Codec = description.parse()?;
        if let Some(pt) = codec.static_payload_type() {
            return Err(Error::StaticCodecConflict(format!("{codec} uses static payload {pt}")));
        }
        if !DYNAMIC_PAYLOAD_RANGE.contains(&payload_type) {
            return Err(Error::InvalidArgument(format!("{payload_type} is not a dynamic payload type")));
        }
        if self
            .entries(kind)
            .iter()
            .any(|e| e.payload_type == payload_type || e.codec.matches(&codec))
        {
            return Err(Error::DuplicateCodec(format!("{payload_type} {codec}")));
        }

        if let Some(manager) = &self.payload_manager {
            manager.lock().register_dynamic_payload(payload_type)?;
        }
        self.entries_mut(kind)?.push(PayloadEntry {
            payload_type,
            codec,
            fmtp: None,
        });
        Ok(())
    }

    pub(crate) fn add_fmtp(&mut self, payload_type: u8, parameters: &str) -> Result<()> {
        let entry = self
            .audio
            .iter_mut()
            .chain(self.video.iter_mut())
            .find(|e| e.payload_type == payload_type)
            .ok_or_else(|| Error::not_found(format!("payload type {payload_type}")))?;
        entry.fmtp = Some(parameters.to_string());
        Ok(())
    }

    fn feedback_lines(&self, kind: &str, profile: MediaProfile, payload_type: u8) -> Vec<ParsedAttribute> {
        if !profile.has_feedback() || kind != "video" {
            return Vec::new();
        }

        let pt = payload_type.to_string();
        let fb = |fb_type: &str, param: Option<&str>| {
            ParsedAttribute::RtcpFb(pt.clone(), fb_type.to_string(), param.map(str::to_string))
        };

        let mut lines = Vec::new();
        if self.nack {
            lines.push(fb("nack", None));
            lines.push(fb("nack", Some("pli")));
        }
        lines.push(fb("ccm", Some("fir")));
        if self.goog_remb {
            lines.push(fb("goog-remb", None));
        }
        lines
    }

    pub(crate) fn create_offer(
        &self,
        kind: &str,
        profile: MediaProfile,
        direction: MediaDirection,
    ) -> Result<MediaDescription> {
        let entries = self.entries(kind);
        if entries.is_empty() {
            return Err(Error::UnsupportedMedia(format!("no {kind} codecs configured")));
        }

        let formats = entries.iter().map(|e| e.payload_type.to_string()).collect();
        let mut media = MediaDescription::new(kind, DEFAULT_PORT, profile.protocol(), formats);

        for entry in entries {
            media.push_attribute(ParsedAttribute::RtpMap(entry.codec.to_rtpmap(entry.payload_type)));
        }
        for entry in entries {
            if let Some(parameters) = &entry.fmtp {
                media.push_attribute(ParsedAttribute::Fmtp(FmtpAttribute {
                    format: entry.payload_type.to_string(),
                    parameters: parameters.clone(),
                }));
            }
        }
        for entry in entries {
            for line in self.feedback_lines(kind, profile, entry.payload_type) {
                media.push_attribute(line);
            }
        }
        for (id, uri) in self.extmaps.iter() {
            media.push_attribute(ParsedAttribute::ExtMap(id, None, uri.to_string(), None));
        }
        if self.rtcp_mux {
            media.push_attribute(ParsedAttribute::RtcpMux);
        }
        media.push_attribute(ParsedAttribute::Direction(direction));

        Ok(media)
    }

    /// Codec an offered format refers to: its rtpmap, or the static table
    fn offered_codec(offer: &MediaDescription, format: &str) -> Option<Codec> {
        match offer.rtpmap(format) {
            Some(rtpmap) => Some(Codec::from_rtpmap(rtpmap)),
            None => format.parse::<u8>().ok().and_then(static_codec),
        }
    }

    fn accepts_feedback(&self, fb_type: &str, param: Option<&str>) -> bool {
        match (fb_type, param) {
            ("nack", _) => self.nack,
            ("goog-remb", _) => self.goog_remb,
            ("ccm", Some("fir")) => true,
            _ => false,
        }
    }

    pub(crate) fn create_answer(
        &self,
        offer: &MediaDescription,
        profile: MediaProfile,
        direction: MediaDirection,
        extensions: &[Box<dyn MediaExtension>],
    ) -> Result<MediaDescription> {
        let local = self.entries(&offer.media);
        let formats: Vec<String> = offer
            .formats
            .iter()
            .filter(|format| match Self::offered_codec(offer, format) {
                Some(codec) => local.iter().any(|e| e.codec.matches(&codec)),
                None => {
                    trace!("Skipping format {} without a known encoding", format);
                    false
                }
            })
            .cloned()
            .collect();

        if formats.is_empty() {
            return Err(Error::UnsupportedMedia(format!("no common {} codec", offer.media)));
        }

        let mut answer = MediaDescription::new(offer.media.clone(), DEFAULT_PORT, offer.protocol.clone(), formats);

        for format in answer.formats.clone() {
            if let Some(rtpmap) = offer.rtpmap(&format) {
                answer.push_attribute(ParsedAttribute::RtpMap(rtpmap.clone()));
            }
        }

        if profile.has_feedback() && offer.protocol.contains("AVPF") {
            for attr in &offer.attributes {
                if let ParsedAttribute::RtcpFb(pt, fb_type, param) = attr {
                    let listed = pt == "*" || answer.formats.contains(pt);
                    if listed && self.accepts_feedback(fb_type, param.as_deref()) {
                        answer.push_attribute(attr.clone());
                    }
                }
            }
        }

        for attr in &offer.attributes {
            if let ParsedAttribute::ExtMap(id, ext_direction, uri, _) = attr {
                if self.extmaps.contains_uri(uri) {
                    let ext_direction = ext_direction
                        .as_deref()
                        .and_then(|d| d.parse::<MediaDirection>().ok())
                        .map(|d| d.reverse().to_string());
                    answer.push_attribute(ParsedAttribute::ExtMap(*id, ext_direction, uri.clone(), None));
                }
            }
        }

        if self.rtcp_mux && offer.has_attribute(&ParsedAttribute::RtcpMux) {
            answer.push_attribute(ParsedAttribute::RtcpMux);
        }

        for attr in &offer.attributes {
            if !policy::can_insert_attribute(offer, attr, &answer, extensions) {
                continue;
            }
            match attr {
                ParsedAttribute::Direction(offered) => {
                    answer.push_attribute(ParsedAttribute::Direction(direction.answer_to(*offered)));
                }
                other => answer.push_attribute(other.clone()),
            }
        }

        if answer.direction().is_none() {
            let implicit = direction.answer_to(MediaDirection::SendRecv);
            if implicit != MediaDirection::SendRecv {
                answer.push_attribute(ParsedAttribute::Direction(implicit));
            }
        }

        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::DynamicPayloadManager;
    use rvoip_sdp_core::parse_attribute;

    fn avp_caps() -> RtpCapabilities {
        let mut caps = RtpCapabilities::default();
        caps.set_payload_manager(DynamicPayloadManager::new().shared());
        for codec in ["PCMU/8000/1", "opus/48000/2", "AMR/8000/1"] {
            caps.add_codec("audio", codec).unwrap();
        }
        for codec in ["H263-1998/90000", "VP8/90000", "MP4V-ES/90000", "H264/90000"] {
            caps.add_codec("video", codec).unwrap();
        }
        caps
    }

    fn offer_with(formats: &[&str], attributes: &[&str]) -> MediaDescription {
        let mut media = MediaDescription::new(
            "video",
            9,
            "RTP/AVPF",
            formats.iter().map(|f| f.to_string()).collect(),
        );
        for attr in attributes {
            media.push_attribute(parse_attribute(attr).unwrap());
        }
        media
    }

    #[test]
    fn test_payload_assignment() {
        let caps = avp_caps();
        let audio: Vec<u8> = caps.entries("audio").iter().map(|e| e.payload_type).collect();
        let video: Vec<u8> = caps.entries("video").iter().map(|e| e.payload_type).collect();
        assert_eq!(audio, vec![0, 96, 97]);
        assert_eq!(video, vec![98, 99, 100, 101]);
    }

    #[test]
    fn test_duplicate_and_missing_manager() {
        let mut caps = avp_caps();
        assert!(matches!(caps.add_codec("audio", "opus/48000/2"), Err(Error::DuplicateCodec(_))));

        let mut bare = RtpCapabilities::default();
        assert_eq!(bare.add_codec("audio", "PCMA/8000/1").unwrap(), 8);
        assert!(matches!(bare.add_codec("audio", "opus/48000/2"), Err(Error::AllocationExhausted(_))));
    }

    #[test]
    fn test_generic_payloads() {
        let mut caps = RtpCapabilities::default();
        caps.add_generic_payload("video", 100, "VP8/90000").unwrap();
        assert!(matches!(
            caps.add_generic_payload("audio", 101, "PCMU/8000/1"),
            Err(Error::StaticCodecConflict(_))
        ));
        assert!(matches!(
            caps.add_generic_payload("video", 100, "H264/90000"),
            Err(Error::DuplicateCodec(_))
        ));
        assert!(caps.add_generic_payload("video", 20, "H264/90000").is_err());
    }

    #[test]
    fn test_offer_feedback_lines() {
        let mut caps = avp_caps();
        caps.goog_remb = false;
        let offer = caps.create_offer("video", MediaProfile::Avpf, MediaDirection::SendRecv).unwrap();
        let fb: Vec<_> = offer.attributes_by_key("rtcp-fb").collect();
        assert_eq!(fb.len(), 4 * 3);

        let offer = caps.create_offer("audio", MediaProfile::Avpf, MediaDirection::SendRecv).unwrap();
        assert_eq!(offer.attributes_by_key("rtcp-fb").count(), 0);

        let offer = caps.create_offer("video", MediaProfile::Avp, MediaDirection::SendRecv).unwrap();
        assert_eq!(offer.attributes_by_key("rtcp-fb").count(), 0);
    }

    #[test]
    fn test_answer_keeps_offer_order_and_numbers() {
        let caps = avp_caps();
        let offer = offer_with(
            &["120", "121", "34"],
            &["rtpmap:120 H264/90000", "rtpmap:121 VP8/90000", "fmtp:120 packetization-mode=1"],
        );
        let answer = caps
            .create_answer(&offer, MediaProfile::Avpf, MediaDirection::SendRecv, &[])
            .unwrap();
        assert_eq!(answer.formats, vec!["120", "121"]);
        assert_eq!(answer.rtpmap("120").map(|r| r.encoding_name.as_str()), Some("H264"));
        assert!(answer.fmtp("120").is_some());
    }

    #[test]
    fn test_answer_without_common_codec() {
        let caps = avp_caps();
        let offer = offer_with(&["96"], &["rtpmap:96 AV1/90000"]);
        assert!(matches!(
            caps.create_answer(&offer, MediaProfile::Avpf, MediaDirection::SendRecv, &[]),
            Err(Error::UnsupportedMedia(_))
        ));
    }

    #[test]
    fn test_answer_feedback_filtered_by_flags() {
        let mut caps = avp_caps();
        caps.nack = false;
        let offer = offer_with(
            &["96"],
            &["rtpmap:96 VP8/90000", "rtcp-fb:96 nack", "rtcp-fb:96 nack pli", "rtcp-fb:96 ccm fir", "rtcp-fb:96 goog-remb", "rtcp-fb:97 ccm fir"],
        );
        let answer = caps
            .create_answer(&offer, MediaProfile::Avpf, MediaDirection::SendRecv, &[])
            .unwrap();
        let fb: Vec<String> = answer.attributes_by_key("rtcp-fb").map(|a| a.to_string()).collect();
        assert_eq!(fb, vec!["a=rtcp-fb:96 ccm fir", "a=rtcp-fb:96 goog-remb"]);
    }

    #[test]
    fn test_answer_extmap_and_rtcp_mux() {
        let mut caps = avp_caps();
        caps.extmaps.add(3, "urn:ietf:params:rtp-hdrext:toffset").unwrap();
        caps.rtcp_mux = false;
        let offer = offer_with(
            &["96"],
            &[
                "rtpmap:96 VP8/90000",
                "extmap:7/sendonly urn:ietf:params:rtp-hdrext:toffset",
                "extmap:8 urn:unknown",
                "rtcp-mux",
            ],
        );
        let answer = caps
            .create_answer(&offer, MediaProfile::Avpf, MediaDirection::SendRecv, &[])
            .unwrap();
        let extmaps: Vec<String> = answer.attributes_by_key("extmap").map(|a| a.to_string()).collect();
        assert_eq!(extmaps, vec!["a=extmap:7/recvonly urn:ietf:params:rtp-hdrext:toffset"]);
        assert!(!answer.has_attribute(&ParsedAttribute::RtcpMux));
    }

    #[test]
    fn test_answer_direction() {
        let caps = avp_caps();
        let offer = offer_with(&["96"], &["rtpmap:96 VP8/90000", "sendonly"]);
        let answer = caps
            .create_answer(&offer, MediaProfile::Avpf, MediaDirection::SendRecv, &[])
            .unwrap();
        assert_eq!(answer.direction(), Some(MediaDirection::RecvOnly));
        assert_eq!(answer.attributes_by_key("recvonly").count(), 1);

        let offer = offer_with(&["96"], &["rtpmap:96 VP8/90000"]);
        let answer = caps
            .create_answer(&offer, MediaProfile::Avpf, MediaDirection::SendOnly, &[])
            .unwrap();
        assert_eq!(answer.direction(), Some(MediaDirection::SendOnly));
    }
}
