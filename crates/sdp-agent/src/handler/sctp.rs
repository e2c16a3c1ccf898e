//! SCTP data channel capabilities

use super::{DEFAULT_PORT, MediaProfile};
use crate::error::{Error, Result};
use crate::extension::MediaExtension;
use crate::policy;
use rvoip_sdp_core::{MediaDescription, MediaDirection, ParsedAttribute};

pub const WEBRTC_DATACHANNEL: &str = "webrtc-datachannel";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SctpCapabilities {
    pub port: u16,
    pub application: String,
    pub streams: u32,
}

impl Default for SctpCapabilities {
    fn default() -> Self {
        Self {
            port: 5000,
            application: WEBRTC_DATACHANNEL.to_string(),
            streams: 1024,
        }
    }
}

impl SctpCapabilities {
    /// Data channels are sendrecv unless the handler says otherwise
    pub(crate) fn create_offer(&self, kind: &str, profile: MediaProfile, direction: MediaDirection) -> MediaDescription {
        let mut media = MediaDescription::new(kind, DEFAULT_PORT, profile.protocol(), vec![self.port.to_string()])
            .with_attribute(ParsedAttribute::SctpMap(self.port, self.application.clone(), self.streams));
        if direction != MediaDirection::SendRecv {
            media.push_attribute(ParsedAttribute::Direction(direction));
        }
        media
    }

    pub(crate) fn create_answer(
        &self,
        offer: &MediaDescription,
        direction: MediaDirection,
        extensions: &[Box<dyn MediaExtension>],
    ) -> Result<MediaDescription> {
        // DTLS/SCTP lists SCTP ports described by sctpmap lines; the
        // UDP/TCP variants list the application and carry sctp-port instead.
        let sctpmap_style = offer.protocol.eq_ignore_ascii_case("DTLS/SCTP");

        let formats: Vec<String> = if sctpmap_style {
            offer
                .formats
                .iter()
                .filter(|f| offer.sctpmaps().any(|(port, ..)| port.to_string() == **f))
                .cloned()
                .collect()
        } else {
            offer
                .formats
                .iter()
                .filter(|f| f.as_str() == WEBRTC_DATACHANNEL)
                .cloned()
                .collect()
        };

        if formats.is_empty() {
            return Err(Error::UnsupportedMedia("no usable SCTP format offered".to_string()));
        }

        let mut answer = MediaDescription::new(offer.media.clone(), DEFAULT_PORT, offer.protocol.clone(), formats);

        if sctpmap_style {
            for attr in &offer.attributes {
                if let ParsedAttribute::SctpMap(port, ..) = attr {
                    if answer.formats.contains(&port.to_string()) {
                        answer.push_attribute(attr.clone());
                    }
                }
            }
        } else {
            for key in ["sctp-port", "max-message-size"] {
                if let Some(attr) = offer.attributes_by_key(key).next() {
                    answer.push_attribute(attr.clone());
                }
            }
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
