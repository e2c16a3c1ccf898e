//! Which offered media attributes are copied into an answer

use crate::extension::MediaExtension;
use rvoip_sdp_core::{MediaDescription, ParsedAttribute};
use tracing::trace;

/// Decides whether an offered attribute may be carried into the answer
pub type AttributeValidator = fn(&MediaDescription, &ParsedAttribute, &MediaDescription) -> bool;

fn accept(_offer: &MediaDescription, _attr: &ParsedAttribute, _answer: &MediaDescription) -> bool {
    true
}

/// Format parameters only survive for formats the answer kept
fn accept_fmtp(_offer: &MediaDescription, attr: &ParsedAttribute, answer: &MediaDescription) -> bool {
    match attr {
        ParsedAttribute::Fmtp(fmtp) => answer.formats.iter().any(|f| *f == fmtp.format),
        _ => false,
    }
}

const ACCEPTED_ATTRIBUTES: &[(&str, AttributeValidator)] = &[
    ("framerate", accept),
    ("fmtp", accept_fmtp),
    ("lang", accept),
    ("maxptime", accept),
    ("mid", accept),
    ("ptime", accept),
    ("quality", accept),
    ("setup", accept),
];

/// Runs the acceptance rules for one offered attribute:
///
/// 1. never duplicate an attribute already in the answer
/// 2. a direction is accepted only while the answer has none
/// 3. well-known attributes use their validator
/// 4. otherwise the first extension that claims it wins
pub fn can_insert_attribute(
    offer: &MediaDescription,
    attr: &ParsedAttribute,
    answer: &MediaDescription,
    extensions: &[Box<dyn MediaExtension>],
) -> bool {
    if answer.has_attribute(attr) {
        return false;
    }

    if attr.is_direction() {
        return answer.direction().is_none();
    }

    if let Some((_, validator)) = ACCEPTED_ATTRIBUTES.iter().find(|(name, _)| *name == attr.key()) {
        return validator(offer, attr, answer);
    }

    if extensions.iter().any(|ext| ext.can_insert_attribute(offer, attr, answer)) {
        return true;
    }

    trace!("Dropping offered attribute {}", attr);
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use rvoip_sdp_core::{FmtpAttribute, MediaDirection};

    fn media(formats: &[&str]) -> MediaDescription {
        MediaDescription::new("video", 9, "RTP/AVP", formats.iter().map(|f| f.to_string()).collect())
    }

    fn fmtp(format: &str) -> ParsedAttribute {
        ParsedAttribute::Fmtp(FmtpAttribute {
            format: format.to_string(),
            parameters: "profile-level-id=42e01f".to_string(),
        })
    }

    #[test]
    fn test_fmtp_follows_answer_formats() {
        let offer = media(&["96", "97"]);
        let answer = media(&["97"]);
        assert!(!can_insert_attribute(&offer, &fmtp("96"), &answer, &[]));
        assert!(can_insert_attribute(&offer, &fmtp("97"), &answer, &[]));
    }

    #[test]
    fn test_no_duplicates() {
        let offer = media(&["96"]);
        let answer = media(&["96"]).with_attribute(ParsedAttribute::Setup("actpass".to_string()));
        assert!(!can_insert_attribute(
            &offer,
            &ParsedAttribute::Setup("actpass".to_string()),
            &answer,
            &[]
        ));
    }

    #[test]
    fn test_single_direction() {
        let offer = media(&["96"]);
        let answer = media(&["96"]);
        let sendonly = ParsedAttribute::Direction(MediaDirection::SendOnly);
        assert!(can_insert_attribute(&offer, &sendonly, &answer, &[]));

        let answer = answer.with_attribute(ParsedAttribute::Direction(MediaDirection::RecvOnly));
        assert!(!can_insert_attribute(&offer, &sendonly, &answer, &[]));
    }

    #[test]
    fn test_unknown_attributes_dropped() {
        let offer = media(&["96"]);
        let answer = media(&["96"]);
        let unknown = ParsedAttribute::Value("x-unknown".to_string(), "1".to_string());
        assert!(!can_insert_attribute(&offer, &unknown, &answer, &[]));
        assert!(!can_insert_attribute(&offer, &ParsedAttribute::Flag("ice-lite".to_string()), &answer, &[]));
        assert!(can_insert_attribute(
            &offer,
            &ParsedAttribute::Value("framerate".to_string(), "30".to_string()),
            &answer,
            &[]
        ));
    }
}
