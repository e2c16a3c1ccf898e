//! Media extensions taking part in offers and answers

mod common;

use common::*;
use parking_lot::Mutex;
use rvoip_sdp_agent::extension::{
    ConnectionAddress, ConnectionAddressProvider, ConnectionExtension, SdesExtension, SdesKey,
    SdesKeyProvider, SdesSelection, SrtpSuite,
};
use rvoip_sdp_agent::{Error, MediaExtension, MediaHandler, Result};
use rvoip_sdp_core::{MediaDescription, ParsedAttribute};
use std::sync::Arc;

/// Offers one key per suite, tagged from 1, and accepts the first offered
/// key with a suite from `accepted`
#[derive(Debug)]
struct TaggedKeys {
    offered: Vec<SrtpSuite>,
    accepted: Vec<SrtpSuite>,
    selections: Mutex<Vec<SdesSelection>>,
}

impl TaggedKeys {
    fn new(offered: Vec<SrtpSuite>, accepted: Vec<SrtpSuite>) -> Arc<Self> {
        Arc::new(Self {
            offered,
            accepted,
            selections: Mutex::new(Vec::new()),
        })
    }
}

impl SdesKeyProvider for TaggedKeys {
    fn offer_keys(&self) -> Vec<SdesKey> {
        self.offered
            .iter()
            .enumerate()
            .map(|(i, suite)| SdesKey::generate(i as u32 + 1, *suite))
            .collect()
    }

    fn answer_key(&self, offered: &[SdesKey]) -> Option<SdesKey> {
        offered
            .iter()
            .find(|key| self.accepted.contains(&key.suite))
            .map(|key| SdesKey::generate(key.tag, key.suite))
    }

    fn on_key_selected(&self, selection: &SdesSelection) {
        self.selections.lock().push(selection.clone());
    }
}

fn savp_handler(extension: SdesExtension) -> MediaHandler {
    let mut handler = MediaHandler::rtp_savp();
    set_default_codecs(&mut handler);
    handler.add_extension(Box::new(extension));
    handler
}

fn crypto_tags(media: &MediaDescription) -> Vec<(u32, String)> {
    media
        .crypto_attributes()
        .map(|c| (c.tag, c.suite.clone()))
        .collect()
}

#[test]
fn test_sdes_key_exchange() {
    init_tracing();
    let offer_keys = TaggedKeys::new(
        vec![
            SrtpSuite::Aes256CmHmacSha1_80,
            SrtpSuite::AesCm128HmacSha1_80,
            SrtpSuite::AesCm128HmacSha1_32,
        ],
        Vec::new(),
    );
    let answer_keys = TaggedKeys::new(
        Vec::new(),
        vec![SrtpSuite::AesCm128HmacSha1_32, SrtpSuite::AesCm128HmacSha1_80],
    );
    let offer_ext = SdesExtension::new(offer_keys.clone());
    let answer_ext = SdesExtension::new(answer_keys.clone());

    let mut offerer = offerer();
    offerer.add_handler("audio", savp_handler(offer_ext.clone())).unwrap();
    let mut answerer = answerer();
    answerer.add_handler("audio", savp_handler(answer_ext.clone())).unwrap();

    let (offer, answer) = negotiate(&mut offerer, &mut answerer);

    assert_eq!(offer.media_descriptions[0].protocol, "RTP/SAVP");
    assert_eq!(
        crypto_tags(&offer.media_descriptions[0]),
        vec![
            (1, "AES_256_CM_HMAC_SHA1_80".to_string()),
            (2, "AES_CM_128_HMAC_SHA1_80".to_string()),
            (3, "AES_CM_128_HMAC_SHA1_32".to_string()),
        ]
    );
    // first offered key with an accepted suite, not the answerer's preference
    assert_eq!(
        crypto_tags(&answer.media_descriptions[0]),
        vec![(2, "AES_CM_128_HMAC_SHA1_80".to_string())]
    );

    let on_offerer = offer_ext.selected().unwrap();
    let on_answerer = answer_ext.selected().unwrap();
    assert_eq!(on_offerer.local.tag, 2);
    assert_eq!(on_offerer.local, on_answerer.remote);
    assert_eq!(on_offerer.remote, on_answerer.local);
    assert_ne!(on_offerer.local.key, on_offerer.remote.key);

    assert_eq!(offer_keys.selections.lock().len(), 1);
    assert_eq!(answer_keys.selections.lock().len(), 1);
}

#[test]
fn test_sdes_without_acceptable_key_rejects_media() {
    init_tracing();
    let offer_ext = SdesExtension::new(TaggedKeys::new(vec![SrtpSuite::Aes256CmHmacSha1_32], Vec::new()));
    let answer_ext = SdesExtension::new(TaggedKeys::new(Vec::new(), vec![SrtpSuite::AesCm128HmacSha1_80]));

    let mut offerer = offerer();
    offerer.add_handler("audio", savp_handler(offer_ext.clone())).unwrap();
    let mut answerer = answerer();
    answerer.add_handler("audio", savp_handler(answer_ext.clone())).unwrap();

    let (_, answer) = negotiate(&mut offerer, &mut answerer);

    let media = &answer.media_descriptions[0];
    assert!(media.is_rejected());
    assert_eq!(media.crypto_attributes().count(), 0);
    assert!(offer_ext.selected().is_none());
    assert!(answer_ext.selected().is_none());
}

#[test]
fn test_default_sdes_extension() {
    init_tracing();
    let offer_ext = SdesExtension::default();
    let answer_ext = SdesExtension::default();

    let mut offerer = offerer();
    offerer.add_handler("video", savp_handler(offer_ext.clone())).unwrap();
    let mut answerer = answerer();
    answerer.add_handler("video", savp_handler(answer_ext.clone())).unwrap();

    let (offer, answer) = negotiate(&mut offerer, &mut answerer);
    assert_eq!(offer.media_descriptions[0].crypto_attributes().count(), 2);
    assert_eq!(answer.media_descriptions[0].crypto_attributes().count(), 1);
    assert_eq!(offer_ext.selected().unwrap().remote, answer_ext.selected().unwrap().local);
}

#[derive(Debug, Default)]
struct Addresses {
    offer: Vec<ConnectionAddress>,
    answer: Vec<ConnectionAddress>,
    seen_offered: Mutex<Vec<ConnectionAddress>>,
    seen_answered: Mutex<Vec<ConnectionAddress>>,
}

impl ConnectionAddressProvider for Addresses {
    fn offer_addresses(&self) -> Vec<ConnectionAddress> {
        self.offer.clone()
    }

    fn answer_addresses(&self, offered: &[ConnectionAddress]) -> Vec<ConnectionAddress> {
        self.seen_offered.lock().extend_from_slice(offered);
        self.answer.clone()
    }

    fn on_answered_addresses(&self, answered: &[ConnectionAddress]) {
        self.seen_answered.lock().extend_from_slice(answered);
    }
}

#[test]
fn test_connection_address_exchange() {
    init_tracing();
    let offered = vec![
        ConnectionAddress::ip4(OFFERER_ADDR),
        ConnectionAddress::ip6("2aaa:aaaa:aaaa:aaaa:9b9:300:7d6a:faa9/64"),
    ];
    let answered = vec![ConnectionAddress::ip4(ANSWERER_ADDR)];
    let offer_side = Arc::new(Addresses {
        offer: offered.clone(),
        ..Default::default()
    });
    let answer_side = Arc::new(Addresses {
        answer: answered.clone(),
        ..Default::default()
    });

    let mut offerer = offerer();
    let mut handler = avp_handler();
    handler.add_extension(Box::new(ConnectionExtension::new(offer_side.clone())));
    offerer.add_handler("audio", handler).unwrap();

    let mut answerer = answerer();
    let mut handler = avp_handler();
    handler.add_extension(Box::new(ConnectionExtension::new(answer_side.clone())));
    answerer.add_handler("audio", handler).unwrap();

    let (offer, answer) = negotiate(&mut offerer, &mut answerer);

    assert_eq!(ConnectionExtension::addresses(&offer.media_descriptions[0]), offered);
    // only the answerer's own addresses go back
    assert_eq!(ConnectionExtension::addresses(&answer.media_descriptions[0]), answered);
    assert_eq!(*answer_side.seen_offered.lock(), offered);
    assert_eq!(*offer_side.seen_answered.lock(), answered);
}

#[test]
fn test_extmap_answered_with_offered_id() {
    init_tracing();
    let mut offerer = offerer();
    let mut handler = avp_handler();
    handler.add_extmap(3, "urn:ietf:params:rtp-hdrext:ssrc-audio-level").unwrap();
    assert_eq!(handler.allocate_extmap("urn:ietf:params:rtp-hdrext:toffset").unwrap(), 1);
    offerer.add_handler("audio", handler).unwrap();

    let mut answerer = answerer();
    let mut handler = avp_handler();
    assert_eq!(
        handler.allocate_extmap("urn:ietf:params:rtp-hdrext:ssrc-audio-level").unwrap(),
        1
    );
    answerer.add_handler("audio", handler).unwrap();

    let (offer, answer) = negotiate(&mut offerer, &mut answerer);

    assert_eq!(offer.media_descriptions[0].attributes_by_key("extmap").count(), 2);
    let answered: Vec<_> = answer.media_descriptions[0]
        .attributes_by_key("extmap")
        .cloned()
        .collect();
    assert_eq!(
        answered,
        vec![ParsedAttribute::ExtMap(
            3,
            None,
            "urn:ietf:params:rtp-hdrext:ssrc-audio-level".to_string(),
            None
        )]
    );
}

/// Adds two custom attributes and only lets `x-keep` into answers
#[derive(Debug, Clone)]
struct KeepAttribute;

impl MediaExtension for KeepAttribute {
    fn name(&self) -> &str {
        "keep"
    }

    fn can_insert_attribute(
        &self,
        _offer: &MediaDescription,
        attr: &ParsedAttribute,
        _answer: &MediaDescription,
    ) -> bool {
        attr.key() == "x-keep"
    }

    fn add_offer_attributes(&self, offer: &mut MediaDescription) -> Result<()> {
        offer.push_attribute(ParsedAttribute::Value("x-keep".to_string(), "1".to_string()));
        offer.push_attribute(ParsedAttribute::Value("x-drop".to_string(), "1".to_string()));
        Ok(())
    }

    fn add_answer_attributes(&self, _offer: &MediaDescription, _answer: &mut MediaDescription) -> Result<()> {
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn MediaExtension> {
        Box::new(self.clone())
    }
}

#[test]
fn test_extension_claims_offered_attribute() {
    init_tracing();
    let keep = || {
        let mut handler = avp_handler();
        handler.add_extension(Box::new(KeepAttribute));
        handler
    };

    let mut offerer = offerer();
    offerer.add_handler("audio", keep()).unwrap();
    let mut answerer = answerer();
    answerer.add_handler("audio", keep()).unwrap();
    let (offer, answer) = negotiate(&mut offerer, &mut answerer);

    let offered = &offer.media_descriptions[0];
    assert_eq!(offered.attributes_by_key("x-keep").count(), 1);
    assert_eq!(offered.attributes_by_key("x-drop").count(), 1);
    let answered = &answer.media_descriptions[0];
    assert_eq!(answered.attributes_by_key("x-keep").count(), 1);
    assert_eq!(answered.attributes_by_key("x-drop").count(), 0);

    // without the extension the answerer drops both
    let mut plain = common::answerer();
    plain.add_handler("audio", avp_handler()).unwrap();
    let answer = answer_offer(&mut plain, &offer);
    assert_eq!(answer.media_descriptions[0].attributes_by_key("x-keep").count(), 0);
}

/// Fails every hook; `refuse` makes the answer side error recoverable
#[derive(Debug, Clone)]
struct Failing {
    refuse: bool,
}

impl MediaExtension for Failing {
    fn name(&self) -> &str {
        "failing"
    }

    fn add_offer_attributes(&self, _offer: &mut MediaDescription) -> Result<()> {
        Err(Error::InvalidArgument("broken".to_string()))
    }

    fn add_answer_attributes(&self, _offer: &MediaDescription, _answer: &mut MediaDescription) -> Result<()> {
        if self.refuse {
            Err(Error::UnsupportedMedia("refused".to_string()))
        } else {
            Err(Error::InvalidArgument("broken".to_string()))
        }
    }

    fn process_answer_attributes(&self, _answer: &MediaDescription) -> Result<()> {
        Err(Error::InvalidArgument("broken".to_string()))
    }

    fn clone_box(&self) -> Box<dyn MediaExtension> {
        Box::new(self.clone())
    }
}

#[test]
fn test_failing_extension_does_not_fail_negotiation() {
    init_tracing();
    let failing = |refuse| {
        let mut handler = avp_handler();
        handler.add_extension(Box::new(Failing { refuse }));
        handler
    };

    let mut offerer = offerer();
    offerer.add_handler("audio", failing(false)).unwrap();
    offerer.add_handler("video", failing(false)).unwrap();
    let mut answerer = answerer();
    answerer.add_handler("audio", failing(false)).unwrap();
    answerer.add_handler("video", failing(true)).unwrap();

    let (offer, answer) = negotiate(&mut offerer, &mut answerer);
    assert_eq!(layout(&offer), vec![("audio", true), ("video", true)]);
    assert_eq!(layout(&answer), vec![("audio", true), ("video", false)]);
}
