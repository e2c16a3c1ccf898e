//! SDES key exchange (RFC 4568)
//!
//! The offerer lists its master keys as `a=crypto` lines; the answerer picks
//! one of them and replies with a single line carrying the same tag and suite
//! and its own key. Both sides end up with an [`SdesSelection`].

use super::MediaExtension;
use crate::error::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use parking_lot::Mutex;
use rand::RngCore;
use rvoip_sdp_core::{CryptoAttribute, MediaDescription, ParsedAttribute};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

/// SRTP crypto suites supported by the key exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SrtpSuite {
    AesCm128HmacSha1_80,
    AesCm128HmacSha1_32,
    Aes256CmHmacSha1_80,
    Aes256CmHmacSha1_32,
}

impl SrtpSuite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SrtpSuite::AesCm128HmacSha1_80 => "AES_CM_128_HMAC_SHA1_80",
            SrtpSuite::AesCm128HmacSha1_32 => "AES_CM_128_HMAC_SHA1_32",
            SrtpSuite::Aes256CmHmacSha1_80 => "AES_256_CM_HMAC_SHA1_80",
            SrtpSuite::Aes256CmHmacSha1_32 => "AES_256_CM_HMAC_SHA1_32",
        }
    }

    /// Master key plus master salt length in bytes
    pub fn key_length(&self) -> usize {
        match self {
            SrtpSuite::AesCm128HmacSha1_80 | SrtpSuite::AesCm128HmacSha1_32 => 30,
            SrtpSuite::Aes256CmHmacSha1_80 | SrtpSuite::Aes256CmHmacSha1_32 => 46,
        }
    }
}

impl fmt::Display for SrtpSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SrtpSuite {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "AES_CM_128_HMAC_SHA1_80" => Ok(SrtpSuite::AesCm128HmacSha1_80),
            "AES_CM_128_HMAC_SHA1_32" => Ok(SrtpSuite::AesCm128HmacSha1_32),
            "AES_256_CM_HMAC_SHA1_80" => Ok(SrtpSuite::Aes256CmHmacSha1_80),
            "AES_256_CM_HMAC_SHA1_32" => Ok(SrtpSuite::Aes256CmHmacSha1_32),
            other => Err(Error::UnsupportedMedia(format!("unknown SRTP suite {other}"))),
        }
    }
}

/// One `a=crypto` line with an `inline:` key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdesKey {
    pub tag: u32,
    pub suite: SrtpSuite,
    /// Base64 key and salt as written after `inline:`
    pub key: String,
    /// Key lifetime, either a number or `2^<n>`
    pub lifetime: Option<String>,
    /// Master key identifier: (value, length in bytes)
    pub mki: Option<(u32, u32)>,
}

impl SdesKey {
    pub fn new(tag: u32, suite: SrtpSuite, key: impl Into<String>) -> Self {
        Self {
            tag,
            suite,
            key: key.into(),
            lifetime: None,
            mki: None,
        }
    }

    pub fn with_lifetime(mut self, lifetime: impl Into<String>) -> Self {
        self.lifetime = Some(lifetime.into());
        self
    }

    pub fn with_mki(mut self, value: u32, length: u32) -> Self {
        self.mki = Some((value, length));
        self
    }

    /// Fresh random key material for `suite`
    pub fn generate(tag: u32, suite: SrtpSuite) -> Self {
        let mut material = vec![0u8; suite.key_length()];
        rand::thread_rng().fill_bytes(&mut material);
        Self::new(tag, suite, STANDARD.encode(material))
    }

    pub fn to_attribute(&self) -> CryptoAttribute {
        let mut param = format!("inline:{}", self.key);
        if let Some(lifetime) = &self.lifetime {
            param.push('|');
            param.push_str(lifetime);
        }
        if let Some((value, length)) = self.mki {
            param.push_str(&format!("|{value}:{length}"));
        }
        CryptoAttribute {
            tag: self.tag,
            suite: self.suite.as_str().to_string(),
            key_params: vec![param],
            session_params: Vec::new(),
        }
    }

    pub fn from_attribute(attr: &CryptoAttribute) -> Result<Self> {
        let suite: SrtpSuite = attr.suite.parse()?;
        let param = attr
            .key_params
            .iter()
            .find_map(|p| p.strip_prefix("inline:"))
            .ok_or_else(|| Error::MalformedInput(format!("crypto tag {} has no inline key", attr.tag)))?;

        let mut fields = param.split('|');
        let key = fields.next().unwrap_or_default().to_string();
        if key.is_empty() {
            return Err(Error::MalformedInput(format!("crypto tag {} has an empty key", attr.tag)));
        }

        let mut sdes = SdesKey::new(attr.tag, suite, key);
        for field in fields {
            match field.split_once(':') {
                Some((value, length)) => {
                    let parse = |s: &str| {
                        s.parse::<u32>()
                            .map_err(|_| Error::MalformedInput(format!("invalid MKI in crypto tag {}", attr.tag)))
                    };
                    sdes.mki = Some((parse(value)?, parse(length)?));
                }
                None => sdes.lifetime = Some(field.to_string()),
            }
        }
        Ok(sdes)
    }
}

/// Outcome of the exchange on one side
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdesSelection {
    /// Key this side uses to encrypt
    pub local: SdesKey,
    /// Key the peer uses to encrypt
    pub remote: SdesKey,
}

/// Application side of the key exchange
pub trait SdesKeyProvider: Send + Sync + fmt::Debug {
    /// Keys listed in an offer, in preference order
    fn offer_keys(&self) -> Vec<SdesKey>;

    /// Key answered to `offered`. The answer must reuse the tag and suite of
    /// the offered key it accepts; `None` rejects all of them.
    fn answer_key(&self, offered: &[SdesKey]) -> Option<SdesKey>;

    fn on_key_selected(&self, _selection: &SdesSelection) {}
}

/// Generates a random key per configured suite and answers with the first
/// offered key whose suite it supports.
#[derive(Debug, Clone)]
pub struct RandomKeyProvider {
    suites: Vec<SrtpSuite>,
}

impl RandomKeyProvider {
    pub fn new(suites: Vec<SrtpSuite>) -> Self {
        Self { suites }
    }
}

impl Default for RandomKeyProvider {
    fn default() -> Self {
        Self::new(vec![SrtpSuite::AesCm128HmacSha1_80, SrtpSuite::AesCm128HmacSha1_32])
    }
}

impl SdesKeyProvider for RandomKeyProvider {
    fn offer_keys(&self) -> Vec<SdesKey> {
        self.suites
            .iter()
            .enumerate()
            .map(|(i, suite)| SdesKey::generate(i as u32 + 1, *suite))
            .collect()
    }

    fn answer_key(&self, offered: &[SdesKey]) -> Option<SdesKey> {
        offered
            .iter()
            .find(|key| self.suites.contains(&key.suite))
            .map(|key| SdesKey::generate(key.tag, key.suite))
    }
}

#[derive(Debug, Default)]
struct SdesState {
    offered: Vec<SdesKey>,
    selected: Option<SdesSelection>,
}

/// `a=crypto` negotiation attached to an RTP/SAVP(F) handler
#[derive(Debug, Clone)]
pub struct SdesExtension {
    provider: Arc<dyn SdesKeyProvider>,
    state: Arc<Mutex<SdesState>>,
}

impl SdesExtension {
    pub fn new(provider: Arc<dyn SdesKeyProvider>) -> Self {
        Self {
            provider,
            state: Arc::new(Mutex::new(SdesState::default())),
        }
    }

    /// Selection made by the last completed exchange
    pub fn selected(&self) -> Option<SdesSelection> {
        self.state.lock().selected.clone()
    }

    fn select(&self, selection: SdesSelection) {
        debug!(
            "SDES selected tag {} ({})",
            selection.local.tag, selection.local.suite
        );
        self.provider.on_key_selected(&selection);
        self.state.lock().selected = Some(selection);
    }

    fn parse_keys(media: &MediaDescription) -> Vec<SdesKey> {
        media
            .crypto_attributes()
            .filter_map(|attr| match SdesKey::from_attribute(attr) {
                Ok(key) => Some(key),
                Err(e) => {
                    warn!("Ignoring crypto attribute: {}", e);
                    None
                }
            })
            .collect()
    }
}

impl Default for SdesExtension {
    fn default() -> Self {
        Self::new(Arc::new(RandomKeyProvider::default()))
    }
}

impl MediaExtension for SdesExtension {
    fn name(&self) -> &str {
        "sdes"
    }

    fn add_offer_attributes(&self, offer: &mut MediaDescription) -> Result<()> {
        let keys = self.provider.offer_keys();
        if keys.is_empty() {
            return Err(Error::InvalidArgument("no SDES keys to offer".to_string()));
        }
        for key in &keys {
            offer.push_attribute(ParsedAttribute::Crypto(key.to_attribute()));
        }
        self.state.lock().offered = keys;
        Ok(())
    }

    fn add_answer_attributes(&self, offer: &MediaDescription, answer: &mut MediaDescription) -> Result<()> {
        let offered = Self::parse_keys(offer);
        if offered.is_empty() {
            return Err(Error::UnsupportedMedia("offer carries no usable crypto attribute".to_string()));
        }

        let key = self
            .provider
            .answer_key(&offered)
            .ok_or_else(|| Error::UnsupportedMedia("no acceptable SDES key offered".to_string()))?;
        let remote = offered
            .iter()
            .find(|k| k.tag == key.tag && k.suite == key.suite)
            .cloned()
            .ok_or_else(|| Error::InvalidArgument(format!("answered key tag {} was not offered", key.tag)))?;

        answer.push_attribute(ParsedAttribute::Crypto(key.to_attribute()));
        self.select(SdesSelection { local: key, remote });
        Ok(())
    }

    fn process_answer_attributes(&self, answer: &MediaDescription) -> Result<()> {
        let answered = Self::parse_keys(answer);
        let remote = answered
            .first()
            .cloned()
            .ok_or_else(|| Error::MalformedInput("answer carries no crypto attribute".to_string()))?;

        let local = self
            .state
            .lock()
            .offered
            .iter()
            .find(|k| k.tag == remote.tag && k.suite == remote.suite)
            .cloned()
            .ok_or_else(|| Error::MalformedInput(format!("answered crypto tag {} was not offered", remote.tag)))?;

        self.select(SdesSelection { local, remote });
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn MediaExtension> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_attribute_forms() {
        let key = SdesKey::new(2, SrtpSuite::Aes256CmHmacSha1_80, "2abcdefgh").with_mki(554, 4);
        let attr = key.to_attribute();
        assert_eq!(attr.to_string(), "2 AES_256_CM_HMAC_SHA1_80 inline:2abcdefgh|554:4");
        assert_eq!(SdesKey::from_attribute(&attr).unwrap(), key);

        let key = SdesKey::new(3, SrtpSuite::AesCm128HmacSha1_80, "3abcdefgh").with_lifetime("2^20");
        assert_eq!(
            key.to_attribute().to_string(),
            "3 AES_CM_128_HMAC_SHA1_80 inline:3abcdefgh|2^20"
        );
    }

    #[test]
    fn test_generated_key_length() {
        let key = SdesKey::generate(1, SrtpSuite::Aes256CmHmacSha1_32);
        assert_eq!(STANDARD.decode(&key.key).unwrap().len(), 46);
        let key = SdesKey::generate(1, SrtpSuite::AesCm128HmacSha1_80);
        assert_eq!(STANDARD.decode(&key.key).unwrap().len(), 30);
    }

    #[test]
    fn test_unknown_suite_rejected() {
        let attr = CryptoAttribute {
            tag: 1,
            suite: "F8_128_HMAC_SHA1_80".to_string(),
            key_params: vec!["inline:abc".to_string()],
            session_params: Vec::new(),
        };
        assert!(SdesKey::from_attribute(&attr).is_err());
    }

    #[test]
    fn test_random_provider_answers_supported_suite() {
        let provider = RandomKeyProvider::new(vec![SrtpSuite::AesCm128HmacSha1_32]);
        let offered = vec![
            SdesKey::new(1, SrtpSuite::Aes256CmHmacSha1_80, "a"),
            SdesKey::new(2, SrtpSuite::AesCm128HmacSha1_32, "b"),
        ];
        let answer = provider.answer_key(&offered).unwrap();
        assert_eq!(answer.tag, 2);
        assert_eq!(answer.suite, SrtpSuite::AesCm128HmacSha1_32);
        assert!(provider.answer_key(&offered[..1]).is_none());
    }
}
