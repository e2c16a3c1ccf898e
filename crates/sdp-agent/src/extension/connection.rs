//! Connection-address exchange
//!
//! Each side advertises the list of addresses it can be reached at as
//! `a=x-conn-addr:<nettype> <addrtype> <address>` media attributes.

use super::MediaExtension;
use crate::error::{Error, Result};
use rvoip_sdp_core::{MediaDescription, ParsedAttribute};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::warn;

pub const CONNECTION_ATTRIBUTE: &str = "x-conn-addr";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressType {
    Ip4,
    Ip6,
}

impl AddressType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AddressType::Ip4 => "IP4",
            AddressType::Ip6 => "IP6",
        }
    }
}

/// One advertised address
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionAddress {
    pub addr_type: AddressType,
    /// Address text, possibly with a prefix length (`2aaa::1/64`)
    pub address: String,
}

impl ConnectionAddress {
    pub fn ip4(address: impl Into<String>) -> Self {
        Self {
            addr_type: AddressType::Ip4,
            address: address.into(),
        }
    }

    pub fn ip6(address: impl Into<String>) -> Self {
        Self {
            addr_type: AddressType::Ip6,
            address: address.into(),
        }
    }

    fn to_attribute(&self) -> ParsedAttribute {
        ParsedAttribute::Value(CONNECTION_ATTRIBUTE.to_string(), self.to_string())
    }
}

impl fmt::Display for ConnectionAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IN {} {}", self.addr_type.as_str(), self.address)
    }
}

impl FromStr for ConnectionAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_whitespace().collect::<Vec<_>>().as_slice() {
            ["IN", "IP4", address] => Ok(ConnectionAddress::ip4(*address)),
            ["IN", "IP6", address] => Ok(ConnectionAddress::ip6(*address)),
            _ => Err(Error::MalformedInput(format!("invalid connection address: {s}"))),
        }
    }
}

/// Application side of the address exchange
pub trait ConnectionAddressProvider: Send + Sync + fmt::Debug {
    /// Addresses put in an offer
    fn offer_addresses(&self) -> Vec<ConnectionAddress>;

    /// Addresses answered to the peer's `offered` list
    fn answer_addresses(&self, offered: &[ConnectionAddress]) -> Vec<ConnectionAddress>;

    /// Called on the offerer with the addresses the answerer advertised
    fn on_answered_addresses(&self, _answered: &[ConnectionAddress]) {}
}

#[derive(Debug, Clone)]
pub struct ConnectionExtension {
    provider: Arc<dyn ConnectionAddressProvider>,
}

impl ConnectionExtension {
    pub fn new(provider: Arc<dyn ConnectionAddressProvider>) -> Self {
        Self { provider }
    }

    /// Addresses advertised in `media`, malformed entries skipped
    pub fn addresses(media: &MediaDescription) -> Vec<ConnectionAddress> {
        media
            .attributes_by_key(CONNECTION_ATTRIBUTE)
            .filter_map(|attr| attr.value())
            .filter_map(|value| match value.parse() {
                Ok(addr) => Some(addr),
                Err(e) => {
                    warn!("{}", e);
                    None
                }
            })
            .collect()
    }
}

impl MediaExtension for ConnectionExtension {
    fn name(&self) -> &str {
        "connection"
    }

    fn add_offer_attributes(&self, offer: &mut MediaDescription) -> Result<()> {
        for addr in self.provider.offer_addresses() {
            offer.push_attribute(addr.to_attribute());
        }
        Ok(())
    }

    fn add_answer_attributes(&self, offer: &MediaDescription, answer: &mut MediaDescription) -> Result<()> {
        let offered = Self::addresses(offer);
        for addr in self.provider.answer_addresses(&offered) {
            answer.push_attribute(addr.to_attribute());
        }
        Ok(())
    }

    fn process_answer_attributes(&self, answer: &MediaDescription) -> Result<()> {
        self.provider.on_answered_addresses(&Self::addresses(answer));
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn MediaExtension> {
        Box::new(self.clone())
    }
}
