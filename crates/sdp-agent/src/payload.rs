//! Payload type and RTP header extension id allocation

use crate::codec::Codec;
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::RangeInclusive;
use std::sync::Arc;
use tracing::debug;

/// First and last dynamic RTP payload types (RFC 3551)
pub const DYNAMIC_PAYLOAD_RANGE: RangeInclusive<u8> = 96..=127;

/// One-byte header extension ids (RFC 8285)
pub const EXTMAP_ID_RANGE: RangeInclusive<u16> = 1..=14;

/// Hands out dynamic payload types.
///
/// Handlers that must not collide (e.g. media bundled on one transport)
/// share one manager through [`SharedPayloadManager`].
pub trait PayloadManager: Send + fmt::Debug {
    /// Reserves and returns the next free dynamic payload type
    fn dynamic_payload(&mut self) -> Result<u8>;

    /// Reserves a specific dynamic payload type chosen by the caller
    fn register_dynamic_payload(&mut self, payload_type: u8) -> Result<()>;
}

pub type SharedPayloadManager = Arc<Mutex<dyn PayloadManager>>;

/// Default manager: lowest free number of a contiguous range
#[derive(Debug, Clone)]
pub struct DynamicPayloadManager {
    range: RangeInclusive<u8>,
    used: BTreeSet<u8>,
}

impl DynamicPayloadManager {
    pub fn new() -> Self {
        Self {
            range: DYNAMIC_PAYLOAD_RANGE,
            used: BTreeSet::new(),
        }
    }

    pub fn with_range(first: u8, last: u8) -> Result<Self> {
        if first > last || last > 127 {
            return Err(Error::InvalidArgument(format!("Invalid payload range {first}..={last}")));
        }
        Ok(Self {
            range: first..=last,
            used: BTreeSet::new(),
        })
    }

    /// Wraps the manager so it can be shared between handlers
    pub fn shared(self) -> SharedPayloadManager {
        Arc::new(Mutex::new(self))
    }
}

impl Default for DynamicPayloadManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PayloadManager for DynamicPayloadManager {
    fn dynamic_payload(&mut self) -> Result<u8> {
        let pt = self
            .range
            .clone()
            .find(|pt| !self.used.contains(pt))
            .ok_or_else(|| Error::AllocationExhausted(format!("no free payload type in {:?}", self.range)))?;
        self.used.insert(pt);
        Ok(pt)
    }

    fn register_dynamic_payload(&mut self, payload_type: u8) -> Result<()> {
        if !self.range.contains(&payload_type) {
            return Err(Error::InvalidArgument(format!(
                "payload type {payload_type} outside {:?}",
                self.range
            )));
        }
        if !self.used.insert(payload_type) {
            return Err(Error::InvalidArgument(format!("payload type {payload_type} already in use")));
        }
        Ok(())
    }
}

/// Payload type for `codec`: its static number if RFC 3551 defines one,
/// otherwise the next dynamic number from `manager`.
pub fn assign_payload(manager: Option<&SharedPayloadManager>, codec: &Codec) -> Result<u8> {
    if let Some(pt) = codec.static_payload_type() {
        return Ok(pt);
    }

    let manager = manager.ok_or_else(|| {
        Error::AllocationExhausted(format!("no payload manager to allocate a dynamic payload for {codec}"))
    })?;
    let pt = manager.lock().dynamic_payload()?;
    debug!("Assigned dynamic payload {} to {}", pt, codec);
    Ok(pt)
}

/// RTP header extensions configured on a handler, by id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtmapRegistry {
    entries: BTreeMap<u16, String>,
}

impl ExtmapRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `uri` under an explicit id
    pub fn add(&mut self, id: u16, uri: impl Into<String>) -> Result<()> {
        if id == 0 {
            return Err(Error::InvalidArgument("extmap id 0 is reserved".to_string()));
        }
        if self.entries.contains_key(&id) {
            return Err(Error::DuplicateExtmapId(id));
        }
        self.entries.insert(id, uri.into());
        Ok(())
    }

    /// Registers `uri` under the lowest free one-byte id
    pub fn allocate(&mut self, uri: impl Into<String>) -> Result<u16> {
        let id = EXTMAP_ID_RANGE
            .clone()
            .find(|id| !self.entries.contains_key(id))
            .ok_or_else(|| Error::AllocationExhausted("no free extmap id".to_string()))?;
        self.entries.insert(id, uri.into());
        Ok(id)
    }

    pub fn contains_uri(&self, uri: &str) -> bool {
        self.entries.values().any(|u| u == uri)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, &str)> {
        self.entries.iter().map(|(id, uri)| (*id, uri.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
