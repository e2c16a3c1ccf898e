//! Per-media extensions
//!
//! An extension is attached to a [`MediaHandler`](crate::handler::MediaHandler)
//! and gets a chance to contribute attributes whenever the handler builds an
//! offer or an answer, to claim offered attributes the handler would drop,
//! and to observe the final answer.

use crate::error::Result;
use rvoip_sdp_core::{MediaDescription, ParsedAttribute};
use std::fmt;

pub mod connection;
pub mod sdes;

pub use connection::{AddressType, ConnectionAddress, ConnectionAddressProvider, ConnectionExtension};
pub use sdes::{RandomKeyProvider, SdesExtension, SdesKey, SdesKeyProvider, SdesSelection, SrtpSuite};

/// Behavior plugged into a media handler.
///
/// Errors returned from the `add_*`/`process_*` hooks are logged by the
/// handler and do not fail the negotiation. The exception is a recoverable
/// error from [`add_answer_attributes`](MediaExtension::add_answer_attributes),
/// which rejects the answered media.
pub trait MediaExtension: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Claims an offered attribute for the answer
    fn can_insert_attribute(
        &self,
        _offer: &MediaDescription,
        _attr: &ParsedAttribute,
        _answer: &MediaDescription,
    ) -> bool {
        false
    }

    fn add_offer_attributes(&self, offer: &mut MediaDescription) -> Result<()>;

    fn add_answer_attributes(&self, offer: &MediaDescription, answer: &mut MediaDescription) -> Result<()>;

    /// Called on the offerer once the answer for this media arrived
    fn process_answer_attributes(&self, _answer: &MediaDescription) -> Result<()> {
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn MediaExtension>;
}

impl Clone for Box<dyn MediaExtension> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}
