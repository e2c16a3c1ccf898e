//! Offer/answer negotiation agent
//!
//! [`SdpAgent`] drives RFC 3264 negotiation for one session. It owns the
//! registered [`MediaHandler`]s and groups, and keeps three views of the
//! session: the local description being negotiated, the remote one, and the
//! negotiated context (the last agreed m-line layout with handler bindings).
//!
//! ```text
//!            create_offer          set_local_description      set_remote_description
//! Initial ──────────────> LocalOffer ─────────────> WaitNegotiation ─────────────> Negotiated
//!    │                                                                                 ^
//!    │ set_remote_description     create_answer + set_local_description              │
//!    └──────────────────> RemoteOffer ─────────────────────────────────────────────────┘
//! ```
//!
//! From `Negotiated` either side may start a new round. Every failing
//! operation leaves the agent untouched.

use crate::config::AgentConfig;
use crate::context::{SdpMessageContext, SdpType};
use crate::error::{Error, Result};
use crate::group::{GroupId, GroupSemantics, MediaGroup};
use crate::handler::{LocalAddress, MediaHandler};
use rand::RngCore;
use rvoip_sdp_core::{MediaDescription, Origin, SdpSession};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NegotiationState {
    Initial,
    LocalOffer,
    WaitNegotiation,
    RemoteOffer,
    Negotiated,
}

impl fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NegotiationState::Initial => "Initial",
            NegotiationState::LocalOffer => "LocalOffer",
            NegotiationState::WaitNegotiation => "WaitNegotiation",
            NegotiationState::RemoteOffer => "RemoteOffer",
            NegotiationState::Negotiated => "Negotiated",
        };
        f.write_str(name)
    }
}

/// Stable handle of a registered handler. Ids are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HandlerId(pub u32);

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handler-{}", self.0)
    }
}

#[derive(Debug, Clone)]
struct RegisteredHandler {
    id: HandlerId,
    kind: String,
    handler: MediaHandler,
}

/// Slot layout decided before the m-lines are generated
struct PlannedSlot {
    kind: String,
    protocol: String,
    handler: Option<HandlerId>,
    mid: Option<String>,
    rejected: bool,
}

#[derive(Debug, Clone)]
pub struct SdpAgent {
    config: AgentConfig,
    state: NegotiationState,
    handlers: Vec<RegisteredHandler>,
    next_handler_id: u32,
    groups: Vec<MediaGroup>,
    next_group_id: u32,
    session_id: u64,
    /// Generated by create_offer/create_answer, not yet set as local
    pending: Option<SdpMessageContext>,
    local: Option<SdpMessageContext>,
    remote: Option<SdpMessageContext>,
    /// Agreed layout with bindings; slots rejected by either side are rejected here
    negotiated: Option<SdpMessageContext>,
    /// Our own side of the last agreement, used for versioning
    negotiated_local: Option<SdpMessageContext>,
    local_description: Option<SdpSession>,
    agreed_local_description: Option<SdpSession>,
    remote_description: Option<SdpSession>,
}

impl SdpAgent {
    pub fn new(config: AgentConfig) -> Self {
        let session_id = rand::thread_rng().next_u64() & i64::MAX as u64;
        debug!("Creating SDP agent with session id {}", session_id);
        Self {
            config,
            state: NegotiationState::Initial,
            handlers: Vec::new(),
            next_handler_id: 0,
            groups: Vec::new(),
            next_group_id: 0,
            session_id,
            pending: None,
            local: None,
            remote: None,
            negotiated: None,
            negotiated_local: None,
            local_description: None,
            agreed_local_description: None,
            remote_description: None,
        }
    }

    pub fn with_address(use_ipv6: bool, addr: impl Into<String>) -> Self {
        Self::new(AgentConfig {
            use_ipv6,
            addr: Some(addr.into()),
            ..AgentConfig::default()
        })
    }

    pub fn state(&self) -> NegotiationState {
        self.state
    }

    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn set_use_ipv6(&mut self, use_ipv6: bool) {
        self.config.use_ipv6 = use_ipv6;
    }

    pub fn set_addr(&mut self, addr: impl Into<String>) {
        self.config.addr = Some(addr.into());
    }

    /// Last description passed to [`set_local_description`](Self::set_local_description)
    pub fn local_description(&self) -> Option<&SdpSession> {
        self.local_description.as_ref()
    }

    /// Last description passed to [`set_remote_description`](Self::set_remote_description)
    pub fn remote_description(&self) -> Option<&SdpSession> {
        self.remote_description.as_ref()
    }

    pub fn negotiated_context(&self) -> Option<&SdpMessageContext> {
        self.negotiated.as_ref()
    }

    pub fn local_context(&self) -> Option<&SdpMessageContext> {
        self.local.as_ref()
    }

    pub fn remote_context(&self) -> Option<&SdpMessageContext> {
        self.remote.as_ref()
    }

    pub fn handler(&self, id: HandlerId) -> Option<&MediaHandler> {
        self.handlers.iter().find(|r| r.id == id).map(|r| &r.handler)
    }

    pub fn handler_mut(&mut self, id: HandlerId) -> Option<&mut MediaHandler> {
        self.handlers.iter_mut().find(|r| r.id == id).map(|r| &mut r.handler)
    }

    /// Registered handlers in registration order
    pub fn handlers(&self) -> impl Iterator<Item = (HandlerId, &str, &MediaHandler)> {
        self.handlers.iter().map(|r| (r.id, r.kind.as_str(), &r.handler))
    }

    pub fn groups(&self) -> &[MediaGroup] {
        &self.groups
    }

    fn ensure_configurable(&self, operation: &'static str) -> Result<()> {
        match self.state {
            NegotiationState::Initial | NegotiationState::Negotiated => Ok(()),
            state => Err(Error::invalid_state(operation, state)),
        }
    }

    fn is_registered(&self, id: HandlerId) -> bool {
        self.handlers.iter().any(|r| r.id == id)
    }

    /// Registers a copy of `handler` for media of `kind`
    pub fn add_handler(&mut self, kind: &str, handler: MediaHandler) -> Result<HandlerId> {
        self.ensure_configurable("add handler")?;
        if !handler.profile().supports_kind(kind) {
            return Err(Error::UnsupportedMedia(format!(
                "{} handler cannot serve {kind} media",
                handler.profile()
            )));
        }

        let id = HandlerId(self.next_handler_id);
        self.next_handler_id += 1;
        debug!("Registered {} {} as {}", kind, handler.profile(), id);
        self.handlers.push(RegisteredHandler {
            id,
            kind: kind.to_string(),
            handler,
        });
        Ok(id)
    }

    /// Detaches a handler; its slot becomes vacant on the next offer
    pub fn remove_handler(&mut self, id: HandlerId) -> Result<()> {
        self.ensure_configurable("remove handler")?;
        let pos = self
            .handlers
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| Error::not_found(id.to_string()))?;
        self.handlers.remove(pos);
        for group in &mut self.groups {
            group.remove(id);
        }
        debug!("Removed {}", id);
        Ok(())
    }

    pub fn create_group(&mut self, semantics: GroupSemantics) -> Result<GroupId> {
        self.ensure_configurable("create group")?;
        let id = GroupId(self.next_group_id);
        self.next_group_id += 1;
        debug!("Created {} group {}", semantics, id);
        self.groups.push(MediaGroup::new(id, semantics));
        Ok(id)
    }

    pub fn create_bundle_group(&mut self) -> Result<GroupId> {
        self.create_group(GroupSemantics::Bundle)
    }

    pub fn add_handler_to_group(&mut self, group: GroupId, handler: HandlerId) -> Result<()> {
        self.ensure_configurable("add handler to group")?;
        if !self.is_registered(handler) {
            return Err(Error::not_found(handler.to_string()));
        }
        let semantics = self
            .groups
            .iter()
            .find(|g| g.id() == group)
            .map(|g| g.semantics().clone())
            .ok_or_else(|| Error::not_found(group.to_string()))?;

        if self
            .groups
            .iter()
            .any(|g| *g.semantics() == semantics && g.contains(handler))
        {
            return Err(Error::AlreadyInGroup {
                handler: handler.0,
                semantics: semantics.to_string(),
            });
        }

        if let Some(g) = self.groups.iter_mut().find(|g| g.id() == group) {
            g.add(handler);
        }
        Ok(())
    }

    pub fn remove_handler_from_group(&mut self, group: GroupId, handler: HandlerId) -> Result<()> {
        self.ensure_configurable("remove handler from group")?;
        let g = self
            .groups
            .iter_mut()
            .find(|g| g.id() == group)
            .ok_or_else(|| Error::not_found(group.to_string()))?;
        if !g.remove(handler) {
            return Err(Error::not_found(format!("{handler} in {group}")));
        }
        Ok(())
    }

    fn local_address(&self) -> LocalAddress {
        let address = self.config.addr.clone().unwrap_or_else(|| {
            if self.config.use_ipv6 { "::" } else { "0.0.0.0" }.to_string()
        });
        LocalAddress {
            use_ipv6: self.config.use_ipv6,
            address,
        }
    }

    fn new_context(&self, sdp_type: SdpType) -> SdpMessageContext {
        let addr = self.local_address();
        let origin = Origin::new(
            self.config.username.clone(),
            self.session_id,
            0,
            addr.addr_type(),
            addr.address.clone(),
        );
        let mut ctx = SdpMessageContext::new(sdp_type, origin, self.config.session_name.clone());
        ctx.set_connection(addr.connection());
        ctx
    }

    /// Same version as the last local description of an agreement when
    /// nothing but SDES keys differs, otherwise one past it. An offer never
    /// equals an earlier answer. The first description is version 0.
    fn next_version(&self, ctx: &SdpMessageContext) -> u64 {
        match &self.negotiated_local {
            None => 0,
            Some(prev) => {
                let unchanged = prev.sdp_type() == ctx.sdp_type()
                    && prev.connection() == ctx.connection()
                    && prev.groups() == ctx.groups()
                    && prev.media_fingerprint() == ctx.media_fingerprint();
                if unchanged { prev.version() } else { prev.version() + 1 }
            }
        }
    }

    fn apply_groups(&self, ctx: &mut SdpMessageContext) {
        for group in &self.groups {
            let mids: Vec<String> = ctx
                .slots()
                .iter()
                .filter(|s| !s.is_rejected())
                .filter(|s| s.handler.is_some_and(|h| group.contains(h)))
                .filter_map(|s| s.mid().map(str::to_string))
                .collect();
            if mids.is_empty() {
                debug!("{} {} has no active media, omitted", group.semantics(), group.id());
                continue;
            }
            ctx.add_group(group.semantics().as_str(), mids);
        }
    }

    fn plan_offer(&self) -> Vec<PlannedSlot> {
        let mut plan = Vec::new();
        let mut bound = HashSet::new();

        if let Some(negotiated) = &self.negotiated {
            for slot in negotiated.slots() {
                let handler = slot.handler.filter(|id| self.is_registered(*id));
                if let Some(id) = handler {
                    bound.insert(id);
                }
                plan.push(PlannedSlot {
                    kind: slot.kind().to_string(),
                    protocol: slot.media.protocol.clone(),
                    handler,
                    mid: slot.mid().map(str::to_string),
                    rejected: slot.is_rejected(),
                });
            }
        }

        let mut used_mids: Vec<String> = plan.iter().filter_map(|p| p.mid.clone()).collect();

        for reg in self.handlers.iter().filter(|r| !bound.contains(&r.id)) {
            let mid = next_mid(&reg.kind, &used_mids);
            used_mids.push(mid.clone());

            if let Some(vacant) = plan.iter_mut().find(|p| p.handler.is_none() && p.kind == reg.kind) {
                debug!("{} reuses vacant {} slot as {}", reg.id, reg.kind, mid);
                vacant.handler = Some(reg.id);
                vacant.protocol = reg.handler.protocol().to_string();
                vacant.mid = Some(mid);
                vacant.rejected = false;
            } else {
                plan.push(PlannedSlot {
                    kind: reg.kind.clone(),
                    protocol: reg.handler.protocol().to_string(),
                    handler: Some(reg.id),
                    mid: Some(mid),
                    rejected: false,
                });
            }
        }

        for planned in plan.iter_mut().filter(|p| p.mid.is_none()) {
            let mid = next_mid(&planned.kind, &used_mids);
            used_mids.push(mid.clone());
            planned.mid = Some(mid);
        }
        plan
    }

    /// Generates a local offer covering every registered handler
    pub fn create_offer(&mut self) -> Result<SdpSession> {
        self.ensure_configurable("create offer")?;

        let mut ctx = self.new_context(SdpType::Offer);
        for planned in self.plan_offer() {
            let active = planned.handler.filter(|_| !planned.rejected);
            let mut media = match active.and_then(|id| self.handler(id)) {
                Some(handler) => match handler.create_offer(&planned.kind) {
                    Ok(media) => media,
                    Err(e) if e.is_recoverable() => {
                        warn!("Offering {} media as rejected: {}", planned.kind, e);
                        MediaDescription::rejected(planned.kind.clone(), planned.protocol.clone())
                    }
                    Err(e) => return Err(e),
                },
                None => MediaDescription::rejected(planned.kind.clone(), planned.protocol.clone()),
            };
            if let Some(mid) = &planned.mid {
                media.set_mid(mid.clone());
            }
            ctx.push_slot(planned.handler, media);
        }
        self.apply_groups(&mut ctx);

        let version = self.next_version(&ctx);
        ctx.set_version(version);

        let sdp = ctx.pack();
        info!(
            "Created offer v{} with {} media for session {}",
            version,
            sdp.media_descriptions.len(),
            self.session_id
        );
        self.pending = Some(ctx);
        self.state = NegotiationState::LocalOffer;
        Ok(sdp)
    }

    /// Answers the remote offer set with [`set_remote_description`](Self::set_remote_description)
    pub fn create_answer(&mut self) -> Result<SdpSession> {
        if self.state != NegotiationState::RemoteOffer {
            return Err(Error::invalid_state("create answer", self.state));
        }
        let remote = self
            .remote
            .as_ref()
            .ok_or_else(|| Error::invalid_state("create answer", self.state))?;

        // Handlers bound by the last agreement, and where
        let mut previously_bound: HashMap<HandlerId, usize> = HashMap::new();
        if let Some(negotiated) = &self.negotiated {
            for slot in negotiated.slots() {
                if let Some(id) = slot.handler.filter(|id| self.is_registered(*id)) {
                    previously_bound.insert(id, slot.index);
                }
            }
        }

        let mut ctx = self.new_context(SdpType::Answer);
        let mut used = HashSet::new();

        for offered in remote.slots() {
            let offer = &offered.media;
            let previous = self
                .negotiated
                .as_ref()
                .and_then(|n| n.slots().get(offered.index))
                .and_then(|s| s.handler)
                .and_then(|id| self.handlers.iter().find(|r| r.id == id))
                .filter(|r| r.kind == offer.media && r.handler.manages(&offer.protocol));

            if offer.is_rejected() {
                let binding = previous.map(|r| r.id);
                if let Some(id) = binding {
                    used.insert(id);
                }
                ctx.push_slot(binding, rejected_like(offer));
                continue;
            }

            let candidate = previous.filter(|r| !used.contains(&r.id)).or_else(|| {
                self.handlers.iter().find(|r| {
                    !used.contains(&r.id)
                        && !previously_bound.contains_key(&r.id)
                        && r.kind == offer.media
                        && r.handler.manages(&offer.protocol)
                })
            });

            let Some(reg) = candidate else {
                debug!(
                    "No handler for {} {} at index {}, rejecting",
                    offer.media, offer.protocol, offered.index
                );
                ctx.push_slot(None, rejected_like(offer));
                continue;
            };

            used.insert(reg.id);
            match reg.handler.create_answer(offer) {
                Ok(media) => ctx.push_slot(Some(reg.id), media),
                Err(e) if e.is_recoverable() => {
                    info!("Rejecting {} media at index {}: {}", offer.media, offered.index, e);
                    ctx.push_slot(None, rejected_like(offer));
                }
                Err(e) => return Err(e),
            }
        }

        for group in remote.groups() {
            let semantics = GroupSemantics::from(group.semantics.as_str());
            let local_groups: Vec<&MediaGroup> =
                self.groups.iter().filter(|g| *g.semantics() == semantics).collect();
            if local_groups.is_empty() {
                debug!("No local {} group, not mirroring", semantics);
                continue;
            }

            let mids: Vec<String> = group
                .mids
                .iter()
                .filter(|mid| {
                    remote
                        .slot_by_mid(mid)
                        .and_then(|s| ctx.slots().get(s.index))
                        .filter(|answered| !answered.is_rejected())
                        .and_then(|answered| answered.handler)
                        .is_some_and(|h| local_groups.iter().any(|g| g.contains(h)))
                })
                .cloned()
                .collect();
            if !mids.is_empty() {
                ctx.add_group(group.semantics.clone(), mids);
            }
        }

        let version = self.next_version(&ctx);
        ctx.set_version(version);

        let sdp = ctx.pack();
        info!(
            "Created answer v{} with {} media for session {}",
            version,
            sdp.media_descriptions.len(),
            self.session_id
        );
        self.pending = Some(ctx);
        Ok(sdp)
    }

    /// Commits the description generated by the last create_offer/create_answer
    pub fn set_local_description(&mut self, sdp: &SdpSession) -> Result<()> {
        let state = self.state;
        if !matches!(state, NegotiationState::LocalOffer | NegotiationState::RemoteOffer) {
            return Err(Error::invalid_state("set local description", state));
        }
        let pending = self
            .pending
            .as_ref()
            .ok_or_else(|| Error::invalid_state("set local description", state))?;
        if sdp.media_descriptions.len() != pending.slots().len() {
            return Err(Error::MalformedInput(format!(
                "local description has {} media, generated {}",
                sdp.media_descriptions.len(),
                pending.slots().len()
            )));
        }

        let Some(ctx) = self.pending.take() else {
            return Err(Error::invalid_state("set local description", state));
        };
        self.local_description = Some(sdp.clone());

        if state == NegotiationState::LocalOffer {
            self.local = Some(ctx);
            self.state = NegotiationState::WaitNegotiation;
        } else {
            self.negotiated = Some(ctx.clone());
            self.negotiated_local = Some(ctx.clone());
            self.local = Some(ctx);
            self.agreed_local_description = Some(sdp.clone());
            self.state = NegotiationState::Negotiated;
        }
        debug!("Local description set, state {}", self.state);
        Ok(())
    }

    /// Takes a remote offer (in `Initial`/`Negotiated`) or the answer to our
    /// offer (in `WaitNegotiation`)
    pub fn set_remote_description(&mut self, sdp: &SdpSession) -> Result<()> {
        match self.state {
            NegotiationState::Initial | NegotiationState::Negotiated => self.accept_remote_offer(sdp),
            NegotiationState::WaitNegotiation => self.accept_remote_answer(sdp),
            state => Err(Error::invalid_state("set remote description", state)),
        }
    }

    fn accept_remote_offer(&mut self, sdp: &SdpSession) -> Result<()> {
        let ctx = SdpMessageContext::from_sdp(sdp, SdpType::Offer)?;
        if let Some(negotiated) = &self.negotiated {
            if ctx.slots().len() < negotiated.slots().len() {
                return Err(Error::MalformedInput(format!(
                    "offer has {} media, {} were negotiated",
                    ctx.slots().len(),
                    negotiated.slots().len()
                )));
            }
        }

        info!("Remote offer with {} media", ctx.slots().len());
        self.remote = Some(ctx);
        self.remote_description = Some(sdp.clone());
        self.pending = None;
        self.state = NegotiationState::RemoteOffer;
        Ok(())
    }

    fn accept_remote_answer(&mut self, sdp: &SdpSession) -> Result<()> {
        let answer = SdpMessageContext::from_sdp(sdp, SdpType::Answer)?;
        let local = self
            .local
            .as_ref()
            .ok_or_else(|| Error::invalid_state("set remote description", self.state))?;

        if answer.slots().len() != local.slots().len() {
            return Err(Error::MalformedInput(format!(
                "answer has {} media, offer had {}",
                answer.slots().len(),
                local.slots().len()
            )));
        }
        if let Some((offered, answered)) = local
            .slots()
            .iter()
            .zip(answer.slots())
            .find(|(o, a)| o.kind() != a.kind())
        {
            return Err(Error::MalformedInput(format!(
                "answer media {} is {}, offered {}",
                offered.index,
                answered.kind(),
                offered.kind()
            )));
        }

        let mut agreed = local.clone();
        for (slot, answered) in agreed.slots_mut().iter_mut().zip(answer.slots()) {
            if answered.is_rejected() {
                if !slot.is_rejected() {
                    debug!("Peer rejected {} media at index {}", slot.kind(), slot.index);
                    let mid = slot.mid().map(str::to_string);
                    slot.media = MediaDescription::rejected(slot.kind().to_string(), slot.media.protocol.clone());
                    if let Some(mid) = mid {
                        slot.media.set_mid(mid);
                    }
                }
                continue;
            }
            if let Some(handler) = slot.handler.and_then(|id| self.handler(id)) {
                handler.process_answer(&answered.media);
            }
        }

        self.negotiated_local = Some(local.clone());
        self.negotiated = Some(agreed);
        self.agreed_local_description = self.local_description.clone();
        self.remote = Some(answer);
        self.remote_description = Some(sdp.clone());
        self.state = NegotiationState::Negotiated;
        info!("Negotiation completed for session {}", self.session_id);
        Ok(())
    }

    /// Drops a local offer that was not answered
    pub fn cancel_offer(&mut self) -> Result<()> {
        if !matches!(
            self.state,
            NegotiationState::LocalOffer | NegotiationState::WaitNegotiation
        ) {
            return Err(Error::invalid_state("cancel offer", self.state));
        }

        self.pending = None;
        self.local = self.negotiated_local.clone();
        self.local_description = self.agreed_local_description.clone();
        self.state = if self.negotiated.is_some() {
            NegotiationState::Negotiated
        } else {
            NegotiationState::Initial
        };
        debug!("Offer cancelled, back to {}", self.state);
        Ok(())
    }
}

/// Rejected answer to `offer`: kind and protocol echoed, mid kept
fn rejected_like(offer: &MediaDescription) -> MediaDescription {
    let mut media = MediaDescription::rejected(offer.media.clone(), offer.protocol.clone());
    if let Some(mid) = offer.mid() {
        media.set_mid(mid);
    }
    media
}

/// `<kind><n>` with `n` one past the highest ordinal already used for `kind`
fn next_mid(kind: &str, used: &[String]) -> String {
    let mut ordinal = used
        .iter()
        .filter_map(|mid| mid.strip_prefix(kind))
        .filter_map(|n| n.parse::<u32>().ok())
        .max()
        .map_or(0, |max| max + 1);
    loop {
        let mid = format!("{kind}{ordinal}");
        if !used.contains(&mid) {
            return mid;
        }
        ordinal += 1;
    }
}
