//! One negotiated media session
//!
//! [`MediaSession`] wraps an [`SdpAgent`] behind a re-entrant lock and
//! exposes the two common flows as single calls: generate an offer and
//! later process its answer, or process an offer and return the answer.
//! Other threads wait for the lock. A call made from inside
//! [`MediaSession::with_agent`] on the same thread fails with
//! [`Error::SessionBusy`].

use crate::agent::{NegotiationState, SdpAgent};
use crate::error::{Error, Result};
use parking_lot::ReentrantMutex;
use rvoip_sdp_core::SdpSession;
use std::cell::RefCell;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug)]
pub struct MediaSession {
    id: Uuid,
    agent: ReentrantMutex<RefCell<SdpAgent>>,
}

impl MediaSession {
    pub fn new(agent: SdpAgent) -> Self {
        let id = Uuid::new_v4();
        debug!("Created media session {}", id);
        Self {
            id,
            agent: ReentrantMutex::new(RefCell::new(agent)),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    fn read<R>(&self, operation: &'static str, f: impl FnOnce(&SdpAgent) -> R) -> Result<R> {
        let guard = self.agent.lock();
        let agent = guard.try_borrow().map_err(|_| Error::SessionBusy(operation))?;
        Ok(f(&agent))
    }

    fn write<R>(&self, operation: &'static str, f: impl FnOnce(&mut SdpAgent) -> R) -> Result<R> {
        let guard = self.agent.lock();
        let mut agent = guard.try_borrow_mut().map_err(|_| Error::SessionBusy(operation))?;
        Ok(f(&mut agent))
    }

    pub fn state(&self) -> Result<NegotiationState> {
        self.read("read state", SdpAgent::state)
    }

    /// Creates a local offer and sets it as the local description
    pub fn generate_offer(&self) -> Result<SdpSession> {
        self.write("generate offer", |agent| {
            let offer = agent.create_offer()?;
            if let Err(e) = agent.set_local_description(&offer) {
                // Leave the agent ready for another attempt
                let _ = agent.cancel_offer();
                return Err(e);
            }
            Ok(offer)
        })?
    }

    /// Answers a remote offer. On failure the session is left as it was.
    pub fn process_offer(&self, offer: &SdpSession) -> Result<SdpSession> {
        self.write("process offer", |agent| {
            let snapshot = agent.clone();
            let result = agent
                .set_remote_description(offer)
                .and_then(|_| agent.create_answer())
                .and_then(|answer| agent.set_local_description(&answer).map(|_| answer));

            if let Err(e) = &result {
                warn!("Session {} failed to process offer: {}", self.id, e);
                *agent = snapshot;
            }
            result
        })?
    }

    /// Completes negotiation with the answer to our last offer
    pub fn process_answer(&self, answer: &SdpSession) -> Result<()> {
        self.write("process answer", |agent| {
            if agent.state() != NegotiationState::WaitNegotiation {
                return Err(Error::invalid_state("process answer", agent.state()));
            }
            agent.set_remote_description(answer)
        })?
    }

    pub fn local_sdp(&self) -> Result<Option<SdpSession>> {
        self.read("read local description", |agent| agent.local_description().cloned())
    }

    pub fn remote_sdp(&self) -> Result<Option<SdpSession>> {
        self.read("read remote description", |agent| agent.remote_description().cloned())
    }

    pub fn set_use_ipv6(&self, use_ipv6: bool) -> Result<()> {
        self.write("set address family", |agent| agent.set_use_ipv6(use_ipv6))
    }

    pub fn set_addr(&self, addr: impl Into<String>) -> Result<()> {
        let addr = addr.into();
        self.write("set address", |agent| agent.set_addr(addr))
    }

    /// Runs `f` with exclusive access to the agent, e.g. to register handlers.
    /// Session calls made from inside `f` return [`Error::SessionBusy`].
    pub fn with_agent<R>(&self, f: impl FnOnce(&mut SdpAgent) -> R) -> Result<R> {
        self.write("access agent", f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::MediaHandler;

    fn session(addr: &str) -> MediaSession {
        let mut handler = MediaHandler::rtp_avp();
        handler.add_audio_codec("PCMU/8000/1").unwrap();
        let mut agent = SdpAgent::with_address(false, addr);
        agent.add_handler("audio", handler).unwrap();
        MediaSession::new(agent)
    }

    #[test]
    fn test_offer_answer_round() {
        let offerer = session("10.0.0.1");
        let answerer = session("10.0.0.2");

        let offer = offerer.generate_offer().unwrap();
        assert_eq!(offerer.state().unwrap(), NegotiationState::WaitNegotiation);
        let answer = answerer.process_offer(&offer).unwrap();
        offerer.process_answer(&answer).unwrap();

        assert_eq!(offerer.state().unwrap(), NegotiationState::Negotiated);
        assert_eq!(answerer.state().unwrap(), NegotiationState::Negotiated);
        assert_eq!(offerer.remote_sdp().unwrap(), Some(answer.clone()));
        assert_eq!(answerer.local_sdp().unwrap(), Some(answer));
    }

    #[test]
    fn test_answer_without_offer() {
        let offerer = session("10.0.0.1");
        let other = session("10.0.0.2");
        let offer = other.generate_offer().unwrap();
        assert!(matches!(
            offerer.process_answer(&offer),
            Err(Error::InvalidState { .. })
        ));
        assert_eq!(offerer.state().unwrap(), NegotiationState::Initial);
    }

    #[test]
    fn test_failed_offer_restores_agent() {
        let answerer = session("10.0.0.2");
        let mut offer = session("10.0.0.1").generate_offer().unwrap();
        let duplicate = offer.media_descriptions[0].clone();
        offer.media_descriptions.push(duplicate);

        assert!(matches!(answerer.process_offer(&offer), Err(Error::MalformedInput(_))));
        assert_eq!(answerer.state().unwrap(), NegotiationState::Initial);
        assert!(answerer.remote_sdp().unwrap().is_none());
    }

    #[test]
    fn test_nested_call_fails_instead_of_panicking() {
        let session = session("10.0.0.1");
        let nested = session.with_agent(|agent| {
            agent.set_addr("10.0.0.3");
            (session.state(), session.generate_offer().map(|_| ()))
        });
        let (state, offer) = nested.unwrap();
        assert_eq!(state, Err(Error::SessionBusy("read state")));
        assert_eq!(offer, Err(Error::SessionBusy("generate offer")));

        // the session is usable again once the outer call returns
        assert_eq!(session.state().unwrap(), NegotiationState::Initial);
        let offer = session.generate_offer().unwrap();
        assert_eq!(offer.origin.unicast_address, "10.0.0.3");
    }

    #[test]
    fn test_other_threads_wait_for_the_lock() {
        let session = session("10.0.0.1");
        std::thread::scope(|scope| {
            session
                .with_agent(|_| {
                    scope.spawn(|| session.generate_offer().unwrap());
                })
                .unwrap();
        });
        assert_eq!(session.state().unwrap(), NegotiationState::WaitNegotiation);
    }
}
