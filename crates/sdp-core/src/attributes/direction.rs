//! SDP media direction attributes (RFC 3264 section 5.1)
//!
//! `a=sendrecv`, `a=sendonly`, `a=recvonly` and `a=inactive` are property
//! attributes without a value; absence means `sendrecv`.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Direction of a media stream as seen by the party that wrote the description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum MediaDirection {
    /// Send and receive
    #[default]
    SendRecv,
    /// Send only
    SendOnly,
    /// Receive only
    RecvOnly,
    /// Neither send nor receive
    Inactive,
}

impl MediaDirection {
    /// Attribute name as it appears on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaDirection::SendRecv => "sendrecv",
            MediaDirection::SendOnly => "sendonly",
            MediaDirection::RecvOnly => "recvonly",
            MediaDirection::Inactive => "inactive",
        }
    }

    /// Returns true if `name` is one of the four direction attributes
    pub fn is_direction(name: &str) -> bool {
        name.parse::<MediaDirection>().is_ok()
    }

    pub fn sends(&self) -> bool {
        matches!(self, MediaDirection::SendRecv | MediaDirection::SendOnly)
    }

    pub fn receives(&self) -> bool {
        matches!(self, MediaDirection::SendRecv | MediaDirection::RecvOnly)
    }

    /// Builds a direction from its send/receive capabilities
    pub fn from_flags(send: bool, recv: bool) -> Self {
        match (send, recv) {
            (true, true) => MediaDirection::SendRecv,
            (true, false) => MediaDirection::SendOnly,
            (false, true) => MediaDirection::RecvOnly,
            (false, false) => MediaDirection::Inactive,
        }
    }

    /// The mirror direction: `sendonly` and `recvonly` swap, the others stay.
    pub fn reverse(&self) -> Self {
        match self {
            MediaDirection::SendOnly => MediaDirection::RecvOnly,
            MediaDirection::RecvOnly => MediaDirection::SendOnly,
            other => *other,
        }
    }

    /// Direction an answerer with local capability `self` puts in reply to `offered`.
    ///
    /// The answerer can only send what the offerer is willing to receive and
    /// vice versa.
    pub fn answer_to(&self, offered: MediaDirection) -> Self {
        MediaDirection::from_flags(
            self.sends() && offered.receives(),
            self.receives() && offered.sends(),
        )
    }
}

impl fmt::Display for MediaDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaDirection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "sendrecv" => Ok(MediaDirection::SendRecv),
            "sendonly" => Ok(MediaDirection::SendOnly),
            "recvonly" => Ok(MediaDirection::RecvOnly),
            "inactive" => Ok(MediaDirection::Inactive),
            other => Err(Error::SdpParsingError(format!("Invalid direction: {other}"))),
        }
    }
}
