//! Media groups (RFC 5888), BUNDLE in particular

use crate::agent::HandlerId;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(pub u32);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group-{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupSemantics {
    Bundle,
    Other(String),
}

impl GroupSemantics {
    pub fn as_str(&self) -> &str {
        match self {
            GroupSemantics::Bundle => "BUNDLE",
            GroupSemantics::Other(s) => s,
        }
    }
}

impl From<&str> for GroupSemantics {
    fn from(s: &str) -> Self {
        if s.eq_ignore_ascii_case("BUNDLE") {
            GroupSemantics::Bundle
        } else {
            GroupSemantics::Other(s.to_string())
        }
    }
}

impl fmt::Display for GroupSemantics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handlers whose media are announced together in one `a=group` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaGroup {
    id: GroupId,
    semantics: GroupSemantics,
    members: Vec<HandlerId>,
}

impl MediaGroup {
    pub fn new(id: GroupId, semantics: GroupSemantics) -> Self {
        Self {
            id,
            semantics,
            members: Vec::new(),
        }
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn semantics(&self) -> &GroupSemantics {
        &self.semantics
    }

    /// Members in insertion order
    pub fn members(&self) -> &[HandlerId] {
        &self.members
    }

    pub fn contains(&self, handler: HandlerId) -> bool {
        self.members.contains(&handler)
    }

    pub(crate) fn add(&mut self, handler: HandlerId) {
        if !self.contains(handler) {
            self.members.push(handler);
        }
    }

    /// Returns false if the handler was not a member
    pub(crate) fn remove(&mut self, handler: HandlerId) -> bool {
        let before = self.members.len();
        self.members.retain(|h| *h != handler);
        self.members.len() != before
    }
}
