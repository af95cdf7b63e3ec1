//! How a peer answers each kind of request.
//!
//! Peers are not trusted: a response policy decides, per request kind and
//! peer, whether the peer serves real data, a range with one forged chunk,
//! or nothing at all.

#[cfg(test)]
#[path = "tests/policy.rs"]
mod tests;

use core::fmt;

use replica_primitives::ReplicaId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Blocks,
    Deltas,
    Snapshot,
}

impl RequestKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Blocks => "blocks",
            Self::Deltas => "deltas",
            Self::Snapshot => "snapshot",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum Response {
    /// Real data for the whole range.
    #[default]
    Normal,
    /// Real data except for one forged chunk at the range midpoint.
    Corrupt,
    /// An empty stream that closes immediately.
    Timeout,
}

impl Response {
    /// Case-insensitive lookup by name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        [Self::Normal, Self::Corrupt, Self::Timeout]
            .into_iter()
            .find(|response| response.as_str().eq_ignore_ascii_case(name))
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Corrupt => "corrupt",
            Self::Timeout => "timeout",
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("unsupported response {response:?} for {kind} request to {peer}")]
pub struct UnsupportedResponse {
    pub kind: RequestKind,
    pub peer: ReplicaId,
    pub response: String,
}

pub trait ResponsePolicy: Send + Sync {
    fn respond(&self, kind: RequestKind, peer: ReplicaId) -> Result<Response, UnsupportedResponse>;
}

/// Every peer answers every request honestly.
#[derive(Copy, Clone, Debug, Default)]
pub struct AlwaysNormal;

impl ResponsePolicy for AlwaysNormal {
    fn respond(&self, _kind: RequestKind, _peer: ReplicaId) -> Result<Response, UnsupportedResponse> {
        Ok(Response::Normal)
    }
}

impl<F> ResponsePolicy for F
where
    F: Fn(RequestKind, ReplicaId) -> Response + Send + Sync,
{
    fn respond(&self, kind: RequestKind, peer: ReplicaId) -> Result<Response, UnsupportedResponse> {
        Ok(self(kind, peer))
    }
}

/// One configured override. Unset selectors match anything.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PolicyRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<RequestKind>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer: Option<ReplicaId>,

    pub response: String,
}

impl PolicyRule {
    #[must_use]
    pub fn new(request: Option<RequestKind>, peer: Option<ReplicaId>, response: Response) -> Self {
        Self {
            request,
            peer,
            response: response.as_str().to_owned(),
        }
    }

    fn matches(&self, kind: RequestKind, peer: ReplicaId) -> bool {
        self.request.map_or(true, |request| request == kind)
            && self.peer.map_or(true, |target| target == peer)
    }
}

/// First matching rule wins; no match is [`Response::Normal`].
///
/// Response names are resolved when a request is made, so a rule naming an
/// unknown response only fails the requests it matches.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RulePolicy {
    rules: Vec<PolicyRule>,
}

impl RulePolicy {
    #[must_use]
    pub const fn new(rules: Vec<PolicyRule>) -> Self {
        Self { rules }
    }

    #[must_use]
    pub fn rules(&self) -> &[PolicyRule] {
        &self.rules
    }
}

impl ResponsePolicy for RulePolicy {
    fn respond(&self, kind: RequestKind, peer: ReplicaId) -> Result<Response, UnsupportedResponse> {
        let Some(rule) = self.rules.iter().find(|rule| rule.matches(kind, peer)) else {
            return Ok(Response::Normal);
        };

        Response::from_name(&rule.response).ok_or_else(|| UnsupportedResponse {
            kind,
            peer,
            response: rule.response.clone(),
        })
    }
}
