//! Node identities, roles and immutable node records

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{Error, Result};

/// Opaque, totally ordered node identity
///
/// Ordering is used for every tie-break ("smallest identity wins") and for
/// deterministic iteration. Identities are never empty; the empty string is
/// reserved on the wire for "no match".
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(Error::record("node id must not be empty"));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unchecked conversion; records and wire decoding reject empty ids.
impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Bidder,
    Item,
}

impl Role {
    pub fn is_bidder(self) -> bool {
        matches!(self, Self::Bidder)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bidder => f.write_str("bidder"),
            Self::Item => f.write_str("item"),
        }
    }
}

/// Bidder-to-item edge; the weight is the bidder's value for the item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub target: NodeId,
    pub weight: Decimal,
}

impl Edge {
    pub fn new(target: impl Into<NodeId>, weight: Decimal) -> Self {
        Self {
            target: target.into(),
            weight,
        }
    }
}

/// Largest accepted edge weight magnitude, 10^24
///
/// Leaves four orders of magnitude of `Decimal` headroom for prices that
/// climb above the weights during bidding.
pub const MAX_WEIGHT: Decimal = Decimal::from_parts(2_701_131_776, 466_537_709, 54_210, false, 0);

/// Immutable description of one node after input loading
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub role: Role,
    /// Outgoing edges, sorted by target; always empty for items
    pub edges: Vec<Edge>,
}

impl NodeRecord {
    /// Build a record and check its role/edge shape
    pub fn new(id: NodeId, role: Role, mut edges: Vec<Edge>) -> Result<Self> {
        edges.sort_by(|a, b| a.target.cmp(&b.target));
        let record = Self { id, role, edges };
        record.validate()?;
        Ok(record)
    }

    pub fn bidder(id: impl Into<NodeId>, edges: Vec<Edge>) -> Result<Self> {
        Self::new(id.into(), Role::Bidder, edges)
    }

    pub fn item(id: impl Into<NodeId>) -> Result<Self> {
        Self::new(id.into(), Role::Item, Vec::new())
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.as_str().is_empty() {
            return Err(Error::record("node id must not be empty"));
        }
        if self.role == Role::Item && !self.edges.is_empty() {
            return Err(Error::record(format!(
                "item {} must not carry edges",
                self.id
            )));
        }
        let mut seen = BTreeSet::new();
        for edge in &self.edges {
            if edge.target == self.id {
                return Err(Error::record(format!("bidder {} has a self-edge", self.id)));
            }
            if edge.weight.abs() > MAX_WEIGHT {
                return Err(Error::record(format!(
                    "bidder {} has weight {} to {} beyond the limit of {}",
                    self.id, edge.weight, edge.target, MAX_WEIGHT
                )));
            }
            if !seen.insert(&edge.target) {
                return Err(Error::record(format!(
                    "bidder {} has duplicate edge to {}",
                    self.id, edge.target
                )));
            }
        }
        Ok(())
    }

    pub fn weight_to(&self, target: &NodeId) -> Option<Decimal> {
        self.edges
            .binary_search_by(|e| e.target.cmp(target))
            .ok()
            .map(|idx| self.edges[idx].weight)
    }
}

/// A node's per-round signal to the round engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Vote {
    Continue,
    Halt,
}
