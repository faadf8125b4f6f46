//! Mutable per-node auction state and its wire encoding

use bytes::Bytes;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::types::{NodeId, Role};
use crate::codec::{WireReader, WireWriter};
use crate::error::{Error, Result};

/// Round-to-round persisted state of one node
///
/// Owned exclusively by its vertex and mutated only by that vertex's step.
/// `price` is the item's current price; bidders keep it at zero and track
/// item prices in `price_index` instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeState {
    role: Role,
    match_id: Option<NodeId>,
    price: Decimal,
    price_index: BTreeMap<NodeId, Decimal>,
}

impl NodeState {
    /// Initial state: unmatched, zero price, empty price index
    pub fn new(role: Role) -> Self {
        Self {
            role,
            match_id: None,
            price: Decimal::ZERO,
            price_index: BTreeMap::new(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_bidder(&self) -> bool {
        self.role.is_bidder()
    }

    pub fn match_id(&self) -> Option<&NodeId> {
        self.match_id.as_ref()
    }

    pub fn is_matched(&self) -> bool {
        self.match_id.is_some()
    }

    pub fn set_match_id(&mut self, id: NodeId) {
        self.match_id = Some(id);
    }

    pub fn clear_match_id(&mut self) -> Option<NodeId> {
        self.match_id.take()
    }

    pub fn price(&self) -> Decimal {
        self.price
    }

    pub fn set_price(&mut self, price: Decimal) {
        self.price = price;
    }

    pub fn price_index(&self) -> &BTreeMap<NodeId, Decimal> {
        &self.price_index
    }

    /// Last known price of `item`, zero if never heard of
    pub fn known_price(&self, item: &NodeId) -> Decimal {
        self.price_index.get(item).copied().unwrap_or_default()
    }

    /// Record a price observation; cached prices never move down.
    pub fn observe_price(&mut self, item: NodeId, price: Decimal) {
        let slot = self.price_index.entry(item).or_insert(price);
        if price > *slot {
            *slot = price;
        }
    }

    /// Encode as: role flag, item price (items only), match id (empty when
    /// absent), count-prefixed (id, price) pairs in id order.
    pub fn encode(&self) -> Bytes {
        let mut w = WireWriter::new();
        self.write_to(&mut w);
        w.freeze()
    }

    pub fn write_to(&self, w: &mut WireWriter) {
        w.write_bool(self.role.is_bidder());
        if !self.role.is_bidder() {
            w.write_decimal(&self.price);
        }
        w.write_str(self.match_id.as_ref().map_or("", NodeId::as_str));
        w.write_varint(self.price_index.len() as u64);
        for (id, price) in &self.price_index {
            w.write_str(id.as_str());
            w.write_decimal(price);
        }
    }

    /// Decode a complete frame produced by [`NodeState::encode`]
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut r = WireReader::new(bytes);
        let state = Self::read_from(&mut r)?;
        r.finish()?;
        Ok(state)
    }

    pub fn read_from(r: &mut WireReader<'_>) -> Result<Self> {
        let role = if r.read_bool()? { Role::Bidder } else { Role::Item };
        let price = match role {
            Role::Item => r.read_decimal()?,
            Role::Bidder => Decimal::ZERO,
        };
        let match_id = r.read_string()?;
        let match_id = (!match_id.is_empty()).then(|| NodeId::from(match_id.as_str()));

        let count = r.read_len()?;
        let mut price_index = BTreeMap::new();
        for _ in 0..count {
            let id = r.read_string()?;
            if id.is_empty() {
                return Err(Error::decode("empty id in price index"));
            }
            let price = r.read_decimal()?;
            price_index.insert(NodeId::from(id.as_str()), price);
        }

        Ok(Self {
            role,
            match_id,
            price,
            price_index,
        })
    }
}
