//! Auction messages, their wire encoding, and per-round inbox bucketing

use bytes::Bytes;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::types::NodeId;
use crate::codec::{WireReader, WireWriter};
use crate::error::{Error, Result};

/// Wire tag of each message kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageKind {
    Bid = 0,
    Assign = 1,
    Release = 2,
    PriceUpdate = 3,
}

impl TryFrom<u8> for MessageKind {
    type Error = Error;

    fn try_from(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(Self::Bid),
            1 => Ok(Self::Assign),
            2 => Ok(Self::Release),
            3 => Ok(Self::PriceUpdate),
            other => Err(Error::decode(format!("unknown message kind tag {other}"))),
        }
    }
}

/// The only unit of inter-node communication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuctionMessage {
    /// Bidder offers `price` for the receiving item
    Bid { from: NodeId, price: Decimal },
    /// Item accepts the receiving bidder at `price`
    Assign { from: NodeId, price: Decimal },
    /// Sender drops its match with the receiver
    Release { from: NodeId },
    /// Item announces its new `price`
    PriceUpdate { from: NodeId, price: Decimal },
}

impl AuctionMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Bid { .. } => MessageKind::Bid,
            Self::Assign { .. } => MessageKind::Assign,
            Self::Release { .. } => MessageKind::Release,
            Self::PriceUpdate { .. } => MessageKind::PriceUpdate,
        }
    }

    pub fn sender(&self) -> &NodeId {
        match self {
            Self::Bid { from, .. }
            | Self::Assign { from, .. }
            | Self::Release { from }
            | Self::PriceUpdate { from, .. } => from,
        }
    }

    /// Price carried by the message; `None` for `Release`
    pub fn price(&self) -> Option<Decimal> {
        match self {
            Self::Bid { price, .. }
            | Self::Assign { price, .. }
            | Self::PriceUpdate { price, .. } => Some(*price),
            Self::Release { .. } => None,
        }
    }

    /// Encode as: kind tag, sender id, price text (omitted for `Release`)
    pub fn encode(&self) -> Bytes {
        let mut w = WireWriter::new();
        self.write_to(&mut w);
        w.freeze()
    }

    pub fn write_to(&self, w: &mut WireWriter) {
        w.write_u8(self.kind() as u8);
        w.write_str(self.sender().as_str());
        if let Some(price) = self.price() {
            w.write_decimal(&price);
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut r = WireReader::new(bytes);
        let message = Self::read_from(&mut r)?;
        r.finish()?;
        Ok(message)
    }

    pub fn read_from(r: &mut WireReader<'_>) -> Result<Self> {
        let kind = MessageKind::try_from(r.read_u8()?)?;
        let from = r.read_string()?;
        if from.is_empty() {
            return Err(Error::decode("message without sender"));
        }
        let from = NodeId::from(from.as_str());
        Ok(match kind {
            MessageKind::Bid => Self::Bid {
                from,
                price: r.read_decimal()?,
            },
            MessageKind::Assign => Self::Assign {
                from,
                price: r.read_decimal()?,
            },
            MessageKind::Release => Self::Release { from },
            MessageKind::PriceUpdate => Self::PriceUpdate {
                from,
                price: r.read_decimal()?,
            },
        })
    }
}

/// A message addressed to one node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub to: NodeId,
    pub message: AuctionMessage,
}

impl Envelope {
    pub fn new(to: NodeId, message: AuctionMessage) -> Self {
        Self { to, message }
    }
}

/// One round's inbound batch, bucketed by kind
///
/// Each bucket is sorted by (sender, price) so processing never depends on
/// the order the round engine delivered the batch in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inbox {
    pub releases: Vec<NodeId>,
    pub assigns: Vec<(NodeId, Decimal)>,
    pub price_updates: Vec<(NodeId, Decimal)>,
    pub bids: Vec<(NodeId, Decimal)>,
}

impl Inbox {
    pub fn new(messages: impl IntoIterator<Item = AuctionMessage>) -> Self {
        let mut inbox = Self::default();
        for message in messages {
            match message {
                AuctionMessage::Release { from } => inbox.releases.push(from),
                AuctionMessage::Assign { from, price } => inbox.assigns.push((from, price)),
                AuctionMessage::PriceUpdate { from, price } => {
                    inbox.price_updates.push((from, price))
                }
                AuctionMessage::Bid { from, price } => inbox.bids.push((from, price)),
            }
        }
        inbox.releases.sort();
        inbox.releases.dedup();
        inbox.assigns.sort();
        inbox.price_updates.sort();
        inbox.bids.sort();
        inbox
    }
}
