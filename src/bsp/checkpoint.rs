//! Barrier checkpoints
//!
//! A checkpoint is taken between rounds: every node's state plus the
//! messages sent in the last executed round, which the next round delivers.

use bytes::Bytes;
use std::collections::BTreeMap;

use crate::auction::message::{AuctionMessage, Envelope};
use crate::auction::state::NodeState;
use crate::auction::types::NodeId;
use crate::codec::{WireReader, WireWriter};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    /// Number of rounds executed when the checkpoint was taken
    pub round: u64,
    pub states: BTreeMap<NodeId, NodeState>,
    pub in_flight: Vec<Envelope>,
}

impl Checkpoint {
    pub fn encode(&self) -> Bytes {
        let mut w = WireWriter::new();
        w.write_varint(self.round);
        w.write_varint(self.states.len() as u64);
        for (id, state) in &self.states {
            w.write_str(id.as_str());
            state.write_to(&mut w);
        }
        w.write_varint(self.in_flight.len() as u64);
        for envelope in &self.in_flight {
            w.write_str(envelope.to.as_str());
            envelope.message.write_to(&mut w);
        }
        w.freeze()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut r = WireReader::new(bytes);
        let round = r.read_varint()?;

        let count = r.read_len()?;
        let mut states = BTreeMap::new();
        for _ in 0..count {
            let id = read_id(&mut r)?;
            let state = NodeState::read_from(&mut r)?;
            if states.insert(id.clone(), state).is_some() {
                return Err(Error::decode(format!("duplicate state for {id}")));
            }
        }

        let count = r.read_len()?;
        let mut in_flight = Vec::with_capacity(count);
        for _ in 0..count {
            let to = read_id(&mut r)?;
            let message = AuctionMessage::read_from(&mut r)?;
            in_flight.push(Envelope::new(to, message));
        }

        r.finish()?;
        Ok(Self {
            round,
            states,
            in_flight,
        })
    }
}

fn read_id(r: &mut WireReader<'_>) -> Result<NodeId> {
    let raw = r.read_string()?;
    NodeId::new(raw).map_err(|_| Error::decode("empty node id in checkpoint"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auction::types::Role;
    use rust_decimal::Decimal;

    fn sample() -> Checkpoint {
        let mut bidder = NodeState::new(Role::Bidder);
        bidder.observe_price(NodeId::from("X"), Decimal::new(35, 1));
        let mut item = NodeState::new(Role::Item);
        item.set_price(Decimal::new(35, 1));
        item.set_match_id(NodeId::from("A"));

        let mut states = BTreeMap::new();
        states.insert(NodeId::from("A"), bidder);
        states.insert(NodeId::from("X"), item);
        Checkpoint {
            round: 2,
            states,
            in_flight: vec![Envelope::new(
                NodeId::from("A"),
                AuctionMessage::Assign {
                    from: NodeId::from("X"),
                    price: Decimal::new(35, 1),
                },
            )],
        }
    }

    #[test]
    fn decode_inverts_encode() {
        let checkpoint = sample();
        assert_eq!(Checkpoint::decode(&checkpoint.encode()).unwrap(), checkpoint);
    }

    #[test]
    fn truncated_checkpoint_is_a_decode_error() {
        let bytes = sample().encode();
        for cut in 0..bytes.len() {
            assert!(
                matches!(Checkpoint::decode(&bytes[..cut]), Err(Error::Decode(_))),
                "prefix of {cut} bytes decoded"
            );
        }
    }

    #[test]
    fn trailing_garbage_is_rejected() {
        let mut bytes = sample().encode().to_vec();
        bytes.push(0);
        assert!(matches!(Checkpoint::decode(&bytes), Err(Error::Decode(_))));
    }
}
