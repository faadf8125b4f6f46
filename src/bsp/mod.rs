//! Round-synchronisation collaborators
//!
//! The step engine never touches another vertex. Everything shared between
//! rounds goes through a [`RoundEngine`]: messages sent in round `k` are
//! handed out by `deliver(k + 1)`, and votes decide whether round `k + 1`
//! is needed at all.

pub mod checkpoint;
pub mod convergence;
pub mod job;

pub use checkpoint::Checkpoint;
pub use convergence::{ConvergenceAggregator, ConvergenceStatus};
pub use job::{AuctionJob, JobResult, NodeOutcome};

use std::collections::BTreeMap;

use crate::auction::message::{AuctionMessage, Envelope};
use crate::auction::types::{NodeId, Vote};

/// Minimal interface the auction needs from a superstep substrate
pub trait RoundEngine {
    /// Open `round` and hand out everything sent during the previous round,
    /// grouped by receiver.
    fn deliver(&mut self, round: u64) -> BTreeMap<NodeId, Vec<AuctionMessage>>;

    /// Queue a message for delivery at the start of the next round
    fn send(&mut self, envelope: Envelope);

    fn vote(&mut self, node: &NodeId, vote: Vote);

    /// True once a round ended with only halt votes and nothing in flight
    fn is_converged(&self) -> bool;

    /// Undelivered messages, for checkpointing at a barrier
    fn in_flight(&self) -> Vec<Envelope>;

    /// Replace the in-flight queue with messages from a checkpoint
    fn restore_in_flight(&mut self, envelopes: Vec<Envelope>);
}

/// Single-process round engine backed by an in-memory mailbox
#[derive(Debug, Default)]
pub struct LocalRoundEngine {
    outgoing: BTreeMap<NodeId, Vec<AuctionMessage>>,
    aggregator: ConvergenceAggregator,
}

impl LocalRoundEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn aggregator(&self) -> &ConvergenceAggregator {
        &self.aggregator
    }
}

impl RoundEngine for LocalRoundEngine {
    fn deliver(&mut self, round: u64) -> BTreeMap<NodeId, Vec<AuctionMessage>> {
        self.aggregator.begin_round(round);
        std::mem::take(&mut self.outgoing)
    }

    fn send(&mut self, envelope: Envelope) {
        self.aggregator.record_messages(1);
        self.outgoing
            .entry(envelope.to)
            .or_default()
            .push(envelope.message);
    }

    fn vote(&mut self, node: &NodeId, vote: Vote) {
        self.aggregator.record_vote(node, vote);
    }

    fn is_converged(&self) -> bool {
        self.outgoing.is_empty() && self.aggregator.status() == ConvergenceStatus::Converged
    }

    fn in_flight(&self) -> Vec<Envelope> {
        self.outgoing
            .iter()
            .flat_map(|(to, messages)| {
                messages
                    .iter()
                    .map(|message| Envelope::new(to.clone(), message.clone()))
            })
            .collect()
    }

    fn restore_in_flight(&mut self, envelopes: Vec<Envelope>) {
        self.outgoing.clear();
        self.aggregator = ConvergenceAggregator::new();
        for envelope in envelopes {
            self.outgoing
                .entry(envelope.to)
                .or_default()
                .push(envelope.message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn messages_cross_exactly_one_barrier() {
        let mut engine = LocalRoundEngine::new();
        assert!(engine.deliver(0).is_empty());
        engine.send(Envelope::new(
            NodeId::from("X"),
            AuctionMessage::Bid {
                from: NodeId::from("A"),
                price: Decimal::ONE,
            },
        ));
        engine.vote(&NodeId::from("A"), Vote::Continue);
        assert!(!engine.is_converged());

        let inbound = engine.deliver(1);
        assert_eq!(inbound[&NodeId::from("X")].len(), 1);
        assert!(engine.in_flight().is_empty());
        engine.vote(&NodeId::from("X"), Vote::Halt);
        assert!(engine.is_converged());
        assert!(engine.deliver(2).is_empty());
    }

    #[test]
    fn restored_queue_is_delivered_next() {
        let mut engine = LocalRoundEngine::new();
        let envelope = Envelope::new(
            NodeId::from("B"),
            AuctionMessage::Release {
                from: NodeId::from("Y"),
            },
        );
        engine.restore_in_flight(vec![envelope.clone()]);
        assert_eq!(engine.in_flight(), vec![envelope]);
        assert!(!engine.is_converged());
        let inbound = engine.deliver(7);
        assert_eq!(inbound.len(), 1);
    }
}
