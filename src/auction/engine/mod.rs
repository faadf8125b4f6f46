//! Per-round auction step
//!
//! Every round the round engine hands each [`Vertex`] the messages addressed
//! to it. The vertex buckets them by kind, applies them in the fixed order
//! RELEASE, ASSIGN, PRICE_UPDATE, BID, and answers with its outbound messages
//! plus a vote. Bidders and items share nothing but messages.

mod bidder;
mod item;

use serde::{Deserialize, Serialize};

use super::message::{AuctionMessage, Envelope, Inbox};
use super::state::NodeState;
use super::types::{NodeId, NodeRecord, Role, Vote};
use crate::config::JobConfig;
use crate::error::{Error, Result};

/// What one vertex produced in one round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutput {
    pub outbox: Vec<Envelope>,
    pub vote: Vote,
}

impl StepOutput {
    pub(crate) fn halt(outbox: Vec<Envelope>) -> Self {
        Self {
            outbox,
            vote: Vote::Halt,
        }
    }

    pub(crate) fn proceed(outbox: Vec<Envelope>) -> Self {
        Self {
            outbox,
            vote: Vote::Continue,
        }
    }
}

/// A graph node as the round engine sees it: immutable record, neighbour
/// list, and the state only this vertex mutates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vertex {
    record: NodeRecord,
    /// Bidders: their edge targets. Items: every bidder with an edge to them.
    neighbors: Vec<NodeId>,
    state: NodeState,
}

impl Vertex {
    pub fn new(record: NodeRecord, neighbors: Vec<NodeId>) -> Self {
        let state = NodeState::new(record.role);
        Self {
            record,
            neighbors,
            state,
        }
    }

    /// Rebuild a vertex around a previously persisted state
    pub fn with_state(
        record: NodeRecord,
        neighbors: Vec<NodeId>,
        state: NodeState,
    ) -> Result<Self> {
        if state.role() != record.role {
            return Err(Error::decode(format!(
                "state of {} has role {}, record says {}",
                record.id,
                state.role(),
                record.role
            )));
        }
        Ok(Self {
            record,
            neighbors,
            state,
        })
    }

    pub fn id(&self) -> &NodeId {
        &self.record.id
    }

    pub fn role(&self) -> Role {
        self.record.role
    }

    pub fn record(&self) -> &NodeRecord {
        &self.record
    }

    pub fn neighbors(&self) -> &[NodeId] {
        &self.neighbors
    }

    pub fn state(&self) -> &NodeState {
        &self.state
    }

    /// Run this vertex's step for one round
    pub fn compute(
        &mut self,
        messages: impl IntoIterator<Item = AuctionMessage>,
        config: &JobConfig,
    ) -> StepOutput {
        let inbox = Inbox::new(messages);
        match self.record.role {
            Role::Bidder => bidder::step(&self.record, &mut self.state, inbox, config.epsilon),
            Role::Item => item::step(&self.record.id, &self.neighbors, &mut self.state, inbox),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auction::types::Edge;
    use rust_decimal::Decimal;

    fn config() -> JobConfig {
        JobConfig::new(Decimal::ONE, 10).unwrap()
    }

    fn bidder(id: &str, edges: &[(&str, i64)]) -> Vertex {
        let edges: Vec<_> = edges
            .iter()
            .map(|(t, w)| Edge::new(*t, Decimal::from(*w)))
            .collect();
        let record = NodeRecord::bidder(id, edges).unwrap();
        let neighbors = record.edges.iter().map(|e| e.target.clone()).collect();
        Vertex::new(record, neighbors)
    }

    fn item(id: &str, neighbors: &[&str]) -> Vertex {
        Vertex::new(
            NodeRecord::item(id).unwrap(),
            neighbors.iter().map(|n| NodeId::from(*n)).collect(),
        )
    }

    fn id(s: &str) -> NodeId {
        NodeId::from(s)
    }

    #[test]
    fn bidder_bids_on_best_item_by_value_gap() {
        let mut a = bidder("A", &[("X", 10), ("Y", 8)]);
        let out = a.compute(Vec::new(), &config());
        assert_eq!(out.vote, Vote::Continue);
        assert_eq!(
            out.outbox,
            vec![Envelope::new(
                id("X"),
                AuctionMessage::Bid {
                    from: id("A"),
                    price: Decimal::from(3)
                }
            )]
        );
    }

    #[test]
    fn bidder_ties_break_on_smallest_item() {
        let mut a = bidder("A", &[("Y", 5), ("X", 5)]);
        let out = a.compute(Vec::new(), &config());
        // equal values: increment is epsilon alone
        assert_eq!(out.outbox[0].to, id("X"));
        assert_eq!(out.outbox[0].message.price(), Some(Decimal::ONE));
    }

    #[test]
    fn single_edge_uses_zero_as_second_best() {
        let mut a = bidder("A", &[("X", 4)]);
        let out = a.compute(Vec::new(), &config());
        assert_eq!(out.outbox[0].message.price(), Some(Decimal::from(5)));
    }

    #[test]
    fn negative_value_single_edge_still_raises_by_epsilon() {
        let mut a = bidder("A", &[("X", 2)]);
        let updates = vec![AuctionMessage::PriceUpdate {
            from: id("X"),
            price: Decimal::from(10),
        }];
        let out = a.compute(updates, &config());
        // value -8, second 0: raw increment -7 is clamped to epsilon
        assert_eq!(out.outbox[0].message.price(), Some(Decimal::from(11)));
    }

    #[test]
    fn edgeless_bidder_halts_silently() {
        let mut lonely = bidder("L", &[]);
        for _ in 0..3 {
            let out = lonely.compute(Vec::new(), &config());
            assert_eq!(out.vote, Vote::Halt);
            assert!(out.outbox.is_empty());
        }
        assert!(!lonely.state().is_matched());
    }

    #[test]
    fn assigned_bidder_halts_and_caches_price() {
        let mut a = bidder("A", &[("X", 10), ("Y", 8)]);
        let out = a.compute(
            vec![AuctionMessage::Assign {
                from: id("X"),
                price: Decimal::from(3),
            }],
            &config(),
        );
        assert_eq!(out.vote, Vote::Halt);
        assert!(out.outbox.is_empty());
        assert_eq!(a.state().match_id(), Some(&id("X")));
        assert_eq!(a.state().known_price(&id("X")), Decimal::from(3));
    }

    #[test]
    fn released_bidder_rebids_with_fresh_prices() {
        let mut a = bidder("A", &[("X", 10), ("Y", 8)]);
        a.compute(
            vec![AuctionMessage::Assign {
                from: id("X"),
                price: Decimal::from(3),
            }],
            &config(),
        );
        let out = a.compute(
            vec![
                AuctionMessage::PriceUpdate {
                    from: id("X"),
                    price: Decimal::from(7),
                },
                AuctionMessage::Release { from: id("X") },
            ],
            &config(),
        );
        assert!(!a.state().is_matched());
        assert_eq!(out.vote, Vote::Continue);
        // X: 10-7=3, Y: 8-0=8, so Y at 0 + (8-3) + 1
        assert_eq!(
            out.outbox,
            vec![Envelope::new(
                id("Y"),
                AuctionMessage::Bid {
                    from: id("A"),
                    price: Decimal::from(6)
                }
            )]
        );
    }

    #[test]
    fn release_from_other_item_is_ignored() {
        let mut a = bidder("A", &[("X", 10), ("Y", 8)]);
        a.compute(
            vec![AuctionMessage::Assign {
                from: id("X"),
                price: Decimal::ONE,
            }],
            &config(),
        );
        let out = a.compute(vec![AuctionMessage::Release { from: id("Y") }], &config());
        assert_eq!(a.state().match_id(), Some(&id("X")));
        assert_eq!(out.vote, Vote::Halt);
    }

    #[test]
    fn double_assignment_keeps_best_and_releases_the_rest() {
        let mut a = bidder("A", &[("X", 10), ("Y", 8)]);
        let out = a.compute(
            vec![
                AuctionMessage::Assign {
                    from: id("Y"),
                    price: Decimal::ONE,
                },
                AuctionMessage::Assign {
                    from: id("X"),
                    price: Decimal::from(5),
                },
            ],
            &config(),
        );
        // X nets 5, Y nets 7
        assert_eq!(a.state().match_id(), Some(&id("Y")));
        assert_eq!(out.vote, Vote::Halt);
        assert_eq!(
            out.outbox,
            vec![Envelope::new(id("X"), AuctionMessage::Release { from: id("A") })]
        );
    }

    #[test]
    fn late_assignment_competes_with_current_match() {
        let mut a = bidder("A", &[("X", 10), ("Y", 8)]);
        a.compute(
            vec![AuctionMessage::Assign {
                from: id("Y"),
                price: Decimal::from(4),
            }],
            &config(),
        );
        let out = a.compute(
            vec![AuctionMessage::Assign {
                from: id("X"),
                price: Decimal::from(2),
            }],
            &config(),
        );
        // X nets 8, Y nets 4: switch and release Y
        assert_eq!(a.state().match_id(), Some(&id("X")));
        assert_eq!(
            out.outbox,
            vec![Envelope::new(id("Y"), AuctionMessage::Release { from: id("A") })]
        );
    }

    #[test]
    fn item_without_bids_halts() {
        let mut x = item("X", &["A", "B"]);
        let out = x.compute(Vec::new(), &config());
        assert_eq!(out.vote, Vote::Halt);
        assert!(out.outbox.is_empty());
    }

    #[test]
    fn item_picks_highest_bid_and_breaks_ties_on_smallest_bidder() {
        let mut x = item("X", &["A", "B", "C"]);
        let bids = vec![
            AuctionMessage::Bid {
                from: id("B"),
                price: Decimal::from(3),
            },
            AuctionMessage::Bid {
                from: id("A"),
                price: Decimal::from(3),
            },
        ];
        let out = x.compute(bids, &config());
        assert_eq!(out.vote, Vote::Continue);
        assert_eq!(x.state().match_id(), Some(&id("A")));
        assert_eq!(x.state().price(), Decimal::from(3));
        assert_eq!(
            out.outbox,
            vec![
                Envelope::new(
                    id("A"),
                    AuctionMessage::Assign {
                        from: id("X"),
                        price: Decimal::from(3)
                    }
                ),
                Envelope::new(
                    id("B"),
                    AuctionMessage::PriceUpdate {
                        from: id("X"),
                        price: Decimal::from(3)
                    }
                ),
                Envelope::new(
                    id("C"),
                    AuctionMessage::PriceUpdate {
                        from: id("X"),
                        price: Decimal::from(3)
                    }
                ),
            ]
        );
    }

    #[test]
    fn outbid_item_releases_previous_owner() {
        let mut x = item("X", &["A", "B"]);
        x.compute(
            vec![AuctionMessage::Bid {
                from: id("A"),
                price: Decimal::from(3),
            }],
            &config(),
        );
        let out = x.compute(
            vec![AuctionMessage::Bid {
                from: id("B"),
                price: Decimal::from(4),
            }],
            &config(),
        );
        assert_eq!(x.state().match_id(), Some(&id("B")));
        assert!(out.outbox.contains(&Envelope::new(
            id("A"),
            AuctionMessage::Release { from: id("X") }
        )));
        assert!(out.outbox.contains(&Envelope::new(
            id("A"),
            AuctionMessage::PriceUpdate {
                from: id("X"),
                price: Decimal::from(4)
            }
        )));
    }

    #[test]
    fn stale_bids_are_discarded() {
        let mut x = item("X", &["A", "B"]);
        x.compute(
            vec![AuctionMessage::Bid {
                from: id("A"),
                price: Decimal::from(3),
            }],
            &config(),
        );
        let out = x.compute(
            vec![AuctionMessage::Bid {
                from: id("B"),
                price: Decimal::from(3),
            }],
            &config(),
        );
        assert_eq!(out.vote, Vote::Halt);
        assert!(out.outbox.is_empty());
        assert_eq!(x.state().match_id(), Some(&id("A")));
        assert_eq!(x.state().price(), Decimal::from(3));
    }

    #[test]
    fn item_released_by_owner_keeps_its_price() {
        let mut x = item("X", &["A"]);
        x.compute(
            vec![AuctionMessage::Bid {
                from: id("A"),
                price: Decimal::from(2),
            }],
            &config(),
        );
        let out = x.compute(vec![AuctionMessage::Release { from: id("A") }], &config());
        assert_eq!(out.vote, Vote::Halt);
        assert!(!x.state().is_matched());
        assert_eq!(x.state().price(), Decimal::from(2));
    }

    fn extreme_bidder() -> Vertex {
        use crate::auction::types::MAX_WEIGHT;
        let record = NodeRecord::bidder(
            "A",
            vec![Edge::new("X", MAX_WEIGHT), Edge::new("Y", -MAX_WEIGHT)],
        )
        .unwrap();
        Vertex::new(record, vec![id("X"), id("Y")])
    }

    #[test]
    fn out_of_range_value_withdraws_instead_of_panicking() {
        let mut a = extreme_bidder();
        let out = a.compute(
            vec![AuctionMessage::PriceUpdate {
                from: id("Y"),
                price: Decimal::MAX,
            }],
            &config(),
        );
        assert_eq!(out.vote, Vote::Halt);
        assert!(out.outbox.is_empty());
    }

    #[test]
    fn out_of_range_bid_price_withdraws() {
        let mut a = bidder("A", &[("X", 5)]);
        let out = a.compute(
            vec![AuctionMessage::PriceUpdate {
                from: id("X"),
                price: Decimal::MAX,
            }],
            &config(),
        );
        assert_eq!(out.vote, Vote::Halt);
        assert!(out.outbox.is_empty());
    }

    #[test]
    fn out_of_range_assignment_is_declined() {
        let mut a = extreme_bidder();
        let out = a.compute(
            vec![AuctionMessage::Assign {
                from: id("Y"),
                price: Decimal::MAX,
            }],
            &config(),
        );
        assert!(!a.state().is_matched());
        assert!(out.outbox.contains(&Envelope::new(
            id("Y"),
            AuctionMessage::Release { from: id("A") }
        )));
    }

    #[test]
    fn state_role_must_match_record() {
        let record = NodeRecord::item("X").unwrap();
        let err = Vertex::with_state(record, Vec::new(), NodeState::new(Role::Bidder));
        assert!(matches!(err, Err(Error::Decode(_))));
    }
}
