//! Superstep driver for one auction job

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use super::checkpoint::Checkpoint;
use super::convergence::ConvergenceStatus;
use super::RoundEngine;
use crate::auction::engine::Vertex;
use crate::auction::logging::{log_final_matching, log_round_status};
use crate::auction::types::{NodeId, NodeRecord, Role, Vote};
use crate::auction_info;
use crate::config::JobConfig;
use crate::error::{Error, Result};

/// Final (or best-so-far) view of one node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeOutcome {
    pub id: NodeId,
    pub role: Role,
    pub match_id: Option<NodeId>,
    /// Current price for items, zero for bidders
    pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    pub status: ConvergenceStatus,
    /// Rounds executed
    pub rounds: u64,
    /// Sorted by id
    pub nodes: Vec<NodeOutcome>,
}

impl JobResult {
    pub fn node(&self, id: &NodeId) -> Option<&NodeOutcome> {
        self.nodes
            .binary_search_by(|n| n.id.cmp(id))
            .ok()
            .map(|idx| &self.nodes[idx])
    }

    /// (bidder, item) pairs as seen from the bidder side
    pub fn pairs(&self) -> Vec<(NodeId, NodeId)> {
        self.nodes
            .iter()
            .filter(|n| n.role == Role::Bidder)
            .filter_map(|n| n.match_id.clone().map(|item| (n.id.clone(), item)))
            .collect()
    }

    /// Every match is mutual and no item is held by two bidders
    pub fn is_consistent(&self) -> bool {
        let mut taken = BTreeSet::new();
        for node in &self.nodes {
            let Some(partner) = &node.match_id else {
                continue;
            };
            let Some(other) = self.node(partner) else {
                return false;
            };
            if other.role == node.role || other.match_id.as_ref() != Some(&node.id) {
                return false;
            }
            if node.role == Role::Bidder && !taken.insert(partner) {
                return false;
            }
        }
        true
    }

    /// Sum of edge weights over the bidder-side pairs
    pub fn total_value(&self, records: &[NodeRecord]) -> Decimal {
        let by_id: BTreeMap<&NodeId, &NodeRecord> = records.iter().map(|r| (&r.id, r)).collect();
        self.pairs()
            .iter()
            .filter_map(|(bidder, item)| by_id.get(bidder)?.weight_to(item))
            .sum()
    }
}

/// One auction over a fixed bipartite graph
///
/// Vertices are kept in id order and computed one after another each round,
/// so a job on a [`LocalRoundEngine`](super::LocalRoundEngine) is fully
/// deterministic.
#[derive(Debug, Clone)]
pub struct AuctionJob {
    config: JobConfig,
    vertices: BTreeMap<NodeId, Vertex>,
    rounds: u64,
}

impl AuctionJob {
    /// Validate the graph and build one vertex per record
    pub fn new(records: Vec<NodeRecord>, config: JobConfig) -> Result<Self> {
        config.validate()?;

        let mut by_id = BTreeMap::new();
        for record in records {
            record.validate()?;
            if by_id.contains_key(&record.id) {
                return Err(Error::record(format!("duplicate node id {}", record.id)));
            }
            by_id.insert(record.id.clone(), record);
        }

        let mut item_neighbors: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
        for record in by_id.values().filter(|r| r.role == Role::Bidder) {
            for edge in &record.edges {
                match by_id.get(&edge.target).map(|r| r.role) {
                    Some(Role::Item) => item_neighbors
                        .entry(edge.target.clone())
                        .or_default()
                        .push(record.id.clone()),
                    Some(Role::Bidder) => {
                        return Err(Error::record(format!(
                            "bidder {} has an edge to bidder {}",
                            record.id, edge.target
                        )));
                    }
                    None => {
                        return Err(Error::record(format!(
                            "bidder {} has an edge to unknown node {}",
                            record.id, edge.target
                        )));
                    }
                }
            }
        }

        let vertices = by_id
            .into_iter()
            .map(|(id, record)| {
                let neighbors = match record.role {
                    Role::Bidder => record.edges.iter().map(|e| e.target.clone()).collect(),
                    Role::Item => item_neighbors.remove(&id).unwrap_or_default(),
                };
                (id, Vertex::new(record, neighbors))
            })
            .collect();

        Ok(Self {
            config,
            vertices,
            rounds: 0,
        })
    }

    /// Rebuild a job from `records` and resume from `checkpoint`
    ///
    /// The in-flight messages are handed back to `engine`, so the next
    /// [`superstep`](Self::superstep) delivers them.
    pub fn restore<E: RoundEngine>(
        records: Vec<NodeRecord>,
        config: JobConfig,
        checkpoint: Checkpoint,
        engine: &mut E,
    ) -> Result<Self> {
        let mut job = Self::new(records, config)?;
        let Checkpoint {
            round,
            mut states,
            in_flight,
        } = checkpoint;

        let expected: BTreeSet<&NodeId> = job.vertices.keys().collect();
        let found: BTreeSet<&NodeId> = states.keys().collect();
        if expected != found {
            return Err(Error::record(format!(
                "checkpoint covers {} nodes, records define {} different ones",
                found.len(),
                expected.len()
            )));
        }

        let mut vertices = BTreeMap::new();
        for (id, vertex) in std::mem::take(&mut job.vertices) {
            let state = states
                .remove(&id)
                .ok_or_else(|| Error::record(format!("checkpoint has no state for {id}")))?;
            let rebuilt =
                Vertex::with_state(vertex.record().clone(), vertex.neighbors().to_vec(), state)?;
            vertices.insert(id, rebuilt);
        }
        job.vertices = vertices;
        job.rounds = round;
        engine.restore_in_flight(in_flight);
        auction_info!("Restored job at round {}", round);
        Ok(job)
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    /// Rounds executed so far
    pub fn rounds(&self) -> u64 {
        self.rounds
    }

    pub fn vertex(&self, id: &NodeId) -> Option<&Vertex> {
        self.vertices.get(id)
    }

    pub fn vertices(&self) -> impl Iterator<Item = &Vertex> {
        self.vertices.values()
    }

    /// Execute one round: deliver, compute every vertex, send, vote.
    ///
    /// Returns `Converged` when the round ended quiet, else `Running`.
    pub fn superstep<E: RoundEngine>(&mut self, engine: &mut E) -> ConvergenceStatus {
        let round = self.rounds;
        let mut inbound = engine.deliver(round);
        let mut continue_votes = 0usize;
        let mut messages_sent = 0usize;

        for (id, vertex) in self.vertices.iter_mut() {
            let messages = inbound.remove(id).unwrap_or_default();
            let output = vertex.compute(messages, &self.config);
            messages_sent += output.outbox.len();
            for envelope in output.outbox {
                engine.send(envelope);
            }
            if output.vote == Vote::Continue {
                continue_votes += 1;
            }
            engine.vote(id, output.vote);
        }
        for (id, messages) in inbound {
            warn!(node = %id, count = messages.len(), "dropping messages for unknown node");
        }

        self.rounds += 1;
        log_round_status(self.vertices.values(), round, continue_votes, messages_sent);

        if engine.is_converged() {
            ConvergenceStatus::Converged
        } else {
            ConvergenceStatus::Running
        }
    }

    /// Run rounds until convergence or until `max_rounds` have executed
    pub fn run<E: RoundEngine>(&mut self, engine: &mut E) -> JobResult {
        self.run_observed(engine, |_, _| {})
    }

    /// Like [`run`](Self::run), calling `on_round` after every executed round
    pub fn run_observed<E, F>(&mut self, engine: &mut E, mut on_round: F) -> JobResult
    where
        E: RoundEngine,
        F: FnMut(&Self, ConvergenceStatus),
    {
        let status = loop {
            if self.rounds >= self.config.max_rounds {
                warn!(
                    rounds = self.rounds,
                    max_rounds = self.config.max_rounds,
                    "round budget exhausted before convergence"
                );
                break ConvergenceStatus::BudgetExceeded;
            }
            let status = self.superstep(engine);
            on_round(self, status);
            if status == ConvergenceStatus::Converged {
                break status;
            }
        };

        auction_info!("Auction finished: {} after {} rounds", status, self.rounds);
        log_final_matching(self.vertices.values());
        self.result(status)
    }

    /// Snapshot of every node under `status`
    pub fn result(&self, status: ConvergenceStatus) -> JobResult {
        let nodes = self
            .vertices
            .values()
            .map(|v| NodeOutcome {
                id: v.id().clone(),
                role: v.role(),
                match_id: v.state().match_id().cloned(),
                price: v.state().price(),
            })
            .collect();
        JobResult {
            status,
            rounds: self.rounds,
            nodes,
        }
    }

    /// Capture every state and the engine's in-flight messages at a barrier
    pub fn checkpoint<E: RoundEngine>(&self, engine: &E) -> Checkpoint {
        let states = self
            .vertices
            .iter()
            .map(|(id, v)| (id.clone(), v.state().clone()))
            .collect();
        let in_flight = engine.in_flight();
        debug!(round = self.rounds, in_flight = in_flight.len(), "checkpoint taken");
        Checkpoint {
            round: self.rounds,
            states,
            in_flight,
        }
    }
}
