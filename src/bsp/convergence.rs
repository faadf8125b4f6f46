//! Global vote aggregation across one round

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::auction::types::{NodeId, Vote};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConvergenceStatus {
    /// No node voted to continue and no message is in flight
    Converged,
    /// The round ceiling was reached first; the matching is the best so far
    BudgetExceeded,
    Running,
}

impl std::fmt::Display for ConvergenceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Converged => f.write_str("converged"),
            Self::BudgetExceeded => f.write_str("budget exceeded"),
            Self::Running => f.write_str("running"),
        }
    }
}

/// Collects every node's vote and the number of messages sent in the
/// current round, and reports whether another round is needed.
///
/// A node that votes more than once in a round is counted by its last vote.
#[derive(Debug, Clone, Default)]
pub struct ConvergenceAggregator {
    round: Option<u64>,
    votes: BTreeMap<NodeId, Vote>,
    messages_sent: usize,
}

impl ConvergenceAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset the tallies for `round`
    pub fn begin_round(&mut self, round: u64) {
        self.round = Some(round);
        self.votes.clear();
        self.messages_sent = 0;
    }

    pub fn record_vote(&mut self, node: &NodeId, vote: Vote) {
        self.votes.insert(node.clone(), vote);
    }

    pub fn record_messages(&mut self, count: usize) {
        self.messages_sent += count;
    }

    pub fn round(&self) -> Option<u64> {
        self.round
    }

    pub fn continue_votes(&self) -> usize {
        self.votes.values().filter(|v| **v == Vote::Continue).count()
    }

    pub fn halt_votes(&self) -> usize {
        self.votes.len() - self.continue_votes()
    }

    pub fn messages_sent(&self) -> usize {
        self.messages_sent
    }

    /// `Running` until a round has been observed in which nobody voted to
    /// continue and nothing was sent.
    pub fn status(&self) -> ConvergenceStatus {
        if self.round.is_none() || self.messages_sent > 0 || self.continue_votes() > 0 {
            ConvergenceStatus::Running
        } else {
            ConvergenceStatus::Converged
        }
    }
}
