use rust_decimal::Decimal;
use std::collections::BTreeSet;
use tracing::{debug, trace, warn};

use super::StepOutput;
use crate::auction::message::{AuctionMessage, Envelope, Inbox};
use crate::auction::state::NodeState;
use crate::auction::types::{NodeId, NodeRecord};

pub(super) fn step(
    record: &NodeRecord,
    state: &mut NodeState,
    inbox: Inbox,
    epsilon: Decimal,
) -> StepOutput {
    let mut outbox = Vec::new();

    for item in &inbox.releases {
        if state.match_id() == Some(item) {
            debug!(bidder = %record.id, %item, "released");
            state.clear_match_id();
        }
    }

    let assigned: Vec<NodeId> = inbox.assigns.iter().map(|(item, _)| item.clone()).collect();
    for (item, price) in inbox.assigns {
        state.observe_price(item, price);
    }
    for (item, price) in inbox.price_updates {
        state.observe_price(item, price);
    }
    if !inbox.bids.is_empty() {
        trace!(bidder = %record.id, count = inbox.bids.len(), "ignoring bids sent to a bidder");
    }

    if !assigned.is_empty() {
        settle_assignments(record, state, assigned, &mut outbox);
    }

    if state.is_matched() || record.edges.is_empty() {
        return StepOutput::halt(outbox);
    }

    match place_bid(record, state, epsilon) {
        Some((item, price)) => {
            debug!(bidder = %record.id, %item, %price, "bid");
            outbox.push(Envelope::new(
                item,
                AuctionMessage::Bid {
                    from: record.id.clone(),
                    price,
                },
            ));
            StepOutput::proceed(outbox)
        }
        None => {
            warn!(bidder = %record.id, "bid price out of decimal range, withdrawing");
            StepOutput::halt(outbox)
        }
    }
}

/// Keep at most one of the items that currently claim this bidder.
///
/// A bidder re-bids every round until an `ASSIGN` arrives, so two items can
/// accept it before it learns of either. The candidate with the greatest net
/// value stays; every other one gets a `RELEASE` so its `matchId` clears.
fn settle_assignments(
    record: &NodeRecord,
    state: &mut NodeState,
    assigned: Vec<NodeId>,
    outbox: &mut Vec<Envelope>,
) {
    let mut candidates: BTreeSet<NodeId> = assigned.into_iter().collect();
    if let Some(current) = state.clear_match_id() {
        candidates.insert(current);
    }

    let net_value = |item: &NodeId| {
        record
            .weight_to(item)?
            .checked_sub(state.known_price(item))
    };
    let keep = candidates
        .iter()
        .filter_map(|item| net_value(item).map(|value| (item, value)))
        .max_by(|(a, va), (b, vb)| va.cmp(vb).then_with(|| b.cmp(a)))
        .map(|(item, _)| item.clone());

    for item in candidates {
        if keep.as_ref() != Some(&item) {
            debug!(bidder = %record.id, %item, "declining assignment");
            outbox.push(Envelope::new(
                item,
                AuctionMessage::Release {
                    from: record.id.clone(),
                },
            ));
        }
    }

    if let Some(item) = keep {
        debug!(bidder = %record.id, %item, price = %state.known_price(&item), "assigned");
        state.set_match_id(item);
    }
}

/// Pick the item with the best `weight - known price` (ties: smallest id) and
/// the price to offer: its known price plus the gap to the runner-up plus
/// epsilon, never less than epsilon above the known price.
///
/// `None` when the bidder has no edges or the arithmetic leaves the
/// `Decimal` range.
fn place_bid(
    record: &NodeRecord,
    state: &NodeState,
    epsilon: Decimal,
) -> Option<(NodeId, Decimal)> {
    let mut best: Option<(&NodeId, Decimal)> = None;
    let mut second: Option<Decimal> = None;

    // edges are sorted by target, so a strict comparison keeps the smallest id on ties
    for edge in &record.edges {
        let value = edge.weight.checked_sub(state.known_price(&edge.target))?;
        match best {
            Some((_, best_value)) if value > best_value => {
                second = Some(best_value);
                best = Some((&edge.target, value));
            }
            Some(_) => second = Some(second.map_or(value, |s| s.max(value))),
            None => best = Some((&edge.target, value)),
        }
    }

    let (item, best_value) = best?;
    let second = second.unwrap_or(Decimal::ZERO);
    let mut increment = best_value.checked_sub(second)?.checked_add(epsilon)?;
    if increment <= Decimal::ZERO {
        increment = epsilon;
    }
    trace!(bidder = %record.id, %item, %best_value, %second, %increment, "bid computed");
    let price = state.known_price(item).checked_add(increment)?;
    Some((item.clone(), price))
}
