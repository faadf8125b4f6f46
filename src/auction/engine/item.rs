use rust_decimal::Decimal;
use tracing::{debug, trace};

use super::StepOutput;
use crate::auction::message::{AuctionMessage, Envelope, Inbox};
use crate::auction::state::NodeState;
use crate::auction::types::NodeId;

pub(super) fn step(
    id: &NodeId,
    neighbors: &[NodeId],
    state: &mut NodeState,
    inbox: Inbox,
) -> StepOutput {
    for bidder in &inbox.releases {
        if state.match_id() == Some(bidder) {
            debug!(item = %id, %bidder, "owner declined");
            state.clear_match_id();
        }
    }
    if !inbox.assigns.is_empty() || !inbox.price_updates.is_empty() {
        trace!(item = %id, "ignoring item-bound assign/price messages");
    }

    let Some((winner, price)) = winning_bid(&inbox.bids) else {
        return StepOutput::halt(Vec::new());
    };
    if price <= state.price() {
        trace!(item = %id, %price, current = %state.price(), "discarding stale bids");
        return StepOutput::halt(Vec::new());
    }

    let mut outbox = Vec::with_capacity(neighbors.len() + 1);
    state.set_price(price);
    if let Some(previous) = state.match_id()
        && previous != winner
    {
        debug!(item = %id, bidder = %previous, "outbid");
        outbox.push(Envelope::new(
            previous.clone(),
            AuctionMessage::Release { from: id.clone() },
        ));
    }
    state.set_match_id(winner.clone());
    debug!(item = %id, bidder = %winner, %price, "assigned");

    outbox.push(Envelope::new(
        winner.clone(),
        AuctionMessage::Assign {
            from: id.clone(),
            price,
        },
    ));
    for neighbor in neighbors.iter().filter(|n| *n != winner) {
        outbox.push(Envelope::new(
            neighbor.clone(),
            AuctionMessage::PriceUpdate {
                from: id.clone(),
                price,
            },
        ));
    }

    StepOutput::proceed(outbox)
}

/// Greatest price, ties to the smallest bidder; `bids` arrive sorted by bidder.
fn winning_bid(bids: &[(NodeId, Decimal)]) -> Option<(&NodeId, Decimal)> {
    let mut best: Option<(&NodeId, Decimal)> = None;
    for (bidder, price) in bids {
        if best.is_none_or(|(_, top)| *price > top) {
            best = Some((bidder, *price));
        }
    }
    best
}
