use super::engine::Vertex;
use super::types::Role;
use rust_decimal::Decimal;

#[macro_export]
macro_rules! auction_info {
    ($($arg:tt)+) => {
        tracing::info!(target: "auction", $($arg)+)
    }
}

/// Log the matching as it stands after a round
pub fn log_round_status<'a>(
    vertices: impl IntoIterator<Item = &'a Vertex>,
    round: u64,
    votes_to_continue: usize,
    messages_sent: usize,
) {
    let mut matched = 0usize;
    let mut unmatched_bidders = 0usize;
    let mut price_total = Decimal::ZERO;
    for vertex in vertices {
        match vertex.role() {
            Role::Bidder if vertex.state().is_matched() => matched += 1,
            Role::Bidder => unmatched_bidders += 1,
            Role::Item => price_total += vertex.state().price(),
        }
    }
    auction_info!(
        "Round {}: {} matched, {} unmatched bidders, price sum {}, {} continue votes, {} messages",
        round,
        matched,
        unmatched_bidders,
        price_total,
        votes_to_continue,
        messages_sent
    );
}

/// Log every bidder's final partner and the price it pays
pub fn log_final_matching<'a>(vertices: impl IntoIterator<Item = &'a Vertex>) {
    auction_info!("Final matching:");
    let vertices: Vec<_> = vertices.into_iter().collect();
    for vertex in vertices.iter().filter(|v| v.role() == Role::Bidder) {
        match vertex.state().match_id() {
            Some(item) => {
                let weight = vertex.record().weight_to(item).unwrap_or_default();
                let price = vertices
                    .iter()
                    .find(|v| v.id() == item)
                    .map(|v| v.state().price())
                    .unwrap_or_default();
                auction_info!("  {} -> {} (weight {}, price {})", vertex.id(), item, weight, price);
            }
            None => auction_info!("  {} -> unmatched", vertex.id()),
        }
    }
}
