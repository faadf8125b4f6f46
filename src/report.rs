use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::auction::types::{NodeId, NodeRecord, Role};
use crate::bsp::{ConvergenceStatus, JobResult};

#[derive(Debug, Serialize)]
pub struct RoundLog {
    pub round: u64,
    pub round_ms: f64,
    pub matched_bidders: usize,
    pub price_sum: Decimal,
    pub converged_after_this: bool,
}

#[derive(Debug, Serialize)]
pub struct MatchedPair {
    pub bidder: NodeId,
    pub item: NodeId,
    pub weight: Decimal,
    pub price: Decimal,
}

#[derive(Debug, Serialize)]
pub struct MatchingReport {
    pub status: ConvergenceStatus,
    pub rounds: u64,
    pub consistent: bool,
    pub pairs: Vec<MatchedPair>,
    pub unmatched_bidders: Vec<NodeId>,
    pub unmatched_items: Vec<NodeId>,
    pub total_value: Decimal,
    pub round_logs: Vec<RoundLog>,
    pub total_duration_ms: f64,
    pub time_per_round_ms: f64,
    pub bidder_count: usize,
    pub item_count: usize,
}

pub fn build_report(
    result: &JobResult,
    records: &[NodeRecord],
    round_logs: Vec<RoundLog>,
    started: Instant,
) -> MatchingReport {
    let weights: BTreeMap<(&NodeId, &NodeId), Decimal> = records
        .iter()
        .flat_map(|r| r.edges.iter().map(move |e| ((&r.id, &e.target), e.weight)))
        .collect();

    let pairs: Vec<MatchedPair> = result
        .pairs()
        .into_iter()
        .map(|(bidder, item)| {
            let weight = weights.get(&(&bidder, &item)).copied().unwrap_or_default();
            let price = result.node(&item).map(|n| n.price).unwrap_or_default();
            MatchedPair {
                bidder,
                item,
                weight,
                price,
            }
        })
        .collect();

    let unmatched = |role: Role| -> Vec<NodeId> {
        result
            .nodes
            .iter()
            .filter(|n| n.role == role && n.match_id.is_none())
            .map(|n| n.id.clone())
            .collect()
    };

    let total_duration_ms = started.elapsed().as_secs_f64() * 1000.0;
    let time_per_round_ms = if result.rounds == 0 {
        0.0
    } else {
        total_duration_ms / result.rounds as f64
    };

    MatchingReport {
        status: result.status,
        rounds: result.rounds,
        consistent: result.is_consistent(),
        total_value: pairs.iter().map(|p| p.weight).sum(),
        pairs,
        unmatched_bidders: unmatched(Role::Bidder),
        unmatched_items: unmatched(Role::Item),
        round_logs,
        total_duration_ms,
        time_per_round_ms,
        bidder_count: records.iter().filter(|r| r.role == Role::Bidder).count(),
        item_count: records.iter().filter(|r| r.role == Role::Item).count(),
    }
}

pub fn write_report_json<P: AsRef<Path>>(
    report: &MatchingReport,
    result_dir: P,
) -> std::io::Result<PathBuf> {
    let summary_path = result_dir.as_ref().join("summary.json");
    let mut summary_file = File::create(&summary_path)?;
    serde_json::to_writer_pretty(&mut summary_file, report)?;
    Ok(summary_path)
}
