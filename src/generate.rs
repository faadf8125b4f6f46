//! Random bipartite instances for simulations and property tests

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::auction::types::{Edge, NodeRecord};
use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenParams {
    pub bidders: usize,
    pub items: usize,
    /// Probability of each bidder-item edge existing
    pub density: Option<f64>,
    /// Inclusive integer weight range
    pub weight_range: Option<(i64, i64)>,
    /// Decimal places applied to the drawn weights
    pub scale: Option<u32>,
    pub seed: Option<u64>,
}

impl GenParams {
    pub fn new(bidders: usize, items: usize) -> Self {
        Self {
            bidders,
            items,
            density: None,
            weight_range: None,
            scale: None,
            seed: None,
        }
    }
}

fn padded(prefix: char, index: usize, count: usize) -> String {
    let width = count.max(1).to_string().len();
    format!("{prefix}{index:0width$}")
}

/// Bidders are `B01..`, items `I01..`; zero padding keeps id order equal to
/// index order.
pub fn generate_instance(params: &GenParams) -> Result<Vec<NodeRecord>> {
    let mut rng = match params.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_rng(&mut rand::rng()),
    };
    let density = params
        .density
        .filter(|d| d.is_finite())
        .unwrap_or(0.5)
        .clamp(0.0, 1.0);
    let (low, high) = params.weight_range.unwrap_or((1, 100));
    let (low, high) = (low.min(high), low.max(high));
    let scale = params.scale.unwrap_or(0).min(28);

    let items: Vec<String> = (1..=params.items)
        .map(|j| padded('I', j, params.items))
        .collect();

    let mut records = Vec::with_capacity(params.bidders + params.items);
    for i in 1..=params.bidders {
        let mut edges = Vec::new();
        for item in &items {
            if rng.random_bool(density) {
                let weight = Decimal::new(rng.random_range(low..=high), scale);
                edges.push(Edge::new(item.as_str(), weight));
            }
        }
        records.push(NodeRecord::bidder(padded('B', i, params.bidders).as_str(), edges)?);
    }
    for item in &items {
        records.push(NodeRecord::item(item.as_str())?);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auction::types::Role;

    #[test]
    fn same_seed_same_instance() {
        let mut params = GenParams::new(5, 4);
        params.seed = Some(42);
        assert_eq!(generate_instance(&params).unwrap(), generate_instance(&params).unwrap());
    }

    #[test]
    fn shape_follows_params() {
        let params = GenParams {
            bidders: 12,
            items: 3,
            density: Some(1.0),
            weight_range: Some((5, 5)),
            scale: Some(1),
            seed: Some(7),
        };
        let records = generate_instance(&params).unwrap();
        assert_eq!(records.iter().filter(|r| r.role == Role::Bidder).count(), 12);
        assert_eq!(records.iter().filter(|r| r.role == Role::Item).count(), 3);
        assert_eq!(records[0].id.as_str(), "B01");
        for bidder in records.iter().filter(|r| r.role == Role::Bidder) {
            assert_eq!(bidder.edges.len(), 3);
            assert!(bidder.edges.iter().all(|e| e.weight == Decimal::new(5, 1)));
        }
    }

    #[test]
    fn zero_density_gives_no_edges() {
        let mut params = GenParams::new(3, 3);
        params.density = Some(0.0);
        params.seed = Some(1);
        let records = generate_instance(&params).unwrap();
        assert!(records.iter().all(|r| r.edges.is_empty()));
    }
}
