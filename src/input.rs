//! JSON-lines graph input
//!
//! One node per line:
//! `{"id": "A", "isBidder": true, "edges": [{"neighborId": "X", "weight": 10}]}`.
//! Weights may be JSON numbers or decimal strings; strings are preferred when
//! writing because they survive the round trip exactly.

use anyhow::Context;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::auction::types::{Edge, NodeId, NodeRecord, Role};
use crate::error::{Error, Result};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRecord {
    id: String,
    is_bidder: bool,
    #[serde(default)]
    edges: Vec<RawEdge>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEdge {
    neighbor_id: String,
    weight: Value,
}

fn parse_weight(value: &Value) -> std::result::Result<Decimal, String> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        other => return Err(format!("weight must be a number or string, got {other}")),
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|e| format!("invalid weight {text:?}: {e}"))
}

/// Parse and validate a single record
pub fn parse_record(line: &str) -> Result<NodeRecord> {
    let raw: RawRecord =
        serde_json::from_str(line).map_err(|e| Error::record(format!("malformed record: {e}")))?;
    let id = NodeId::new(raw.id)?;
    let role = if raw.is_bidder { Role::Bidder } else { Role::Item };
    let mut edges = Vec::with_capacity(raw.edges.len());
    for edge in raw.edges {
        let target = NodeId::new(edge.neighbor_id)
            .map_err(|_| Error::record(format!("{id}: empty neighborId")))?;
        let weight =
            parse_weight(&edge.weight).map_err(|e| Error::record(format!("{id}: {e}")))?;
        edges.push(Edge { target, weight });
    }
    NodeRecord::new(id, role, edges)
}

/// Parse a whole JSON-lines document; blank lines are skipped
pub fn parse_records(text: &str) -> Result<Vec<NodeRecord>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            parse_record(line).map_err(|e| match e {
                Error::RecordParse(msg) => Error::record(format!("line {}: {msg}", idx + 1)),
                other => other,
            })
        })
        .collect()
}

pub fn load_records(path: &Path) -> anyhow::Result<Vec<NodeRecord>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read input file {}", path.display()))?;
    let records = parse_records(&text)
        .with_context(|| format!("Failed to parse input file {}", path.display()))?;
    Ok(records)
}

/// Render one record as a single JSON line
pub fn record_to_line(record: &NodeRecord) -> serde_json::Result<String> {
    let raw = RawRecord {
        id: record.id.to_string(),
        is_bidder: record.role.is_bidder(),
        edges: record
            .edges
            .iter()
            .map(|e| RawEdge {
                neighbor_id: e.target.to_string(),
                weight: Value::String(e.weight.to_string()),
            })
            .collect(),
    };
    serde_json::to_string(&raw)
}

pub fn save_records(records: &[NodeRecord], path: &Path) -> anyhow::Result<()> {
    let mut out = String::new();
    for record in records {
        out.push_str(&record_to_line(record).context("Failed to serialize record")?);
        out.push('\n');
    }
    fs::write(path, out).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
