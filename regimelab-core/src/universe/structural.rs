//! Structural qualification — ETF top-N constituent selection.
//!
//! Thresholds: SPY top-15, QQQ top-10, DIA top-10. IWM is intentionally
//! excluded — its membership is too fragmented for any single name to
//! explain the ETF's behavior.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single ETF constituent with weight metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConstituent {
    pub ticker: String,
    pub etf: String,
    /// 1-based position by weight within the ETF.
    pub rank: usize,
    /// Weight in percent, e.g. 7.2.
    pub weight_pct: f64,
}

/// Top-N threshold for an ETF, None for ETFs not structurally tracked.
pub fn structural_threshold(etf: &str) -> Option<usize> {
    match etf {
        "SPY" => Some(15),
        "QQQ" | "DIA" => Some(10),
        _ => None,
    }
}

/// Select the top-N holdings of one ETF by weight, ranked descending.
///
/// Returns an empty list for ETFs without a structural threshold (IWM and
/// anything unknown).
pub fn top_constituents(etf: &str, holdings: &[(String, f64)]) -> Vec<IndexConstituent> {
    let Some(threshold) = structural_threshold(etf) else {
        return Vec::new();
    };

    let mut sorted: Vec<&(String, f64)> = holdings.iter().collect();
    sorted.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .expect("holding weights are finite")
            .then_with(|| a.0.cmp(&b.0))
    });

    sorted
        .into_iter()
        .take(threshold)
        .enumerate()
        .map(|(i, (ticker, weight))| IndexConstituent {
            ticker: ticker.clone(),
            etf: etf.to_string(),
            rank: i + 1,
            weight_pct: *weight,
        })
        .collect()
}

/// Deduplicate constituents appearing in multiple ETFs, keeping the entry
/// with the highest weight.
pub fn dedup_constituents(all: &[IndexConstituent]) -> BTreeMap<String, IndexConstituent> {
    let mut best: BTreeMap<String, IndexConstituent> = BTreeMap::new();
    for c in all {
        match best.get(&c.ticker) {
            Some(existing) if existing.weight_pct >= c.weight_pct => {}
            _ => {
                best.insert(c.ticker.clone(), c.clone());
            }
        }
    }
    best
}
