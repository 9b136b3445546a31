//! Domain types shared across the engine.

pub mod feature;

pub use feature::{Feature, FeatureSeries};

use std::collections::BTreeMap;

/// Z-scores keyed by feature for one instrument on one date.
///
/// NaN entries are first-class: a missing or invalid z-score is stored as
/// NaN, never defaulted to zero.
pub type ZScoreSet = BTreeMap<Feature, f64>;

/// Raw feature values keyed by feature for one instrument on one date.
pub type RawFeatureSet = BTreeMap<Feature, f64>;

/// Fetch a value from a feature map, NaN when absent.
pub fn feature_or_nan(map: &BTreeMap<Feature, f64>, feature: Feature) -> f64 {
    map.get(&feature).copied().unwrap_or(f64::NAN)
}
