//! Unusualness scoring — weighted |Z| sum, percentile rank, interpretation.
//!
//! The raw score is `S_t = Σ w_k × |Z_k(t)|` over features with a valid
//! z-score. Weights are a fixed diagnostic allocation: they are never tuned
//! and never renormalized when features drop out — an excluded feature
//! contributes exactly zero and the remaining weights stay as they are.
//!
//! The percentile score ranks `S_t` within the instrument's own trailing
//! (expanding during cold start) raw-score history. Instrument isolation
//! applies here exactly as it does for baselines.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::ConfigError;
use crate::domain::{Feature, ZScoreSet};

/// Fixed diagnostic weights. Conceptual allocations, not optimized.
pub const FEATURE_WEIGHTS: [(Feature, f64); 5] = [
    (Feature::DarkShare, 0.25),
    (Feature::Gex, 0.25),
    (Feature::VenueMix, 0.20),
    (Feature::BlockIntensity, 0.15),
    (Feature::IvSkew, 0.15),
];

/// Interpretation bands for percentile scores.
///
/// Boundaries are closed on the lower edge, open on the upper:
/// NORMAL [0,30), ELEVATED [30,60), UNUSUAL [60,80), EXTREME [80,100].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterpretationBand {
    Normal,
    Elevated,
    Unusual,
    Extreme,
}

impl InterpretationBand {
    pub fn label(&self) -> &'static str {
        match self {
            InterpretationBand::Normal => "Normal",
            InterpretationBand::Elevated => "Elevated",
            InterpretationBand::Unusual => "Unusual",
            InterpretationBand::Extreme => "Extreme",
        }
    }
}

/// Result of unusualness scoring for a single instrument-date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringResult {
    /// Weighted absolute z-score sum (S_t).
    pub raw_score: f64,
    /// Percentile rank in [0, 100], NaN when no history is available.
    /// NaN serializes as null and round-trips back to NaN.
    #[serde(with = "nan_as_null")]
    pub percentile_score: f64,
    /// Interpretation band for the percentile score.
    pub interpretation: InterpretationBand,
    /// Per-feature contribution `w_k × |Z_k|` for included features.
    pub feature_contributions: BTreeMap<Feature, f64>,
    /// Features that contributed zero (NaN z-score or explicit exclusion).
    pub excluded_features: Vec<Feature>,
}

mod nan_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &f64, s: S) -> Result<S::Ok, S::Error> {
        if v.is_nan() {
            s.serialize_none()
        } else {
            s.serialize_some(v)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(d)?.unwrap_or(f64::NAN))
    }
}

/// Unusualness scoring engine.
#[derive(Debug, Clone)]
pub struct Scorer {
    window: usize,
    weights: BTreeMap<Feature, f64>,
}

impl Scorer {
    /// Construct with the fixed diagnostic weight table.
    pub fn new(window: usize) -> Result<Self, ConfigError> {
        Self::with_weights(window, FEATURE_WEIGHTS.into_iter().collect())
    }

    /// Construct with an explicit weight table (tests only in practice).
    pub fn with_weights(
        window: usize,
        weights: BTreeMap<Feature, f64>,
    ) -> Result<Self, ConfigError> {
        if window < 1 {
            return Err(ConfigError::ScoreWindowTooSmall(window));
        }
        if weights.is_empty() {
            return Err(ConfigError::EmptyWeights);
        }
        for (&feature, &weight) in &weights {
            if !(weight > 0.0) {
                return Err(ConfigError::NonPositiveWeight {
                    feature: feature.name().to_string(),
                    weight,
                });
            }
        }
        Ok(Self { window, weights })
    }

    pub fn weights(&self) -> &BTreeMap<Feature, f64> {
        &self.weights
    }

    /// Compute the raw weighted |Z| sum and per-feature contributions.
    ///
    /// A feature contributes only if it carries a weight, has a non-NaN
    /// z-score, and is not explicitly excluded. Remaining weights are not
    /// rescaled to compensate for exclusions.
    pub fn compute_raw_score(
        &self,
        z_scores: &ZScoreSet,
        excluded: &[Feature],
    ) -> (f64, BTreeMap<Feature, f64>) {
        let mut raw = 0.0;
        let mut contributions = BTreeMap::new();

        for (&feature, &z) in z_scores {
            if excluded.contains(&feature) || z.is_nan() {
                continue;
            }
            let Some(&weight) = self.weights.get(&feature) else {
                continue;
            };
            let contribution = weight * z.abs();
            contributions.insert(feature, contribution);
            raw += contribution;
        }

        (raw, contributions)
    }

    /// Percentile rank for each raw score within its trailing history.
    ///
    /// Index `i` ranks against the expanding window `[0, i]` while
    /// `i < window`, and against the trailing `window` values thereafter.
    /// NaN values neither rank nor count; an all-NaN window yields NaN.
    pub fn compute_percentile_scores(&self, raw_scores: &[f64]) -> Vec<f64> {
        let n = raw_scores.len();
        let mut out = Vec::with_capacity(n);

        for i in 0..n {
            let current = raw_scores[i];
            if current.is_nan() {
                out.push(f64::NAN);
                continue;
            }
            let start = if i < self.window {
                0
            } else {
                i + 1 - self.window
            };
            let window: Vec<f64> = raw_scores[start..=i]
                .iter()
                .copied()
                .filter(|v| !v.is_nan())
                .collect();
            if window.is_empty() {
                out.push(f64::NAN);
                continue;
            }
            let rank = window.iter().filter(|&&v| v <= current).count();
            out.push(rank as f64 / window.len() as f64 * 100.0);
        }

        out
    }

    /// Interpretation band for a percentile score. NaN maps to Normal.
    pub fn interpretation(&self, percentile: f64) -> InterpretationBand {
        if percentile.is_nan() || percentile < 30.0 {
            InterpretationBand::Normal
        } else if percentile < 60.0 {
            InterpretationBand::Elevated
        } else if percentile < 80.0 {
            InterpretationBand::Unusual
        } else {
            InterpretationBand::Extreme
        }
    }

    /// Full score for one instrument-date: raw sum, percentile against the
    /// instrument's raw-score history (current value appended), band.
    pub fn score(
        &self,
        z_scores: &ZScoreSet,
        history: &[f64],
        excluded: &[Feature],
    ) -> ScoringResult {
        let (raw_score, feature_contributions) = self.compute_raw_score(z_scores, excluded);

        let mut extended = history.to_vec();
        extended.push(raw_score);
        let percentile_score = self
            .compute_percentile_scores(&extended)
            .last()
            .copied()
            .unwrap_or(f64::NAN);

        ScoringResult {
            raw_score,
            percentile_score,
            interpretation: self.interpretation(percentile_score),
            feature_contributions,
            excluded_features: excluded.to_vec(),
        }
    }

    /// Top contributors ranked by contribution descending.
    pub fn top_contributors(
        &self,
        contributions: &BTreeMap<Feature, f64>,
        n: usize,
    ) -> Vec<(Feature, f64)> {
        let mut ranked: Vec<(Feature, f64)> =
            contributions.iter().map(|(&f, &c)| (f, c)).collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).expect("contributions are finite"));
        ranked.truncate(n);
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn z(pairs: &[(Feature, f64)]) -> ZScoreSet {
        pairs.iter().copied().collect()
    }

    #[test]
    fn raw_score_weighted_abs_sum() {
        let scorer = Scorer::new(63).unwrap();
        let (raw, contributions) = scorer.compute_raw_score(
            &z(&[
                (Feature::Gex, 2.5),
                (Feature::DarkShare, -1.8),
                (Feature::IvSkew, 0.5),
            ]),
            &[],
        );
        // 0.25*2.5 + 0.25*1.8 + 0.15*0.5 = 1.15
        assert!((raw - 1.15).abs() < 1e-12);
        assert_eq!(contributions.len(), 3);
        assert!((contributions[&Feature::DarkShare] - 0.45).abs() < 1e-12);
    }

    #[test]
    fn nan_z_contributes_zero() {
        let scorer = Scorer::new(63).unwrap();
        let (raw, contributions) =
            scorer.compute_raw_score(&z(&[(Feature::Gex, f64::NAN), (Feature::IvSkew, 1.0)]), &[]);
        assert!((raw - 0.15).abs() < 1e-12);
        assert!(!contributions.contains_key(&Feature::Gex));
    }

    #[test]
    fn exclusion_does_not_rescale_others() {
        let scorer = Scorer::new(63).unwrap();
        let scores = z(&[(Feature::Gex, 2.0), (Feature::DarkShare, 2.0)]);
        let (_, with_both) = scorer.compute_raw_score(&scores, &[]);
        let (raw, with_one) = scorer.compute_raw_score(&scores, &[Feature::DarkShare]);
        assert_eq!(with_one[&Feature::Gex], with_both[&Feature::Gex]);
        assert!((raw - 0.5).abs() < 1e-12);
    }

    #[test]
    fn unweighted_feature_ignored() {
        let scorer = Scorer::new(63).unwrap();
        let (raw, _) = scorer.compute_raw_score(&z(&[(Feature::Vanna, 5.0)]), &[]);
        assert_eq!(raw, 0.0);
    }

    #[test]
    fn percentile_rank_highest_is_100() {
        let scorer = Scorer::new(63).unwrap();
        let p = scorer.compute_percentile_scores(&[1.0, 1.5, 2.0, 1.2, 3.0]);
        assert!((p[4] - 100.0).abs() < 1e-12);
        // First value ranks only against itself
        assert!((p[0] - 100.0).abs() < 1e-12);
    }

    #[test]
    fn percentile_rolling_window() {
        let scorer = Scorer::new(3).unwrap();
        // Index 4 ranks within [3.0, 4.0, 1.0] → 1 of 3 ≤ 1.0
        let p = scorer.compute_percentile_scores(&[1.0, 2.0, 3.0, 4.0, 1.0]);
        assert!((p[4] - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn percentile_nan_handling() {
        let scorer = Scorer::new(63).unwrap();
        let p = scorer.compute_percentile_scores(&[f64::NAN, 1.0, f64::NAN, 2.0]);
        assert!(p[0].is_nan());
        assert!(p[2].is_nan());
        // Index 3 ranks against {1.0, 2.0}
        assert!((p[3] - 100.0).abs() < 1e-12);
    }

    #[test]
    fn interpretation_bands_lower_closed() {
        let scorer = Scorer::new(63).unwrap();
        assert_eq!(scorer.interpretation(0.0), InterpretationBand::Normal);
        assert_eq!(scorer.interpretation(29.99), InterpretationBand::Normal);
        assert_eq!(scorer.interpretation(30.0), InterpretationBand::Elevated);
        assert_eq!(scorer.interpretation(60.0), InterpretationBand::Unusual);
        assert_eq!(scorer.interpretation(80.0), InterpretationBand::Extreme);
        assert_eq!(scorer.interpretation(100.0), InterpretationBand::Extreme);
        assert_eq!(scorer.interpretation(f64::NAN), InterpretationBand::Normal);
    }

    #[test]
    fn score_appends_current_to_history() {
        let scorer = Scorer::new(63).unwrap();
        let result = scorer.score(
            &z(&[(Feature::Gex, 4.0)]),
            &[0.1, 0.2, 0.3, 0.4],
            &[],
        );
        // raw = 1.0, highest of the extended history
        assert!((result.raw_score - 1.0).abs() < 1e-12);
        assert!((result.percentile_score - 100.0).abs() < 1e-12);
        assert_eq!(result.interpretation, InterpretationBand::Extreme);
    }

    #[test]
    fn top_contributors_descending() {
        let scorer = Scorer::new(63).unwrap();
        let contributions: BTreeMap<Feature, f64> = [
            (Feature::Gex, 0.625),
            (Feature::DarkShare, 0.45),
            (Feature::IvSkew, 0.075),
        ]
        .into_iter()
        .collect();
        let top = scorer.top_contributors(&contributions, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].0, Feature::Gex);
        assert_eq!(top[1].0, Feature::DarkShare);
    }

    #[test]
    fn construction_rejects_bad_weights() {
        assert!(Scorer::new(0).is_err());
        assert!(Scorer::with_weights(63, BTreeMap::new()).is_err());
        let bad: BTreeMap<Feature, f64> = [(Feature::Gex, 0.0)].into_iter().collect();
        assert!(Scorer::with_weights(63, bad).is_err());
    }
}
