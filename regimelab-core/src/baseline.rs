//! Baseline — rolling statistics, z-score normalization, state tracking.
//!
//! Statistics use an expanding window during cold start (fewer than `window`
//! observations seen) and a trailing rolling window of exactly `window`
//! thereafter. Only non-NaN observations count; below `min_periods` valid
//! observations the baseline is invalid and downstream z-scores are NaN.
//!
//! Baselines are strictly per-instrument: a `Baseline` only ever sees one
//! `FeatureSeries` at a time and holds no cross-series state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::{ConfigError, EngineConfig};
use crate::domain::{Feature, FeatureSeries};
use crate::explain::ExcludedFeature;

/// Rolling baseline statistics for a single feature at a single date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaselineStats {
    /// Rolling mean over non-NaN observations.
    pub mean: f64,
    /// Rolling sample standard deviation (ddof = 1).
    pub std: f64,
    /// Rolling median over non-NaN observations.
    pub median: f64,
    /// Count of non-NaN observations in the window.
    pub n_valid: usize,
    /// True iff `n_valid >= min_periods` and `std > 0`.
    pub is_valid: bool,
}

impl BaselineStats {
    fn invalid(n_valid: usize) -> Self {
        Self {
            mean: f64::NAN,
            std: f64::NAN,
            median: f64::NAN,
            n_valid,
            is_valid: false,
        }
    }
}

/// Baseline validity states, derived from per-feature observation counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BaselineState {
    /// All features below `min_periods` — no diagnosis possible.
    Empty,
    /// Some features valid, some not — conditional diagnosis.
    Partial,
    /// All features at or above `min_periods` — full confidence.
    Complete,
}

impl BaselineState {
    pub fn label(&self) -> &'static str {
        match self {
            BaselineState::Empty => "EMPTY",
            BaselineState::Partial => "PARTIAL",
            BaselineState::Complete => "COMPLETE",
        }
    }
}

/// Baseline computation engine with expanding-window cold start.
#[derive(Debug, Clone)]
pub struct Baseline {
    window: usize,
    min_periods: usize,
    drift_threshold: f64,
}

impl Baseline {
    /// Construct with explicit parameters. Fails fast on invalid values.
    pub fn new(
        window: usize,
        min_periods: usize,
        drift_threshold: f64,
    ) -> Result<Self, ConfigError> {
        let config = EngineConfig {
            window,
            min_periods,
            drift_threshold,
            ..EngineConfig::default()
        };
        config.validate()?;
        Ok(Self {
            window,
            min_periods,
            drift_threshold,
        })
    }

    /// Construct from a validated engine configuration.
    pub fn from_config(config: &EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            window: config.window,
            min_periods: config.min_periods,
            drift_threshold: config.drift_threshold,
        })
    }

    pub fn min_periods(&self) -> usize {
        self.min_periods
    }

    /// Compute baseline statistics for every date in the series.
    ///
    /// Index `i` uses observations `[0, i]` while `i < window` (expanding)
    /// and the trailing `window` observations thereafter. The statistics at
    /// a date therefore never see values after that date.
    pub fn compute_statistics(&self, series: &FeatureSeries) -> Vec<BaselineStats> {
        let values = series.values();
        let n = values.len();
        let mut out = Vec::with_capacity(n);

        for i in 0..n {
            let start = if i < self.window {
                0
            } else {
                i + 1 - self.window
            };
            let window: Vec<f64> = values[start..=i]
                .iter()
                .copied()
                .filter(|v| !v.is_nan())
                .collect();

            if window.len() < self.min_periods {
                out.push(BaselineStats::invalid(window.len()));
                continue;
            }

            let mean = window.iter().sum::<f64>() / window.len() as f64;
            let var = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
                / (window.len() - 1) as f64;
            let std = var.sqrt();
            let median = median_of(&window);

            out.push(BaselineStats {
                mean,
                std,
                median,
                n_valid: window.len(),
                is_valid: std > 0.0,
            });
        }

        out
    }

    /// Compute z-scores for every date in the series.
    ///
    /// `z = (x - mean) / std` using the statistics valid as of the same date.
    /// NaN where the input is NaN, the baseline is invalid, or std is zero.
    pub fn compute_z_scores(&self, series: &FeatureSeries) -> Vec<f64> {
        let stats = self.compute_statistics(series);
        series
            .values()
            .iter()
            .zip(stats.iter())
            .map(|(&x, s)| {
                if x.is_nan() || !s.is_valid {
                    f64::NAN
                } else {
                    (x - s.mean) / s.std
                }
            })
            .collect()
    }

    /// Derive the baseline state from per-feature valid-observation counts.
    pub fn state(&self, feature_counts: &BTreeMap<Feature, usize>) -> BaselineState {
        if feature_counts.is_empty() {
            return BaselineState::Empty;
        }
        let valid = feature_counts
            .values()
            .filter(|&&n| n >= self.min_periods)
            .count();
        if valid == feature_counts.len() {
            BaselineState::Complete
        } else if valid > 0 {
            BaselineState::Partial
        } else {
            BaselineState::Empty
        }
    }

    /// Detect baseline drift between consecutive means.
    ///
    /// Informational only — never blocks or alters computation. NaN on
    /// either side reports no drift; a zero previous mean counts any
    /// nonzero current mean as drift.
    pub fn detect_drift(&self, current_mean: f64, previous_mean: f64) -> bool {
        if current_mean.is_nan() || previous_mean.is_nan() {
            return false;
        }
        if previous_mean == 0.0 {
            return current_mean != 0.0;
        }
        ((current_mean - previous_mean) / previous_mean).abs() > self.drift_threshold
    }

    /// Features excluded for insufficient history, sorted by count ascending.
    pub fn excluded_features(
        &self,
        feature_counts: &BTreeMap<Feature, usize>,
    ) -> Vec<ExcludedFeature> {
        let mut excluded: Vec<(Feature, usize)> = feature_counts
            .iter()
            .filter(|(_, &n)| n < self.min_periods)
            .map(|(&f, &n)| (f, n))
            .collect();
        excluded.sort_by_key(|&(_, n)| n);
        excluded
            .into_iter()
            .map(|(f, n)| ExcludedFeature::insufficient_history(f, n, self.min_periods))
            .collect()
    }
}

/// Median of a non-empty slice (values are copied and sorted).
fn median_of(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).expect("NaN filtered before median"));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
