//! Per-instrument diagnostic pipeline.
//!
//! `Processor::diagnose` runs Baseline → Scorer → Classifier → Explainer
//! for one (ticker, date), using only that instrument's own series. It is a
//! pure function of the feed's contents and is fanned out across instruments
//! by the daily cycle. It never fails: missing data degrades to exclusions,
//! an EMPTY baseline, and an UND regime.

use chrono::NaiveDate;
use log::debug;
use std::collections::BTreeMap;

use regimelab_core::{
    Baseline, BaselineState, Classifier, ConfigError, DiagnosticOutput, EngineConfig,
    ExcludedFeature, Explainer, Feature, RawFeatureSet, Scorer, StressSignals, ZScoreSet,
};

use crate::feed::FeatureFeed;

/// Full diagnostic for one (ticker, date), with the intermediate values the
/// stress check needs alongside the published output.
#[derive(Debug, Clone)]
pub struct TickerDiagnostic {
    pub output: DiagnosticOutput,
    pub z_scores: ZScoreSet,
    pub raw_features: RawFeatureSet,
    /// Percentile unusualness score, NaN when no score exists.
    pub unusualness: f64,
}

impl TickerDiagnostic {
    /// Today's stress signals, for FOCUS promotion.
    pub fn stress_signals(&self) -> StressSignals {
        StressSignals {
            unusualness: self.unusualness,
            z_gex: self.z_scores.get(&Feature::Gex).copied().unwrap_or(f64::NAN),
            dark_share: self
                .raw_features
                .get(&Feature::DarkShare)
                .copied()
                .unwrap_or(f64::NAN),
            z_block: self
                .z_scores
                .get(&Feature::BlockIntensity)
                .copied()
                .unwrap_or(f64::NAN),
        }
    }
}

/// The assembled engine components for one configuration.
#[derive(Debug, Clone)]
pub struct Processor {
    baseline: Baseline,
    scorer: Scorer,
    classifier: Classifier,
    explainer: Explainer,
    min_periods: usize,
}

impl Processor {
    pub fn new(config: &EngineConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            baseline: Baseline::from_config(config)?,
            scorer: Scorer::new(config.score_window)?,
            classifier: Classifier::new(),
            explainer: Explainer::new(),
            min_periods: config.min_periods,
        })
    }

    /// Run the full pipeline for one instrument-date.
    pub fn diagnose(
        &self,
        feed: &dyn FeatureFeed,
        ticker: &str,
        date: NaiveDate,
    ) -> TickerDiagnostic {
        let mut counts: BTreeMap<Feature, usize> = BTreeMap::new();
        let mut z_latest = ZScoreSet::new();
        let mut raw_latest = RawFeatureSet::new();
        let mut medians = RawFeatureSet::new();
        // Dated z-scores per weighted feature, for the raw-score history.
        let mut dated_z: BTreeMap<Feature, BTreeMap<NaiveDate, f64>> = BTreeMap::new();

        for feature in Feature::ALL {
            let series = feed.series(ticker, feature, date);
            let stats = self.baseline.compute_statistics(&series);
            let z = self.baseline.compute_z_scores(&series);

            counts.insert(feature, stats.last().map_or(0, |s| s.n_valid));
            z_latest.insert(feature, z.last().copied().unwrap_or(f64::NAN));
            raw_latest.insert(feature, series.last_value());

            // Drift is informational only: recorded, never acted on.
            if stats.len() >= 2 {
                let prev = stats[stats.len() - 2].mean;
                let curr = stats[stats.len() - 1].mean;
                if self.baseline.detect_drift(curr, prev) {
                    debug!("{ticker}: baseline drift on {feature} (mean {prev:.4} -> {curr:.4})");
                }
            }

            if matches!(feature, Feature::Efficiency | Feature::Impact) {
                medians.insert(feature, stats.last().map_or(f64::NAN, |s| s.median));
            }

            if self.scorer.weights().contains_key(&feature) {
                let map: BTreeMap<NaiveDate, f64> = series
                    .dates()
                    .iter()
                    .copied()
                    .zip(z.iter().copied())
                    .collect();
                dated_z.insert(feature, map);
            }
        }

        let state = self.baseline.state(&counts);

        // Exclusions: insufficient history first (sorted by count), then
        // features whose z is NaN despite enough observations.
        let mut excluded = self.baseline.excluded_features(&counts);
        for feature in Feature::ALL {
            if counts[&feature] >= self.min_periods && z_latest[&feature].is_nan() {
                excluded.push(ExcludedFeature::nan_value(feature));
            }
        }
        let excluded_names: Vec<Feature> = excluded.iter().map(|e| e.feature).collect();

        let scoring = if state != BaselineState::Empty {
            let history = raw_score_history(&self.scorer, &dated_z, date);
            Some(self.scorer.score(&z_latest, &history, &excluded_names))
        } else {
            None
        };
        let unusualness = scoring
            .as_ref()
            .map_or(f64::NAN, |s| s.percentile_score);

        let daily_return = feed.daily_return(ticker, date);
        let regime = self.classifier.classify(
            &z_latest,
            &raw_latest,
            &medians,
            daily_return,
            state != BaselineState::Empty,
        );

        let output = self
            .explainer
            .explain(ticker, date, regime, scoring, excluded, state);

        TickerDiagnostic {
            output,
            z_scores: z_latest,
            raw_features: raw_latest,
            unusualness,
        }
    }

    /// Cheap Pass-2 scan: gamma exposure, dark share, and block intensity
    /// only. No score, no classification, no output.
    pub fn scan(&self, feed: &dyn FeatureFeed, ticker: &str, date: NaiveDate) -> StressSignals {
        let z_last = |feature: Feature| {
            let series = feed.series(ticker, feature, date);
            self.baseline
                .compute_z_scores(&series)
                .last()
                .copied()
                .unwrap_or(f64::NAN)
        };

        StressSignals {
            unusualness: f64::NAN,
            z_gex: z_last(Feature::Gex),
            dark_share: feed.series(ticker, Feature::DarkShare, date).last_value(),
            z_block: z_last(Feature::BlockIntensity),
        }
    }
}

/// Raw unusualness scores for all dates before `date`, aligned on the union
/// of the weighted features' date axes. Days where no weighted feature has
/// a valid z-score are skipped rather than recorded as zero.
fn raw_score_history(
    scorer: &Scorer,
    dated_z: &BTreeMap<Feature, BTreeMap<NaiveDate, f64>>,
    date: NaiveDate,
) -> Vec<f64> {
    let mut all_dates: Vec<NaiveDate> = dated_z
        .values()
        .flat_map(|m| m.keys().copied())
        .filter(|d| *d < date)
        .collect();
    all_dates.sort();
    all_dates.dedup();

    let mut history = Vec::with_capacity(all_dates.len());
    for d in all_dates {
        let z_at: ZScoreSet = dated_z
            .iter()
            .map(|(&f, m)| (f, m.get(&d).copied().unwrap_or(f64::NAN)))
            .collect();
        if z_at.values().all(|z| z.is_nan()) {
            continue;
        }
        let (raw, _) = scorer.compute_raw_score(&z_at, &[]);
        history.push(raw);
    }
    history
}
