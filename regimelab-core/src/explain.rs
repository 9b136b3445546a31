//! Explainability — assembling per-instrument diagnostics.
//!
//! The explainer performs no computation of its own: it combines the
//! classifier, scorer, and baseline outputs into one immutable
//! `DiagnosticOutput` with two renderings — the serde-structured form for
//! programmatic consumers and a deterministic plain-text form for humans.
//! Both derive from the same struct; nothing is re-queried.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::baseline::BaselineState;
use crate::classifier::RegimeResult;
use crate::domain::Feature;
use crate::scoring::ScoringResult;

/// Record of a feature excluded from analysis, with a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcludedFeature {
    pub feature: Feature,
    pub reason: String,
}

impl ExcludedFeature {
    /// Standard reason for insufficient history: "n = 9 < 21".
    pub fn insufficient_history(feature: Feature, n_obs: usize, min_required: usize) -> Self {
        Self {
            feature,
            reason: format!("n = {n_obs} < {min_required}"),
        }
    }

    /// Standard reason for a missing observation on the diagnosis date.
    pub fn nan_value(feature: Feature) -> Self {
        Self {
            feature,
            reason: "NaN value".to_string(),
        }
    }

    pub fn custom(feature: Feature, reason: impl Into<String>) -> Self {
        Self {
            feature,
            reason: reason.into(),
        }
    }
}

/// Complete diagnostic output for one (instrument, date). Immutable once
/// produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticOutput {
    pub ticker: String,
    pub date: NaiveDate,
    pub regime: RegimeResult,
    /// Absent when the baseline is EMPTY — no valid score exists, and
    /// absence is not zero.
    pub scoring: Option<ScoringResult>,
    pub excluded_features: Vec<ExcludedFeature>,
    pub baseline_state: BaselineState,
}

impl DiagnosticOutput {
    /// Deterministic human-readable rendering.
    pub fn render_text(&self) -> String {
        let mut lines = Vec::new();
        lines.push(format!(
            "=== Regime Diagnostic: {} @ {} ===",
            self.ticker, self.date
        ));
        lines.push(String::new());

        // Regime section
        lines.push(format!(
            "Regime: {} ({})",
            self.regime.regime.tag(),
            self.regime.regime.description()
        ));
        if self.regime.triggering_conditions.is_empty() {
            lines.push(format!("  {}", self.regime.interpretation));
        } else {
            for check in &self.regime.triggering_conditions {
                let mark = if check.matched { "✓" } else { "✗" };
                lines.push(format!(
                    "{} = {:.4} (threshold: {:.4}) {}",
                    check.name, check.observed, check.threshold, mark
                ));
            }
        }
        lines.push(String::new());

        // Score section
        match &self.scoring {
            Some(scoring) => {
                let score = if scoring.percentile_score.is_nan() {
                    "N/A".to_string()
                } else {
                    format!("{:.0}", scoring.percentile_score)
                };
                lines.push(format!(
                    "Unusualness: {} ({})",
                    score,
                    scoring.interpretation.label()
                ));
                if !scoring.feature_contributions.is_empty() {
                    let mut ranked: Vec<(&Feature, &f64)> =
                        scoring.feature_contributions.iter().collect();
                    ranked.sort_by(|a, b| b.1.partial_cmp(a.1).expect("finite contributions"));
                    let drivers: Vec<String> = ranked
                        .iter()
                        .take(3)
                        .map(|(f, c)| format!("{} contrib={:.2}", f.name().to_uppercase(), c))
                        .collect();
                    lines.push(format!("Top drivers: {}", drivers.join("; ")));
                }
            }
            None => lines.push("Unusualness: N/A (insufficient data)".to_string()),
        }
        lines.push(String::new());

        // Exclusions + baseline state
        if self.excluded_features.is_empty() {
            lines.push("Excluded: none".to_string());
        } else {
            let parts: Vec<String> = self
                .excluded_features
                .iter()
                .map(|e| format!("{} ({})", e.feature, e.reason))
                .collect();
            lines.push(format!("Excluded: {}", parts.join(", ")));
        }
        lines.push(format!("Baseline: {}", self.baseline_state.label()));

        lines.join("\n")
    }

    /// Compact one-line summary for logs and CLI tables.
    pub fn summary_line(&self) -> String {
        let score = match &self.scoring {
            Some(s) if !s.percentile_score.is_nan() => format!("U={:.1}", s.percentile_score),
            _ => "U=N/A".to_string(),
        };
        format!(
            "{}: {} ({}) [{}]",
            self.ticker,
            self.regime.regime.tag(),
            score,
            self.baseline_state.label()
        )
    }
}

/// Stateless aggregator producing `DiagnosticOutput`.
#[derive(Debug, Clone, Default)]
pub struct Explainer;

impl Explainer {
    pub fn new() -> Self {
        Self
    }

    pub fn explain(
        &self,
        ticker: impl Into<String>,
        date: NaiveDate,
        regime: RegimeResult,
        scoring: Option<ScoringResult>,
        excluded_features: Vec<ExcludedFeature>,
        baseline_state: BaselineState,
    ) -> DiagnosticOutput {
        DiagnosticOutput {
            ticker: ticker.into(),
            date,
            regime,
            scoring,
            excluded_features,
            baseline_state,
        }
    }
}
