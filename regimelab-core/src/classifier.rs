//! Regime classification — priority-ordered deterministic rules.
//!
//! A pure decision list: rules are evaluated top-to-bottom and the first
//! match wins. Each call is independent given the day's inputs; the
//! classifier holds no state. Thresholds are strict inequalities — a value
//! exactly at a threshold does not match. NaN in any required operand fails
//! the rule outright.
//!
//! Priority order:
//! 1. Γ⁺ — dealers long gamma, volatility suppression
//! 2. Γ⁻ — dealers short gamma, liquidity vacuum
//! 3. DD — dark-dominant accumulation
//! 4. ABS — absorption-like
//! 5. DIST — distribution-like
//! 6. NEU — nothing dominates
//!
//! UND is the insufficient-baseline pre-check, not a rule in the list.

use serde::{Deserialize, Serialize};

use crate::domain::{feature_or_nan, Feature, RawFeatureSet, ZScoreSet};

/// Classification thresholds. Fixed — the rule table is part of the
/// diagnostic definition, not a tuning surface.
pub const Z_GEX_THRESHOLD: f64 = 1.5;
pub const Z_BLOCK_THRESHOLD: f64 = 1.0;
pub const Z_DEX_THRESHOLD: f64 = 1.0;
pub const DARK_SHARE_DD_THRESHOLD: f64 = 0.70;
pub const DARK_SHARE_ABS_THRESHOLD: f64 = 0.50;
pub const RETURN_ABS_FLOOR: f64 = -0.005;
pub const RETURN_DIST_CAP: f64 = 0.005;

/// The seven mutually-exclusive daily regimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Regime {
    GammaPositive,
    GammaNegative,
    DarkDominant,
    Absorption,
    Distribution,
    Neutral,
    Undetermined,
}

impl Regime {
    /// Short tag used in output and logs.
    pub fn tag(&self) -> &'static str {
        match self {
            Regime::GammaPositive => "Γ⁺",
            Regime::GammaNegative => "Γ⁻",
            Regime::DarkDominant => "DD",
            Regime::Absorption => "ABS",
            Regime::Distribution => "DIST",
            Regime::Neutral => "NEU",
            Regime::Undetermined => "UND",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Regime::GammaPositive => "Gamma-Positive Control",
            Regime::GammaNegative => "Gamma-Negative Liquidity Vacuum",
            Regime::DarkDominant => "Dark-Dominant Accumulation",
            Regime::Absorption => "Absorption-Like",
            Regime::Distribution => "Distribution-Like",
            Regime::Neutral => "Neutral / Mixed",
            Regime::Undetermined => "Undetermined",
        }
    }

    pub fn interpretation(&self) -> &'static str {
        match self {
            Regime::GammaPositive => {
                "Dealers are significantly long gamma. Their hedging activity \
                 compresses the intraday range, resulting in below-normal price \
                 efficiency. Volatility suppression regime."
            }
            Regime::GammaNegative => {
                "Dealers are significantly short gamma. Their hedging amplifies \
                 directional moves. Above-normal price impact per unit volume \
                 signals a liquidity vacuum."
            }
            Regime::DarkDominant => {
                "More than 70% of volume is executing off-exchange, with \
                 block-print intensity elevated above +1 sigma. Consistent with \
                 institutional positioning via dark liquidity."
            }
            Regime::Absorption => {
                "Net delta exposure is significantly negative (sell pressure), \
                 but the daily close-to-close move is no worse than -0.5%, and \
                 dark pool participation exceeds 50%. Passive buying is absorbing \
                 the sell flow."
            }
            Regime::Distribution => {
                "Net delta exposure is significantly positive (buy pressure), \
                 but the daily move is no better than +0.5%. Supply is being \
                 distributed into strength without upside follow-through."
            }
            Regime::Neutral => {
                "No single microstructure pattern dominates. The instrument is \
                 in a balanced or ambiguous state."
            }
            Regime::Undetermined => "System cannot classify. Diagnosis withheld.",
        }
    }
}

/// One evaluated condition of the winning rule, kept for explainability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionCheck {
    /// Condition name, e.g. "Z_GEX" or "Impact_vs_median".
    pub name: String,
    /// The value observed today.
    pub observed: f64,
    /// The threshold it was compared against.
    pub threshold: f64,
    /// Whether the condition held.
    pub matched: bool,
}

impl ConditionCheck {
    fn met(name: &str, observed: f64, threshold: f64) -> Self {
        Self {
            name: name.to_string(),
            observed,
            threshold,
            matched: true,
        }
    }
}

/// Result of regime classification for one instrument-date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeResult {
    pub regime: Regime,
    /// Conditions of the winning rule, in evaluation order. Empty for
    /// NEU and UND.
    pub triggering_conditions: Vec<ConditionCheck>,
    pub interpretation: String,
    pub baseline_sufficient: bool,
}

impl RegimeResult {
    fn of(regime: Regime, conditions: Vec<ConditionCheck>, baseline_sufficient: bool) -> Self {
        Self {
            regime,
            triggering_conditions: conditions,
            interpretation: regime.interpretation().to_string(),
            baseline_sufficient,
        }
    }
}

/// Regime classifier. Stateless; `classify` is referentially transparent.
#[derive(Debug, Clone, Default)]
pub struct Classifier;

impl Classifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify one instrument-date.
    ///
    /// `baseline_medians` supplies the rolling medians for the efficiency
    /// and impact benchmarks; `daily_return` is close-to-close. If
    /// `baseline_sufficient` is false the result is UND without evaluating
    /// any rule.
    pub fn classify(
        &self,
        z_scores: &ZScoreSet,
        raw_features: &RawFeatureSet,
        baseline_medians: &RawFeatureSet,
        daily_return: f64,
        baseline_sufficient: bool,
    ) -> RegimeResult {
        if !baseline_sufficient {
            return RegimeResult::of(Regime::Undetermined, Vec::new(), false);
        }

        let z_gex = feature_or_nan(z_scores, Feature::Gex);
        let z_dex = feature_or_nan(z_scores, Feature::Dex);
        let z_block = feature_or_nan(z_scores, Feature::BlockIntensity);
        let dark_share = feature_or_nan(raw_features, Feature::DarkShare);
        let efficiency = feature_or_nan(raw_features, Feature::Efficiency);
        let impact = feature_or_nan(raw_features, Feature::Impact);
        let efficiency_median = feature_or_nan(baseline_medians, Feature::Efficiency);
        let impact_median = feature_or_nan(baseline_medians, Feature::Impact);

        // 1. Γ⁺: Z_GEX > +1.5 AND efficiency < median
        if z_gex > Z_GEX_THRESHOLD && efficiency < efficiency_median {
            return RegimeResult::of(
                Regime::GammaPositive,
                vec![
                    ConditionCheck::met("Z_GEX", z_gex, Z_GEX_THRESHOLD),
                    ConditionCheck::met("Efficiency_vs_median", efficiency, efficiency_median),
                ],
                true,
            );
        }

        // 2. Γ⁻: Z_GEX < −1.5 AND impact > median
        if z_gex < -Z_GEX_THRESHOLD && impact > impact_median {
            return RegimeResult::of(
                Regime::GammaNegative,
                vec![
                    ConditionCheck::met("Z_GEX", z_gex, -Z_GEX_THRESHOLD),
                    ConditionCheck::met("Impact_vs_median", impact, impact_median),
                ],
                true,
            );
        }

        // 3. DD: dark_share > 0.70 AND Z_block > +1.0
        if dark_share > DARK_SHARE_DD_THRESHOLD && z_block > Z_BLOCK_THRESHOLD {
            return RegimeResult::of(
                Regime::DarkDominant,
                vec![
                    ConditionCheck::met("DarkShare", dark_share, DARK_SHARE_DD_THRESHOLD),
                    ConditionCheck::met("Z_block", z_block, Z_BLOCK_THRESHOLD),
                ],
                true,
            );
        }

        // 4. ABS: Z_DEX < −1.0 AND return ≥ −0.005 AND dark_share > 0.50
        if z_dex < -Z_DEX_THRESHOLD
            && daily_return >= RETURN_ABS_FLOOR
            && dark_share > DARK_SHARE_ABS_THRESHOLD
        {
            return RegimeResult::of(
                Regime::Absorption,
                vec![
                    ConditionCheck::met("Z_DEX", z_dex, -Z_DEX_THRESHOLD),
                    ConditionCheck::met("Daily_return", daily_return, RETURN_ABS_FLOOR),
                    ConditionCheck::met("DarkShare", dark_share, DARK_SHARE_ABS_THRESHOLD),
                ],
                true,
            );
        }

        // 5. DIST: Z_DEX > +1.0 AND return ≤ +0.005
        if z_dex > Z_DEX_THRESHOLD && daily_return <= RETURN_DIST_CAP {
            return RegimeResult::of(
                Regime::Distribution,
                vec![
                    ConditionCheck::met("Z_DEX", z_dex, Z_DEX_THRESHOLD),
                    ConditionCheck::met("Daily_return", daily_return, RETURN_DIST_CAP),
                ],
                true,
            );
        }

        // 6. NEU
        RegimeResult::of(Regime::Neutral, Vec::new(), true)
    }
}
