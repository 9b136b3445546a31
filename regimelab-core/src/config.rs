//! Engine configuration with fail-fast validation.
//!
//! All windows, thresholds, and caps live here. Construction validates every
//! field and returns a descriptive `ConfigError` — the engine never runs on
//! silently-defaulted parameters.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by configuration validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("window ({window}) must be >= min_periods ({min_periods})")]
    WindowBelowMinPeriods { window: usize, min_periods: usize },

    #[error("min_periods ({0}) must be >= 2 for sample std computation")]
    MinPeriodsTooSmall(usize),

    #[error("drift_threshold ({0}) must be in (0, 1]")]
    DriftThresholdOutOfRange(f64),

    #[error("score_window ({0}) must be >= 1")]
    ScoreWindowTooSmall(usize),

    #[error("focus_cap ({0}) must be >= 1")]
    FocusCapTooSmall(usize),

    #[error("expiry_days ({0}) must be >= 1")]
    ExpiryDaysTooSmall(u32),

    #[error("stress threshold '{name}' ({value}) must be positive")]
    NonPositiveStressThreshold { name: &'static str, value: f64 },

    #[error("feature weight table is empty")]
    EmptyWeights,

    #[error("feature weight for '{feature}' ({weight}) must be positive")]
    NonPositiveWeight { feature: String, weight: f64 },
}

/// Thresholds for the stress entry condition (any one firing promotes a
/// ticker into FOCUS).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StressThresholds {
    /// Minimum unusualness percentile (U_t).
    pub unusualness: f64,
    /// Minimum |Z_GEX|.
    pub z_gex_abs: f64,
    /// Minimum raw dark pool share.
    pub dark_share: f64,
    /// Minimum |Z_block|.
    pub z_block_abs: f64,
}

impl Default for StressThresholds {
    fn default() -> Self {
        Self {
            unusualness: 70.0,
            z_gex_abs: 2.0,
            dark_share: 0.65,
            z_block_abs: 2.0,
        }
    }
}

impl StressThresholds {
    fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("unusualness", self.unusualness),
            ("z_gex_abs", self.z_gex_abs),
            ("dark_share", self.dark_share),
            ("z_block_abs", self.z_block_abs),
        ] {
            if !(value > 0.0) {
                return Err(ConfigError::NonPositiveStressThreshold { name, value });
            }
        }
        Ok(())
    }
}

/// Complete engine configuration.
///
/// Defaults reflect the production constants: 63-day baseline window,
/// 21 minimum observations, 10% drift threshold, 30-ticker FOCUS cap,
/// 3-day inactivity expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Rolling baseline window in trading days.
    pub window: usize,
    /// Minimum non-NaN observations for a valid baseline.
    pub min_periods: usize,
    /// Relative mean change that counts as baseline drift (informational).
    pub drift_threshold: f64,
    /// Window for percentile-ranking raw unusualness scores.
    pub score_window: usize,
    /// Maximum FOCUS size after cap enforcement.
    pub focus_cap: usize,
    /// Consecutive inactive days before a FOCUS entry expires.
    pub expiry_days: u32,
    /// Stress entry thresholds.
    pub stress: StressThresholds,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window: 63,
            min_periods: 21,
            drift_threshold: 0.10,
            score_window: 63,
            focus_cap: 30,
            expiry_days: 3,
            stress: StressThresholds::default(),
        }
    }
}

impl EngineConfig {
    /// Validate all fields. Called by every component constructor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_periods < 2 {
            return Err(ConfigError::MinPeriodsTooSmall(self.min_periods));
        }
        if self.window < self.min_periods {
            return Err(ConfigError::WindowBelowMinPeriods {
                window: self.window,
                min_periods: self.min_periods,
            });
        }
        if !(self.drift_threshold > 0.0 && self.drift_threshold <= 1.0) {
            return Err(ConfigError::DriftThresholdOutOfRange(self.drift_threshold));
        }
        if self.score_window < 1 {
            return Err(ConfigError::ScoreWindowTooSmall(self.score_window));
        }
        if self.focus_cap < 1 {
            return Err(ConfigError::FocusCapTooSmall(self.focus_cap));
        }
        if self.expiry_days < 1 {
            return Err(ConfigError::ExpiryDaysTooSmall(self.expiry_days));
        }
        self.stress.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn window_below_min_periods_rejected() {
        let config = EngineConfig {
            window: 10,
            min_periods: 21,
            ..EngineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::WindowBelowMinPeriods { .. })
        ));
    }

    #[test]
    fn tiny_min_periods_rejected() {
        let config = EngineConfig {
            min_periods: 1,
            ..EngineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MinPeriodsTooSmall(1))
        ));
    }

    #[test]
    fn drift_threshold_bounds() {
        for bad in [0.0, -0.1, 1.5, f64::NAN] {
            let config = EngineConfig {
                drift_threshold: bad,
                ..EngineConfig::default()
            };
            assert!(config.validate().is_err(), "drift_threshold {bad} accepted");
        }
        let config = EngineConfig {
            drift_threshold: 1.0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn nonpositive_stress_threshold_rejected() {
        let config = EngineConfig {
            stress: StressThresholds {
                dark_share: 0.0,
                ..StressThresholds::default()
            },
            ..EngineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonPositiveStressThreshold {
                name: "dark_share",
                ..
            })
        ));
    }
}
