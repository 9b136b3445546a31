//! RegimeLab Core — the market-maker regime diagnostic engine.
//!
//! This crate contains the deterministic, explainable core:
//! - Domain types (features, per-instrument series, z-score sets)
//! - Baseline statistics with expanding-window cold start
//! - Unusualness scoring (weighted |Z| sum → percentile → band)
//! - Priority-ordered regime classification (decision list, first match wins)
//! - Explainability aggregation (structured + text renderings)
//! - CORE/FOCUS universe membership state machine with cap enforcement
//!
//! The core performs no I/O and holds no global state. Per-instrument
//! computation is a pure function of that instrument's own series, so the
//! runner can fan out across instruments freely; the only shared mutable
//! state is the universe snapshot, mutated once per day in the finalize step.

pub mod baseline;
pub mod classifier;
pub mod config;
pub mod domain;
pub mod explain;
pub mod scoring;
pub mod universe;

pub use baseline::{Baseline, BaselineState, BaselineStats};
pub use classifier::{Classifier, ConditionCheck, Regime, RegimeResult};
pub use config::{ConfigError, EngineConfig, StressThresholds};
pub use domain::{Feature, FeatureSeries, RawFeatureSet, ZScoreSet};
pub use explain::{DiagnosticOutput, ExcludedFeature, Explainer};
pub use scoring::{InterpretationBand, Scorer, ScoringResult, FEATURE_WEIGHTS};
pub use universe::{
    dedup_constituents, event_qualifiers, structural_threshold, top_constituents, within_window,
    CalendarEvent, EventKind, FocusEntry, FocusReason, IndexConstituent, StressSignals,
    UniverseManager, UniverseSnapshot, CORE_TICKERS,
};
