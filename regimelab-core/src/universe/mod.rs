//! Universe membership — the CORE/FOCUS state machine.
//!
//! CORE is the fixed four-instrument set, always fully diagnosed. FOCUS is
//! the dynamic, capped set of instruments that explain CORE behavior:
//! structurally important index constituents, stressed names, and names near
//! a calendar event.
//!
//! Per-instrument lifecycle: untracked → active (any entry condition true)
//! → inactive-counting (no condition true, `inactive_days` increments) →
//! expired (removed at `expiry_days` consecutive inactive days). Any entry
//! condition firing again before expiry resets the counter.
//!
//! The snapshot is read-only during Pass 1 and Pass 2; the daily cycle
//! mutates it through a `UniverseManager` exactly once, in the finalize
//! step, and publishes the result as the next day's snapshot.

pub mod events;
pub mod structural;

pub use events::{event_qualifiers, within_window, CalendarEvent, EventKind};
pub use structural::{dedup_constituents, structural_threshold, top_constituents, IndexConstituent};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::config::{EngineConfig, StressThresholds};

/// The fixed CORE instruments.
pub const CORE_TICKERS: [&str; 4] = ["SPY", "QQQ", "IWM", "DIA"];

/// Why a ticker entered FOCUS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusReason {
    Structural,
    Stress,
    Event,
}

impl FocusReason {
    pub fn label(&self) -> &'static str {
        match self {
            FocusReason::Structural => "structural",
            FocusReason::Stress => "stress",
            FocusReason::Event => "event",
        }
    }
}

/// A FOCUS membership record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusEntry {
    pub ticker: String,
    pub reason: FocusReason,
    /// Human-readable qualification detail, e.g. "rank 3 in QQQ" or
    /// "Z_GEX=-2.5, DarkShare=68%".
    pub detail: String,
    pub entry_date: NaiveDate,
    /// Consecutive evaluations with no entry condition true.
    pub inactive_days: u32,
    /// True for structural entries: exempt from cap eviction and expiry
    /// while structural qualification holds.
    pub protected: bool,
}

/// The universe on one date. Immutable between finalize steps; persistence
/// serializes this snapshot directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniverseSnapshot {
    pub date: NaiveDate,
    pub core: Vec<String>,
    pub focus: BTreeMap<String, FocusEntry>,
}

impl UniverseSnapshot {
    /// A CORE-only snapshot, used when no prior state exists.
    pub fn bootstrap(date: NaiveDate) -> Self {
        Self {
            date,
            core: CORE_TICKERS.iter().map(|t| t.to_string()).collect(),
            focus: BTreeMap::new(),
        }
    }

    /// All active tickers (CORE ∪ FOCUS), sorted and deduplicated.
    pub fn active_tickers(&self) -> Vec<String> {
        let mut set: BTreeSet<String> = self.core.iter().cloned().collect();
        set.extend(self.focus.keys().cloned());
        set.into_iter().collect()
    }

    pub fn is_core(&self, ticker: &str) -> bool {
        self.core.iter().any(|t| t == ticker)
    }

    pub fn is_focus(&self, ticker: &str) -> bool {
        self.focus.contains_key(ticker)
    }
}

/// Today's stress signals for one ticker. NaN marks an unavailable signal;
/// an unavailable signal never fires.
#[derive(Debug, Clone, Copy)]
pub struct StressSignals {
    /// Percentile unusualness score (U_t).
    pub unusualness: f64,
    pub z_gex: f64,
    pub dark_share: f64,
    pub z_block: f64,
}

impl StressSignals {
    pub fn none() -> Self {
        Self {
            unusualness: f64::NAN,
            z_gex: f64::NAN,
            dark_share: f64::NAN,
            z_block: f64::NAN,
        }
    }

    /// Which stress conditions fire, as detail strings. Empty = no stress.
    pub fn firing(&self, thresholds: &StressThresholds) -> Vec<String> {
        let mut reasons = Vec::new();
        if self.unusualness >= thresholds.unusualness {
            reasons.push(format!("U={:.1}", self.unusualness));
        }
        if self.z_gex.abs() >= thresholds.z_gex_abs {
            reasons.push(format!("Z_GEX={:+.1}", self.z_gex));
        }
        if self.dark_share >= thresholds.dark_share {
            reasons.push(format!("DarkShare={:.0}%", self.dark_share * 100.0));
        }
        if self.z_block.abs() >= thresholds.z_block_abs {
            reasons.push(format!("Z_block={:+.1}", self.z_block));
        }
        reasons
    }
}

/// Owns FOCUS mutation for one finalize step.
///
/// Built from the prior snapshot, applied promotions/expiry/cap, then
/// consumed into the next snapshot — the single-writer discipline is
/// structural: nothing else can mutate a snapshot.
#[derive(Debug, Clone)]
pub struct UniverseManager {
    snapshot: UniverseSnapshot,
    stress: StressThresholds,
    focus_cap: usize,
    expiry_days: u32,
}

impl UniverseManager {
    pub fn new(snapshot: UniverseSnapshot, config: &EngineConfig) -> Self {
        Self {
            snapshot,
            stress: config.stress,
            focus_cap: config.focus_cap,
            expiry_days: config.expiry_days,
        }
    }

    pub fn snapshot(&self) -> &UniverseSnapshot {
        &self.snapshot
    }

    /// Finish the finalize step: stamp the date and release the snapshot.
    pub fn into_snapshot(mut self, date: NaiveDate) -> UniverseSnapshot {
        self.snapshot.date = date;
        self.snapshot
    }

    /// Promote a ticker on structural qualification (ETF top-N membership).
    ///
    /// Returns true if newly promoted. An existing entry has its inactivity
    /// counter reset and is upgraded to protected structural membership.
    pub fn promote_structural(
        &mut self,
        constituent: &IndexConstituent,
        entry_date: NaiveDate,
    ) -> bool {
        let ticker = constituent.ticker.clone();
        if self.snapshot.is_core(&ticker) {
            return false;
        }
        let detail = format!("rank {} in {}", constituent.rank, constituent.etf);
        match self.snapshot.focus.get_mut(&ticker) {
            Some(entry) => {
                entry.inactive_days = 0;
                entry.reason = FocusReason::Structural;
                entry.detail = detail;
                entry.protected = true;
                false
            }
            None => {
                self.snapshot.focus.insert(
                    ticker.clone(),
                    FocusEntry {
                        ticker,
                        reason: FocusReason::Structural,
                        detail,
                        entry_date,
                        inactive_days: 0,
                        protected: true,
                    },
                );
                true
            }
        }
    }

    /// Promote a ticker on stress. Returns true if newly promoted; an
    /// existing entry just has its counter reset. No signal firing → no-op.
    pub fn promote_stressed(
        &mut self,
        ticker: &str,
        signals: &StressSignals,
        entry_date: NaiveDate,
    ) -> bool {
        if self.snapshot.is_core(ticker) {
            return false;
        }
        let reasons = signals.firing(&self.stress);
        if reasons.is_empty() {
            return false;
        }
        match self.snapshot.focus.get_mut(ticker) {
            Some(entry) => {
                entry.inactive_days = 0;
                false
            }
            None => {
                self.snapshot.focus.insert(
                    ticker.to_string(),
                    FocusEntry {
                        ticker: ticker.to_string(),
                        reason: FocusReason::Stress,
                        detail: reasons.join(", "),
                        entry_date,
                        inactive_days: 0,
                        protected: false,
                    },
                );
                true
            }
        }
    }

    /// Promote a ticker on a calendar event. Returns true if newly promoted.
    pub fn promote_event(
        &mut self,
        ticker: &str,
        event: &CalendarEvent,
        entry_date: NaiveDate,
    ) -> bool {
        if self.snapshot.is_core(ticker) {
            return false;
        }
        match self.snapshot.focus.get_mut(ticker) {
            Some(entry) => {
                entry.inactive_days = 0;
                false
            }
            None => {
                self.snapshot.focus.insert(
                    ticker.to_string(),
                    FocusEntry {
                        ticker: ticker.to_string(),
                        reason: FocusReason::Event,
                        detail: event.description.clone(),
                        entry_date,
                        inactive_days: 0,
                        protected: false,
                    },
                );
                true
            }
        }
    }

    /// Reset the inactivity counter (an entry condition held today).
    pub fn mark_active(&mut self, ticker: &str) {
        if let Some(entry) = self.snapshot.focus.get_mut(ticker) {
            entry.inactive_days = 0;
        }
    }

    /// Increment the inactivity counter (no entry condition held today).
    pub fn increment_inactive(&mut self, ticker: &str) {
        if let Some(entry) = self.snapshot.focus.get_mut(ticker) {
            entry.inactive_days += 1;
        }
    }

    /// Drop protection from structural entries no longer in the current
    /// structural set. Once unprotected they follow the normal
    /// inactivity/expiry/eviction path.
    pub fn refresh_protection(&mut self, structural_tickers: &BTreeSet<String>) {
        for entry in self.snapshot.focus.values_mut() {
            if entry.reason == FocusReason::Structural {
                entry.protected = structural_tickers.contains(&entry.ticker);
            }
        }
    }

    /// Remove entries whose inactivity counter reached `expiry_days`.
    /// Protected entries are exempt. Returns removed tickers.
    pub fn expire_inactive(&mut self) -> Vec<String> {
        let expiry_days = self.expiry_days;
        let expired: Vec<String> = self
            .snapshot
            .focus
            .values()
            .filter(|e| !e.protected && e.inactive_days >= expiry_days)
            .map(|e| e.ticker.clone())
            .collect();
        for ticker in &expired {
            self.snapshot.focus.remove(ticker);
        }
        expired
    }

    /// Enforce the FOCUS cap.
    ///
    /// Non-protected entries are ranked by unusualness score descending,
    /// then |Z_GEX| descending, and the lowest-ranked are evicted until the
    /// cap holds. Protected entries are never evicted, even if protected
    /// membership alone exceeds the cap. Returns evicted tickers.
    pub fn enforce_focus_cap(
        &mut self,
        scores: &BTreeMap<String, f64>,
        z_gex_abs: &BTreeMap<String, f64>,
    ) -> Vec<String> {
        if self.snapshot.focus.len() <= self.focus_cap {
            return Vec::new();
        }

        let protected_count = self
            .snapshot
            .focus
            .values()
            .filter(|e| e.protected)
            .count();
        let open_slots = self.focus_cap.saturating_sub(protected_count);

        let mut evictable: Vec<String> = self
            .snapshot
            .focus
            .values()
            .filter(|e| !e.protected)
            .map(|e| e.ticker.clone())
            .collect();

        let key = |ticker: &str| {
            let score = scores.get(ticker).copied().unwrap_or(0.0);
            let gex = z_gex_abs.get(ticker).copied().unwrap_or(0.0);
            (
                if score.is_nan() { 0.0 } else { score },
                if gex.is_nan() { 0.0 } else { gex },
            )
        };
        evictable.sort_by(|a, b| {
            key(b)
                .partial_cmp(&key(a))
                .expect("NaN mapped to 0 before ranking")
                .then_with(|| a.cmp(b))
        });

        let evicted: Vec<String> = evictable.split_off(open_slots.min(evictable.len()));
        for ticker in &evicted {
            self.snapshot.focus.remove(ticker);
        }
        evicted
    }
}
