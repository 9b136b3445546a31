//! The two-pass daily cycle.
//!
//! Pass 1 runs the full pipeline over CORE ∪ current FOCUS ∪ today's
//! structural and event qualifiers. Pass 2 sweeps the bounded scan universe
//! with the cheap feature subset and retroactively runs the full pipeline
//! for any name crossing a stress threshold. The finalize step is the only
//! place the universe snapshot is mutated, and it runs after both passes.
//!
//! Per-instrument work inside each pass is pure and fanned out over rayon;
//! the collect at the end of each pass is the ordering barrier — Pass 2
//! stress evaluation never sees a partial Pass-1 result set.

use chrono::NaiveDate;
use log::{debug, info};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use regimelab_core::universe::events::MACRO_VOLUME_LEADERS;
use regimelab_core::{
    dedup_constituents, event_qualifiers, CalendarEvent, ConfigError, EngineConfig, FocusReason,
    IndexConstituent, UniverseManager, UniverseSnapshot,
};

use crate::feed::FeatureFeed;
use crate::processor::{Processor, TickerDiagnostic};

/// Errors from cycle setup. The cycle itself is infallible per instrument —
/// missing data degrades to UND, never to an error.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Everything the cycle produced for one date.
#[derive(Debug)]
pub struct CycleReport {
    pub date: NaiveDate,
    /// Full diagnostics for every ticker that received the full pipeline
    /// today (Pass 1 plus retroactive Pass-2 promotions).
    pub diagnostics: BTreeMap<String, TickerDiagnostic>,
    /// The finalized universe, to be persisted as the next day's input.
    pub snapshot: UniverseSnapshot,
    pub promoted: Vec<(String, FocusReason)>,
    pub expired: Vec<String>,
    pub evicted: Vec<String>,
}

/// Run one complete daily cycle against a prior universe snapshot.
///
/// `prior` is read-only throughout; the returned snapshot is a new value.
pub fn run_daily_cycle(
    prior: &UniverseSnapshot,
    date: NaiveDate,
    feed: &dyn FeatureFeed,
    events: &[CalendarEvent],
    constituents: &[IndexConstituent],
    config: &EngineConfig,
) -> Result<CycleReport, CycleError> {
    let processor = Processor::new(config)?;

    // ── Pass 1: full pipeline over CORE ∪ FOCUS ∪ today's qualifiers ──
    let structural = dedup_constituents(constituents);
    let structural_tickers: BTreeSet<String> = structural.keys().cloned().collect();

    let leaders = feed.options_volume_leaders(MACRO_VOLUME_LEADERS);
    let event_map = event_qualifiers(events, date, &leaders);

    let mut pass1: BTreeSet<String> = prior.active_tickers().into_iter().collect();
    pass1.extend(structural_tickers.iter().cloned());
    pass1.extend(event_map.keys().cloned());

    info!(
        "pass 1: {} tickers ({} structural, {} event-qualified)",
        pass1.len(),
        structural.len(),
        event_map.len()
    );

    let pass1_tickers: Vec<String> = pass1.iter().cloned().collect();
    let mut diagnostics: BTreeMap<String, TickerDiagnostic> = pass1_tickers
        .par_iter()
        .map(|ticker| (ticker.clone(), processor.diagnose(feed, ticker, date)))
        .collect();

    // ── Pass 2: cheap scan, promote on stress, diagnose retroactively ──
    let scan_tickers: Vec<String> = feed
        .scan_universe()
        .into_iter()
        .filter(|t| !pass1.contains(t))
        .collect();

    let stressed_in_scan: Vec<String> = scan_tickers
        .par_iter()
        .filter(|ticker| {
            !processor
                .scan(feed, ticker, date)
                .firing(&config.stress)
                .is_empty()
        })
        .cloned()
        .collect();

    info!(
        "pass 2: scanned {} tickers, {} crossed stress thresholds",
        scan_tickers.len(),
        stressed_in_scan.len()
    );

    let retro: Vec<(String, TickerDiagnostic)> = stressed_in_scan
        .par_iter()
        .map(|ticker| (ticker.clone(), processor.diagnose(feed, ticker, date)))
        .collect();
    diagnostics.extend(retro);

    // ── Finalize: the single snapshot mutation ──
    let mut manager = UniverseManager::new(prior.clone(), config);
    let mut promoted: Vec<(String, FocusReason)> = Vec::new();
    let mut qualified_today: BTreeSet<String> = BTreeSet::new();

    for constituent in structural.values() {
        if manager.promote_structural(constituent, date) {
            promoted.push((constituent.ticker.clone(), FocusReason::Structural));
        }
        qualified_today.insert(constituent.ticker.clone());
    }

    for (ticker, event) in &event_map {
        if manager.promote_event(ticker, event, date) {
            promoted.push((ticker.clone(), FocusReason::Event));
        }
        qualified_today.insert(ticker.clone());
    }

    for (ticker, diag) in &diagnostics {
        if prior.is_core(ticker) {
            continue;
        }
        let signals = diag.stress_signals();
        if !signals.firing(&config.stress).is_empty() {
            if manager.promote_stressed(ticker, &signals, date) {
                promoted.push((ticker.clone(), FocusReason::Stress));
            }
            qualified_today.insert(ticker.clone());
        } else if manager.snapshot().is_focus(ticker) && !qualified_today.contains(ticker) {
            manager.increment_inactive(ticker);
        }
    }

    manager.refresh_protection(&structural_tickers);
    let expired = manager.expire_inactive();

    let mut scores = BTreeMap::new();
    let mut z_gex_abs = BTreeMap::new();
    for (ticker, diag) in &diagnostics {
        if manager.snapshot().is_focus(ticker) {
            scores.insert(ticker.clone(), diag.unusualness);
            z_gex_abs.insert(ticker.clone(), diag.stress_signals().z_gex.abs());
        }
    }
    let evicted = manager.enforce_focus_cap(&scores, &z_gex_abs);

    for (ticker, reason) in &promoted {
        debug!("promoted {ticker} ({})", reason.label());
    }
    if !expired.is_empty() {
        info!("expired {} tickers: {:?}", expired.len(), expired);
    }
    if !evicted.is_empty() {
        info!("evicted {} tickers at cap: {:?}", evicted.len(), evicted);
    }

    Ok(CycleReport {
        date,
        diagnostics,
        snapshot: manager.into_snapshot(date),
        promoted,
        expired,
        evicted,
    })
}
