//! Integration tests for the two-pass daily cycle.
//!
//! Built on `MemoryFeed` with deterministic series: a repeating base
//! pattern around 0.40–0.49 whose final value is either the pattern mean
//! (quiet day, z ≈ 0) or a shock level that crosses a stress threshold.

use chrono::NaiveDate;

use regimelab_core::{
    CalendarEvent, EngineConfig, Feature, FeatureSeries, FocusReason, Regime, UniverseSnapshot,
};
use regimelab_runner::{run_daily_cycle, MemoryFeed, SnapshotStore};

fn date_at(offset: usize) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(offset as i64)
}

/// `n` days of pattern values with an explicit final value.
fn pattern(n: usize, last: f64) -> Vec<f64> {
    let mut values: Vec<f64> = (0..n - 1)
        .map(|i| 0.40 + ((i * 37) % 10) as f64 * 0.01)
        .collect();
    values.push(last);
    values
}

fn series(ticker: &str, feature: Feature, values: Vec<f64>) -> FeatureSeries {
    let dates = (0..values.len()).map(date_at).collect();
    FeatureSeries::from_parts(ticker, feature, dates, values)
}

/// Quiet ticker: final value at the pattern mean, so every z ≈ 0 and the
/// unusualness percentile stays low.
fn add_quiet_ticker(feed: &mut MemoryFeed, ticker: &str, n: usize) {
    for feature in Feature::ALL {
        feed.insert_series(series(ticker, feature, pattern(n, 0.445)));
    }
}

/// Stressed ticker: dark pool share at 0.70 on the final day (≥ 0.65
/// crosses the stress threshold on the raw value alone).
fn add_stressed_ticker(feed: &mut MemoryFeed, ticker: &str, n: usize) {
    for feature in Feature::ALL {
        let last = if feature == Feature::DarkShare { 0.70 } else { 0.445 };
        feed.insert_series(series(ticker, feature, pattern(n, last)));
    }
}

fn core_feed(n: usize) -> MemoryFeed {
    let mut feed = MemoryFeed::new();
    for ticker in ["SPY", "QQQ", "IWM", "DIA"] {
        add_quiet_ticker(&mut feed, ticker, n);
    }
    feed
}

#[test]
fn core_is_always_diagnosed() {
    let feed = core_feed(41);
    let prior = UniverseSnapshot::bootstrap(date_at(39));
    let report = run_daily_cycle(
        &prior,
        date_at(40),
        &feed,
        &[],
        &[],
        &EngineConfig::default(),
    )
    .unwrap();

    assert_eq!(report.diagnostics.len(), 4);
    for ticker in ["SPY", "QQQ", "IWM", "DIA"] {
        let diag = &report.diagnostics[ticker];
        assert_eq!(diag.output.ticker, ticker);
        assert!(diag.output.scoring.is_some());
    }
    assert!(report.snapshot.focus.is_empty());
    assert_eq!(report.snapshot.date, date_at(40));
}

#[test]
fn prior_snapshot_is_never_mutated() {
    let feed = core_feed(41);
    let prior = UniverseSnapshot::bootstrap(date_at(39));
    let before = prior.clone();
    run_daily_cycle(
        &prior,
        date_at(40),
        &feed,
        &[],
        &[],
        &EngineConfig::default(),
    )
    .unwrap();
    assert_eq!(prior, before);
}

#[test]
fn scan_stress_promotes_and_diagnoses_retroactively() {
    let mut feed = core_feed(41);
    add_stressed_ticker(&mut feed, "HOT", 41);
    add_quiet_ticker(&mut feed, "COLD", 41);
    feed.set_scan_universe(vec!["HOT".into(), "COLD".into()]);

    let prior = UniverseSnapshot::bootstrap(date_at(39));
    let report = run_daily_cycle(
        &prior,
        date_at(40),
        &feed,
        &[],
        &[],
        &EngineConfig::default(),
    )
    .unwrap();

    // HOT crossed a stress threshold in the Pass-2 scan: it gets a full
    // diagnostic for the same day and enters FOCUS.
    assert!(report.diagnostics.contains_key("HOT"));
    let entry = &report.snapshot.focus["HOT"];
    assert_eq!(entry.reason, FocusReason::Stress);
    assert!(entry.detail.contains("DarkShare"));
    assert!(report
        .promoted
        .contains(&("HOT".to_string(), FocusReason::Stress)));

    // COLD stayed un-promoted and un-diagnosed.
    assert!(!report.diagnostics.contains_key("COLD"));
    assert!(!report.snapshot.is_focus("COLD"));
}

#[test]
fn structural_constituents_enter_protected() {
    let mut feed = core_feed(41);
    add_quiet_ticker(&mut feed, "AAPL", 41);
    add_quiet_ticker(&mut feed, "MSFT", 41);

    let constituents = regimelab_core::top_constituents(
        "SPY",
        &[("AAPL".to_string(), 7.2), ("MSFT".to_string(), 6.8)],
    );
    let prior = UniverseSnapshot::bootstrap(date_at(39));
    let report = run_daily_cycle(
        &prior,
        date_at(40),
        &feed,
        &[],
        &constituents,
        &EngineConfig::default(),
    )
    .unwrap();

    for ticker in ["AAPL", "MSFT"] {
        let entry = &report.snapshot.focus[ticker];
        assert_eq!(entry.reason, FocusReason::Structural);
        assert!(entry.protected);
        // Structural members receive the full pipeline in Pass 1.
        assert!(report.diagnostics.contains_key(ticker));
    }
}

#[test]
fn earnings_event_qualifies_ticker() {
    let mut feed = core_feed(41);
    add_quiet_ticker(&mut feed, "NVDA", 41);
    let events = vec![CalendarEvent::earnings("NVDA", date_at(41))]; // tomorrow

    let prior = UniverseSnapshot::bootstrap(date_at(39));
    let report = run_daily_cycle(
        &prior,
        date_at(40),
        &feed,
        &events,
        &[],
        &EngineConfig::default(),
    )
    .unwrap();

    let entry = &report.snapshot.focus["NVDA"];
    assert_eq!(entry.reason, FocusReason::Event);
    assert!(!entry.protected);
    assert!(report.diagnostics.contains_key("NVDA"));
}

#[test]
fn macro_event_qualifies_volume_leaders() {
    let mut feed = core_feed(41);
    add_quiet_ticker(&mut feed, "TSLA", 41);
    feed.set_options_volume_leaders(vec!["TSLA".into(), "SPY".into()]);
    let events = vec![CalendarEvent::macro_release("CPI", date_at(40))];

    let prior = UniverseSnapshot::bootstrap(date_at(39));
    let report = run_daily_cycle(
        &prior,
        date_at(40),
        &feed,
        &events,
        &[],
        &EngineConfig::default(),
    )
    .unwrap();

    // TSLA qualifies; SPY is CORE and never enters FOCUS.
    assert_eq!(report.snapshot.focus["TSLA"].reason, FocusReason::Event);
    assert!(!report.snapshot.is_focus("SPY"));
}

#[test]
fn stress_entry_expires_after_three_quiet_days() {
    // 45 days of data: day 40 is the stress day, days 41–44 are quiet.
    let mut feed = core_feed(45);
    for feature in Feature::ALL {
        let mut values = pattern(41, if feature == Feature::DarkShare { 0.70 } else { 0.445 });
        values.extend([0.445; 4]);
        feed.insert_series(series("FADE", feature, values));
    }
    feed.set_scan_universe(vec!["FADE".into()]);

    let config = EngineConfig::default();
    let mut snapshot = UniverseSnapshot::bootstrap(date_at(39));

    // Day 40: promoted on stress.
    let report = run_daily_cycle(&snapshot, date_at(40), &feed, &[], &[], &config).unwrap();
    snapshot = report.snapshot;
    assert!(snapshot.is_focus("FADE"));

    // Days 41–43: no entry condition true — the counter climbs to 3 and
    // the entry expires on the third quiet evaluation.
    for (offset, expect_member) in [(41, true), (42, true), (43, false)] {
        let report = run_daily_cycle(&snapshot, date_at(offset), &feed, &[], &[], &config).unwrap();
        snapshot = report.snapshot;
        assert_eq!(
            snapshot.is_focus("FADE"),
            expect_member,
            "day {offset}: unexpected membership"
        );
        if !expect_member {
            assert_eq!(report.expired, vec!["FADE".to_string()]);
        }
    }
}

#[test]
fn missing_data_ticker_does_not_poison_cycle() {
    let feed = core_feed(41);
    // GHOST is in FOCUS from a prior day but has no data at all.
    let mut prior = UniverseSnapshot::bootstrap(date_at(39));
    prior.focus.insert(
        "GHOST".to_string(),
        regimelab_core::FocusEntry {
            ticker: "GHOST".to_string(),
            reason: FocusReason::Stress,
            detail: "Z_GEX=+2.4".to_string(),
            entry_date: date_at(38),
            inactive_days: 0,
            protected: false,
        },
    );

    let report = run_daily_cycle(
        &prior,
        date_at(40),
        &feed,
        &[],
        &[],
        &EngineConfig::default(),
    )
    .unwrap();

    // The cycle completed, GHOST is UND with an EMPTY baseline, and the
    // other four diagnostics are unaffected.
    assert_eq!(report.diagnostics.len(), 5);
    let ghost = &report.diagnostics["GHOST"];
    assert_eq!(ghost.output.regime.regime, Regime::Undetermined);
    assert!(ghost.output.scoring.is_none());
    // No data → no entry condition → inactivity counter advanced.
    assert_eq!(report.snapshot.focus["GHOST"].inactive_days, 1);
}

#[test]
fn snapshot_roundtrips_through_store() {
    let mut feed = core_feed(41);
    add_stressed_ticker(&mut feed, "HOT", 41);
    feed.set_scan_universe(vec!["HOT".into()]);

    let prior = UniverseSnapshot::bootstrap(date_at(39));
    let report = run_daily_cycle(
        &prior,
        date_at(40),
        &feed,
        &[],
        &[],
        &EngineConfig::default(),
    )
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path());
    store.save(&report.snapshot).unwrap();
    let resumed = store.latest_before(date_at(41)).unwrap().unwrap();
    assert_eq!(resumed, report.snapshot);
    assert!(resumed.is_focus("HOT"));
}
