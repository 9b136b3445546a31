//! Property tests for engine invariants.
//!
//! Uses proptest to verify:
//! 1. Percentile scores stay in [0, 100] (or NaN)
//! 2. Contribution sums are bounded by the included weights × max |z|
//! 3. Excluding a feature never changes the other contributions
//! 4. Classification is referentially transparent
//! 5. Cap enforcement never exceeds the cap and never drops protected entries

use proptest::prelude::*;
use std::collections::BTreeMap;

use regimelab_core::universe::IndexConstituent;
use regimelab_core::{
    Classifier, EngineConfig, Feature, Scorer, StressSignals, UniverseManager, UniverseSnapshot,
};

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_z() -> impl Strategy<Value = f64> {
    prop_oneof![
        4 => -5.0..5.0_f64,
        1 => Just(f64::NAN),
    ]
}

fn arb_z_set() -> impl Strategy<Value = BTreeMap<Feature, f64>> {
    (arb_z(), arb_z(), arb_z(), arb_z(), arb_z()).prop_map(|(a, b, c, d, e)| {
        [
            (Feature::DarkShare, a),
            (Feature::Gex, b),
            (Feature::VenueMix, c),
            (Feature::BlockIntensity, d),
            (Feature::IvSkew, e),
        ]
        .into_iter()
        .collect()
    })
}

fn arb_raw_scores() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(
        prop_oneof![9 => 0.0..4.0_f64, 1 => Just(f64::NAN)],
        1..120,
    )
}

// ── 1. Percentile bounds ─────────────────────────────────────────────

proptest! {
    #[test]
    fn percentile_scores_bounded(raw in arb_raw_scores()) {
        let scorer = Scorer::new(63).unwrap();
        for p in scorer.compute_percentile_scores(&raw) {
            prop_assert!(p.is_nan() || (0.0..=100.0).contains(&p));
        }
    }

    // ── 2. Contribution bound ────────────────────────────────────────

    #[test]
    fn contributions_bounded_by_included_weights(z_set in arb_z_set()) {
        let scorer = Scorer::new(63).unwrap();
        let (raw, contributions) = scorer.compute_raw_score(&z_set, &[]);

        let max_abs_z = z_set
            .values()
            .filter(|z| !z.is_nan())
            .fold(0.0_f64, |acc, z| acc.max(z.abs()));
        let included_weight: f64 = contributions
            .keys()
            .map(|f| scorer.weights()[f])
            .sum();

        prop_assert!(raw <= included_weight * max_abs_z + 1e-9);
        prop_assert!(raw >= 0.0);
    }

    // ── 3. Exclusion isolation ───────────────────────────────────────

    #[test]
    fn exclusion_leaves_other_contributions_unchanged(z_set in arb_z_set()) {
        let scorer = Scorer::new(63).unwrap();
        let (_, baseline) = scorer.compute_raw_score(&z_set, &[]);
        let (_, without_gex) = scorer.compute_raw_score(&z_set, &[Feature::Gex]);

        prop_assert!(!without_gex.contains_key(&Feature::Gex));
        for (feature, contribution) in &without_gex {
            prop_assert_eq!(baseline[feature], *contribution);
        }
    }

    // ── 4. Referential transparency ──────────────────────────────────

    #[test]
    fn classify_is_deterministic(
        z_set in arb_z_set(),
        dark in 0.0..1.0_f64,
        ret in -0.05..0.05_f64,
        sufficient in any::<bool>(),
    ) {
        let raw: BTreeMap<Feature, f64> = [(Feature::DarkShare, dark)].into_iter().collect();
        let medians = BTreeMap::new();
        let classifier = Classifier::new();
        let a = classifier.classify(&z_set, &raw, &medians, ret, sufficient);
        let b = classifier.classify(&z_set, &raw, &medians, ret, sufficient);
        prop_assert_eq!(a.regime, b.regime);
        prop_assert_eq!(a.triggering_conditions, b.triggering_conditions);
        if !sufficient {
            prop_assert_eq!(a.regime, regimelab_core::Regime::Undetermined);
        }
    }

    // ── 5. Cap invariants ────────────────────────────────────────────

    #[test]
    fn cap_invariants(
        n_structural in 0..12_usize,
        n_stress in 0..50_usize,
        cap in 5..35_usize,
    ) {
        let date = chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let config = EngineConfig { focus_cap: cap, ..EngineConfig::default() };
        let mut manager = UniverseManager::new(UniverseSnapshot::bootstrap(date), &config);

        for i in 0..n_structural {
            manager.promote_structural(
                &IndexConstituent {
                    ticker: format!("S{i:02}"),
                    etf: "SPY".into(),
                    rank: i + 1,
                    weight_pct: 5.0,
                },
                date,
            );
        }
        let mut scores = BTreeMap::new();
        for i in 0..n_stress {
            let ticker = format!("T{i:02}");
            manager.promote_stressed(
                &ticker,
                &StressSignals { z_gex: 3.0, ..StressSignals::none() },
                date,
            );
            scores.insert(ticker, i as f64);
        }

        manager.enforce_focus_cap(&scores, &BTreeMap::new());
        let snapshot = manager.into_snapshot(date);

        // Cap holds unless protected membership alone exceeds it.
        prop_assert!(snapshot.focus.len() <= cap.max(n_structural));
        // Every structural entry survives.
        for i in 0..n_structural {
            let ticker = format!("S{:02}", i);
            prop_assert!(snapshot.is_focus(&ticker));
        }
    }
}
