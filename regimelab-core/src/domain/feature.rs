//! Feature — the diagnostic inputs and their per-instrument series.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A microstructure feature tracked per instrument.
///
/// The set is closed: every series, z-score, weight, and exclusion in the
/// engine is keyed by one of these ten features.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    DarkShare,
    Gex,
    Dex,
    VenueMix,
    BlockIntensity,
    IvSkew,
    Efficiency,
    Impact,
    Vanna,
    Charm,
}

impl Feature {
    /// All features, in canonical order.
    pub const ALL: [Feature; 10] = [
        Feature::DarkShare,
        Feature::Gex,
        Feature::Dex,
        Feature::VenueMix,
        Feature::BlockIntensity,
        Feature::IvSkew,
        Feature::Efficiency,
        Feature::Impact,
        Feature::Vanna,
        Feature::Charm,
    ];

    /// Canonical snake_case name (matches CSV column headers and weight keys).
    pub fn name(&self) -> &'static str {
        match self {
            Feature::DarkShare => "dark_share",
            Feature::Gex => "gex",
            Feature::Dex => "dex",
            Feature::VenueMix => "venue_mix",
            Feature::BlockIntensity => "block_intensity",
            Feature::IvSkew => "iv_skew",
            Feature::Efficiency => "efficiency",
            Feature::Impact => "impact",
            Feature::Vanna => "vanna",
            Feature::Charm => "charm",
        }
    }

    /// Parse a canonical name back into a feature.
    pub fn parse(name: &str) -> Option<Feature> {
        Feature::ALL.into_iter().find(|f| f.name() == name)
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered-by-date observations for one (instrument, feature) pair.
///
/// Series are never pooled across instruments — a `FeatureSeries` carries
/// exactly one ticker and there is no operation that merges two of them.
/// NaN marks a missing observation and is preserved, never imputed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSeries {
    pub ticker: String,
    pub feature: Feature,
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
}

impl FeatureSeries {
    /// Create an empty series.
    pub fn new(ticker: impl Into<String>, feature: Feature) -> Self {
        Self {
            ticker: ticker.into(),
            feature,
            dates: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Build a series from parallel date/value vectors, sorting by date.
    ///
    /// # Panics
    /// Panics if the vectors differ in length.
    pub fn from_parts(
        ticker: impl Into<String>,
        feature: Feature,
        dates: Vec<NaiveDate>,
        values: Vec<f64>,
    ) -> Self {
        assert_eq!(
            dates.len(),
            values.len(),
            "dates and values must be the same length"
        );
        let mut pairs: Vec<(NaiveDate, f64)> = dates.into_iter().zip(values).collect();
        pairs.sort_by_key(|(d, _)| *d);
        let (dates, values) = pairs.into_iter().unzip();
        Self {
            ticker: ticker.into(),
            feature,
            dates,
            values,
        }
    }

    /// Append an observation. Dates must arrive in strictly ascending order.
    ///
    /// # Panics
    /// Panics if `date` is not after the last stored date.
    pub fn push(&mut self, date: NaiveDate, value: f64) {
        if let Some(last) = self.dates.last() {
            assert!(date > *last, "out-of-order date {date} (last {last})");
        }
        self.dates.push(date);
        self.values.push(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Most recent observation, NaN if the series is empty.
    pub fn last_value(&self) -> f64 {
        self.values.last().copied().unwrap_or(f64::NAN)
    }

    /// Most recent date, if any.
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// Value on an exact date, if present.
    pub fn value_on(&self, date: NaiveDate) -> Option<f64> {
        self.dates
            .binary_search(&date)
            .ok()
            .map(|i| self.values[i])
    }

    /// Count of non-NaN observations.
    pub fn valid_count(&self) -> usize {
        self.values.iter().filter(|v| !v.is_nan()).count()
    }

    /// A copy truncated to observations on or before `as_of`.
    pub fn up_to(&self, as_of: NaiveDate) -> FeatureSeries {
        let cut = self.dates.partition_point(|d| *d <= as_of);
        Self {
            ticker: self.ticker.clone(),
            feature: self.feature,
            dates: self.dates[..cut].to_vec(),
            values: self.values[..cut].to_vec(),
        }
    }
}
