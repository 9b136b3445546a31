//! Feature feed — how the runner obtains per-instrument series.
//!
//! The feed is the boundary with the excluded fetch/cache layer: it serves
//! pre-fetched local data only and never blocks on the network. A ticker
//! with no data yields empty series, which flow through the engine as
//! all-NaN → EMPTY baseline → UND regime. The feed never errors per ticker;
//! missing data is data.

use chrono::NaiveDate;
use log::warn;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use thiserror::Error;

use regimelab_core::{Feature, FeatureSeries};

/// Errors from opening or describing a feature store. Per-ticker data
/// problems are not errors — they degrade to NaN.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feature store directory not found: {0}")]
    MissingDirectory(PathBuf),

    #[error("failed to read universe file {path}: {reason}")]
    UniverseFile { path: PathBuf, reason: String },
}

/// Source of per-instrument feature series and daily returns.
///
/// Implementations must be `Sync`: the runner fans out per-ticker pipeline
/// calls across a rayon pool, all reading the same feed.
pub trait FeatureFeed: Sync {
    /// Observations for one (ticker, feature) up to and including `as_of`.
    /// Empty when the ticker or feature is unknown.
    fn series(&self, ticker: &str, feature: Feature, as_of: NaiveDate) -> FeatureSeries;

    /// Close-to-close return for the ticker on `date`, NaN when unknown.
    fn daily_return(&self, ticker: &str, date: NaiveDate) -> f64;

    /// The bounded Pass-2 scan universe (liquid names beyond CORE/FOCUS).
    fn scan_universe(&self) -> Vec<String>;

    /// Top-N tickers by options volume, for macro event qualification.
    fn options_volume_leaders(&self, n: usize) -> Vec<String>;
}

// ─── CSV-backed store ────────────────────────────────────────────────

/// Parsed contents of one per-ticker CSV file.
#[derive(Debug, Default)]
struct TickerTable {
    dates: Vec<NaiveDate>,
    features: BTreeMap<Feature, Vec<f64>>,
    daily_returns: Vec<f64>,
}

/// Scan-universe sidecar file (`universe.toml` in the store directory).
#[derive(Debug, serde::Deserialize)]
struct UniverseFile {
    #[serde(default)]
    scan: Vec<String>,
    #[serde(default)]
    options_volume_leaders: Vec<String>,
}

/// Directory of per-ticker CSV files plus a `universe.toml` sidecar.
///
/// Each `{TICKER}.csv` has a `date` column, one column per feature
/// (canonical snake_case names), and a `daily_return` column. Blank cells
/// are NaN. Files are parsed once and cached.
pub struct CsvFeatureStore {
    dir: PathBuf,
    scan: Vec<String>,
    leaders: Vec<String>,
    cache: RwLock<HashMap<String, Arc<TickerTable>>>,
}

impl CsvFeatureStore {
    /// Open a store directory. Fails only on a missing directory or an
    /// unreadable universe file; individual ticker files load lazily.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, FeedError> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(FeedError::MissingDirectory(dir));
        }

        let universe_path = dir.join("universe.toml");
        let (scan, leaders) = if universe_path.exists() {
            let content =
                fs::read_to_string(&universe_path).map_err(|e| FeedError::UniverseFile {
                    path: universe_path.clone(),
                    reason: e.to_string(),
                })?;
            let parsed: UniverseFile =
                toml::from_str(&content).map_err(|e| FeedError::UniverseFile {
                    path: universe_path,
                    reason: e.to_string(),
                })?;
            (parsed.scan, parsed.options_volume_leaders)
        } else {
            (Vec::new(), Vec::new())
        };

        Ok(Self {
            dir,
            scan,
            leaders,
            cache: RwLock::new(HashMap::new()),
        })
    }

    fn table(&self, ticker: &str) -> Arc<TickerTable> {
        if let Some(table) = self.cache.read().expect("feed cache poisoned").get(ticker) {
            return Arc::clone(table);
        }

        let path = self.dir.join(format!("{ticker}.csv"));
        let table = Arc::new(match parse_ticker_csv(&path) {
            Ok(table) => table,
            Err(reason) => {
                warn!("{ticker}: no usable feature data ({reason}) — treating as all-NaN");
                TickerTable::default()
            }
        });

        self.cache
            .write()
            .expect("feed cache poisoned")
            .insert(ticker.to_string(), Arc::clone(&table));
        table
    }
}

fn parse_ticker_csv(path: &Path) -> Result<TickerTable, String> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| e.to_string())?;

    let headers = reader.headers().map_err(|e| e.to_string())?.clone();
    let mut date_col = None;
    let mut return_col = None;
    let mut feature_cols: Vec<(usize, Feature)> = Vec::new();
    for (i, name) in headers.iter().enumerate() {
        match name {
            "date" => date_col = Some(i),
            "daily_return" => return_col = Some(i),
            other => {
                if let Some(feature) = Feature::parse(other) {
                    feature_cols.push((i, feature));
                }
            }
        }
    }
    let date_col = date_col.ok_or("missing 'date' column")?;

    let mut table = TickerTable::default();
    for &(_, feature) in &feature_cols {
        table.features.insert(feature, Vec::new());
    }

    for record in reader.records() {
        let record = record.map_err(|e| e.to_string())?;
        let Some(date_str) = record.get(date_col) else {
            continue;
        };
        let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
            .map_err(|e| format!("bad date '{date_str}': {e}"))?;
        table.dates.push(date);

        for &(col, feature) in &feature_cols {
            let value = record.get(col).map_or(f64::NAN, parse_cell);
            table.features.get_mut(&feature).expect("column registered").push(value);
        }
        table
            .daily_returns
            .push(return_col.and_then(|c| record.get(c)).map_or(f64::NAN, parse_cell));
    }

    Ok(table)
}

fn parse_cell(cell: &str) -> f64 {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return f64::NAN;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

impl FeatureFeed for CsvFeatureStore {
    fn series(&self, ticker: &str, feature: Feature, as_of: NaiveDate) -> FeatureSeries {
        let table = self.table(ticker);
        let Some(values) = table.features.get(&feature) else {
            return FeatureSeries::new(ticker, feature);
        };
        FeatureSeries::from_parts(ticker, feature, table.dates.clone(), values.clone())
            .up_to(as_of)
    }

    fn daily_return(&self, ticker: &str, date: NaiveDate) -> f64 {
        let table = self.table(ticker);
        table
            .dates
            .iter()
            .position(|d| *d == date)
            .map_or(f64::NAN, |i| table.daily_returns[i])
    }

    fn scan_universe(&self) -> Vec<String> {
        self.scan.clone()
    }

    fn options_volume_leaders(&self, n: usize) -> Vec<String> {
        self.leaders.iter().take(n).cloned().collect()
    }
}

// ─── In-memory feed (tests and ad-hoc assembly) ──────────────────────

/// Feed built directly from series in memory.
#[derive(Debug, Default)]
pub struct MemoryFeed {
    series: HashMap<(String, Feature), FeatureSeries>,
    returns: HashMap<(String, NaiveDate), f64>,
    scan: Vec<String>,
    leaders: Vec<String>,
}

impl MemoryFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_series(&mut self, series: FeatureSeries) {
        self.series
            .insert((series.ticker.clone(), series.feature), series);
    }

    pub fn set_daily_return(&mut self, ticker: &str, date: NaiveDate, value: f64) {
        self.returns.insert((ticker.to_string(), date), value);
    }

    pub fn set_scan_universe(&mut self, tickers: Vec<String>) {
        self.scan = tickers;
    }

    pub fn set_options_volume_leaders(&mut self, tickers: Vec<String>) {
        self.leaders = tickers;
    }
}

impl FeatureFeed for MemoryFeed {
    fn series(&self, ticker: &str, feature: Feature, as_of: NaiveDate) -> FeatureSeries {
        self.series
            .get(&(ticker.to_string(), feature))
            .map(|s| s.up_to(as_of))
            .unwrap_or_else(|| FeatureSeries::new(ticker, feature))
    }

    fn daily_return(&self, ticker: &str, date: NaiveDate) -> f64 {
        self.returns
            .get(&(ticker.to_string(), date))
            .copied()
            .unwrap_or(f64::NAN)
    }

    fn scan_universe(&self) -> Vec<String> {
        self.scan.clone()
    }

    fn options_volume_leaders(&self, n: usize) -> Vec<String> {
        self.leaders.iter().take(n).cloned().collect()
    }
}
