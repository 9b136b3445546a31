//! Calendar and constituent configuration files.
//!
//! Both are TOML, loaded fail-fast: a malformed file or an unparseable date
//! is a startup error, never a silent default. Dates are quoted
//! `"YYYY-MM-DD"` strings.
//!
//! ```toml
//! # calendar.toml
//! [[earnings]]
//! ticker = "NVDA"
//! date = "2024-02-21"
//!
//! [[rebalance]]
//! ticker = "SMCI"
//! date = "2024-03-18"
//!
//! [[macro_events]]
//! label = "CPI"
//! date = "2024-02-13"
//! ```
//!
//! ```toml
//! # constituents.toml
//! [[etfs]]
//! symbol = "SPY"
//! holdings = [{ ticker = "AAPL", weight = 7.2 }, { ticker = "MSFT", weight = 6.8 }]
//! ```

use chrono::NaiveDate;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use regimelab_core::{top_constituents, CalendarEvent, IndexConstituent};

#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("bad date '{value}' in {path}: expected YYYY-MM-DD")]
    BadDate { path: PathBuf, value: String },
}

#[derive(Debug, Deserialize)]
struct RawTickerEvent {
    ticker: String,
    date: String,
}

#[derive(Debug, Deserialize)]
struct RawMacroEvent {
    label: String,
    date: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawCalendar {
    #[serde(default)]
    earnings: Vec<RawTickerEvent>,
    #[serde(default)]
    rebalance: Vec<RawTickerEvent>,
    #[serde(default)]
    macro_events: Vec<RawMacroEvent>,
}

fn parse_date(path: &Path, value: &str) -> Result<NaiveDate, CalendarError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| CalendarError::BadDate {
        path: path.to_path_buf(),
        value: value.to_string(),
    })
}

/// Load all calendar events from a TOML file.
pub fn load_calendar(path: impl AsRef<Path>) -> Result<Vec<CalendarEvent>, CalendarError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| CalendarError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    let raw: RawCalendar = toml::from_str(&content).map_err(|e| CalendarError::Parse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut events = Vec::new();
    for entry in raw.earnings {
        events.push(CalendarEvent::earnings(
            entry.ticker,
            parse_date(path, &entry.date)?,
        ));
    }
    for entry in raw.rebalance {
        events.push(CalendarEvent::rebalance(
            entry.ticker,
            parse_date(path, &entry.date)?,
        ));
    }
    for entry in raw.macro_events {
        events.push(CalendarEvent::macro_release(
            &entry.label,
            parse_date(path, &entry.date)?,
        ));
    }
    Ok(events)
}

#[derive(Debug, Deserialize)]
struct RawHolding {
    ticker: String,
    weight: f64,
}

#[derive(Debug, Deserialize)]
struct RawEtf {
    symbol: String,
    #[serde(default)]
    holdings: Vec<RawHolding>,
}

#[derive(Debug, Default, Deserialize)]
struct RawConstituents {
    #[serde(default)]
    etfs: Vec<RawEtf>,
}

/// Load ETF holdings and reduce them to ranked top-N structural
/// constituents per ETF (untracked ETFs contribute nothing).
pub fn load_constituents(path: impl AsRef<Path>) -> Result<Vec<IndexConstituent>, CalendarError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| CalendarError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    let raw: RawConstituents = toml::from_str(&content).map_err(|e| CalendarError::Parse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut out = Vec::new();
    for etf in raw.etfs {
        let holdings: Vec<(String, f64)> = etf
            .holdings
            .into_iter()
            .map(|h| (h.ticker, h.weight))
            .collect();
        out.extend(top_constituents(&etf.symbol, &holdings));
    }
    Ok(out)
}
