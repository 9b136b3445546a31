//! Event qualification — earnings, rebalancing, and macro calendar.
//!
//! A ticker qualifies for FOCUS when an earnings or rebalancing event falls
//! within ±1 day of the diagnosis date, or on a macro event day (CPI, FOMC,
//! NFP) when the ticker ranks in the top-20 by options volume.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Number of tickers qualified by a macro event day.
pub const MACRO_VOLUME_LEADERS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Earnings,
    Rebalance,
    Macro,
}

/// A calendar event that may qualify tickers for FOCUS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub kind: EventKind,
    pub date: NaiveDate,
    /// None for macro events, which have no single ticker.
    pub ticker: Option<String>,
    pub description: String,
}

impl CalendarEvent {
    pub fn earnings(ticker: impl Into<String>, date: NaiveDate) -> Self {
        let ticker = ticker.into();
        Self {
            kind: EventKind::Earnings,
            date,
            description: format!("{ticker} earnings on {date}"),
            ticker: Some(ticker),
        }
    }

    pub fn rebalance(ticker: impl Into<String>, date: NaiveDate) -> Self {
        let ticker = ticker.into();
        Self {
            kind: EventKind::Rebalance,
            date,
            description: format!("{ticker} index rebalance on {date}"),
            ticker: Some(ticker),
        }
    }

    pub fn macro_release(label: &str, date: NaiveDate) -> Self {
        Self {
            kind: EventKind::Macro,
            date,
            ticker: None,
            description: format!("{label} on {date}"),
        }
    }
}

/// True iff `event_date` is within ±`window_days` of `target`.
pub fn within_window(target: NaiveDate, event_date: NaiveDate, window_days: i64) -> bool {
    (event_date - target).num_days().abs() <= window_days
}

/// Tickers qualified by events near `date`, with the qualifying event.
///
/// Ticker events (earnings, rebalance) qualify their own ticker. Macro
/// events qualify the current options-volume leaders; the first qualifying
/// event per ticker wins.
pub fn event_qualifiers(
    events: &[CalendarEvent],
    date: NaiveDate,
    volume_leaders: &[String],
) -> BTreeMap<String, CalendarEvent> {
    let mut qualified = BTreeMap::new();

    for event in events {
        if !within_window(date, event.date, 1) {
            continue;
        }
        match &event.ticker {
            Some(ticker) => {
                qualified.entry(ticker.clone()).or_insert_with(|| event.clone());
            }
            None => {
                for ticker in volume_leaders.iter().take(MACRO_VOLUME_LEADERS) {
                    qualified
                        .entry(ticker.clone())
                        .or_insert_with(|| event.clone());
                }
            }
        }
    }

    qualified
}
