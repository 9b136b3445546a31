//! RegimeLab Runner — daily orchestration on top of `regimelab-core`.
//!
//! This crate provides:
//! - The feature feed abstraction (CSV-backed store, in-memory feed)
//! - The per-instrument diagnostic pipeline assembly
//! - The two-pass daily cycle with rayon fan-out and a finalize barrier
//! - Snapshot persistence (JSON per date) and diagnostic history (JSONL)
//! - Calendar and ETF-constituent config loading

pub mod calendar;
pub mod cycle;
pub mod feed;
pub mod processor;
pub mod store;

pub use calendar::{load_calendar, load_constituents, CalendarError};
pub use cycle::{run_daily_cycle, CycleError, CycleReport};
pub use feed::{CsvFeatureStore, FeatureFeed, FeedError, MemoryFeed};
pub use processor::{Processor, TickerDiagnostic};
pub use store::{DiagnosticHistory, SnapshotStore, StoreError};
