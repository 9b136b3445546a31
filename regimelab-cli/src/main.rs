//! RegimeLab CLI — daily diagnostics and universe inspection.
//!
//! Commands:
//! - `diagnose` — run the two-pass daily cycle, persist snapshot + history
//! - `ticker` — ad-hoc single-instrument diagnostic (no universe mutation)
//! - `universe show` — print a persisted universe snapshot

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;

use regimelab_core::{EngineConfig, FocusReason, UniverseSnapshot};
use regimelab_runner::{
    load_calendar, load_constituents, run_daily_cycle, CsvFeatureStore, DiagnosticHistory,
    Processor, SnapshotStore,
};

#[derive(Parser)]
#[command(
    name = "regimelab",
    about = "RegimeLab CLI — market-maker regime diagnostics"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full two-pass daily cycle and persist the results.
    Diagnose {
        /// Diagnosis date (YYYY-MM-DD).
        #[arg(long)]
        date: String,

        /// Feature store directory (per-ticker CSVs + universe.toml).
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,

        /// Directory for universe snapshots.
        #[arg(long, default_value = "state")]
        snapshot_dir: PathBuf,

        /// Calendar events file (TOML). Optional.
        #[arg(long)]
        calendar: Option<PathBuf>,

        /// ETF constituents file (TOML). Optional.
        #[arg(long)]
        constituents: Option<PathBuf>,

        /// Diagnostic history file (JSONL).
        #[arg(long, default_value = "state/diagnostics.jsonl")]
        history: PathBuf,

        /// Print full text diagnostics instead of one-line summaries.
        #[arg(long, default_value_t = false)]
        full: bool,
    },
    /// Diagnose a single ticker ad hoc. Never mutates the universe.
    Ticker {
        /// Symbol to diagnose.
        symbol: String,

        /// Diagnosis date (YYYY-MM-DD).
        #[arg(long)]
        date: String,

        /// Feature store directory.
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
    },
    /// Universe snapshot inspection.
    Universe {
        #[command(subcommand)]
        command: UniverseCommands,
    },
}

#[derive(Subcommand)]
enum UniverseCommands {
    /// Print the persisted snapshot for a date.
    Show {
        /// Snapshot date (YYYY-MM-DD).
        #[arg(long)]
        date: String,

        /// Directory for universe snapshots.
        #[arg(long, default_value = "state")]
        snapshot_dir: PathBuf,
    },
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("invalid date '{value}', expected YYYY-MM-DD"))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Diagnose {
            date,
            data_dir,
            snapshot_dir,
            calendar,
            constituents,
            history,
            full,
        } => {
            let date = parse_date(&date)?;
            let config = EngineConfig::default();
            config.validate().context("engine configuration")?;

            let feed = CsvFeatureStore::open(&data_dir).context("open feature store")?;
            let events = match calendar {
                Some(path) => load_calendar(&path).context("load calendar")?,
                None => Vec::new(),
            };
            let constituents = match constituents {
                Some(path) => load_constituents(&path).context("load constituents")?,
                None => Vec::new(),
            };

            let store = SnapshotStore::new(&snapshot_dir);
            let prior = store
                .latest_before(date)
                .context("load prior snapshot")?
                .unwrap_or_else(|| {
                    info!("no prior snapshot — bootstrapping CORE-only universe");
                    UniverseSnapshot::bootstrap(date)
                });

            let report = run_daily_cycle(&prior, date, &feed, &events, &constituents, &config)
                .context("daily cycle")?;

            let diag_history = DiagnosticHistory::new(&history);
            for diag in report.diagnostics.values() {
                diag_history
                    .append(&diag.output)
                    .context("append diagnostic history")?;
                if full {
                    println!("{}\n", diag.output.render_text());
                } else {
                    println!("{}", diag.output.summary_line());
                }
            }

            println!(
                "\nFOCUS: {} tickers (cap {}), {} promoted, {} expired, {} evicted",
                report.snapshot.focus.len(),
                config.focus_cap,
                report.promoted.len(),
                report.expired.len(),
                report.evicted.len()
            );
            let path = store.save(&report.snapshot).context("save snapshot")?;
            info!("snapshot written to {}", path.display());
        }

        Commands::Ticker {
            symbol,
            date,
            data_dir,
        } => {
            let date = parse_date(&date)?;
            let feed = CsvFeatureStore::open(&data_dir).context("open feature store")?;
            let processor = Processor::new(&EngineConfig::default())?;
            let diag = processor.diagnose(&feed, &symbol, date);
            println!("{}", diag.output.render_text());
        }

        Commands::Universe { command } => match command {
            UniverseCommands::Show { date, snapshot_dir } => {
                let date = parse_date(&date)?;
                let snapshot = SnapshotStore::new(&snapshot_dir)
                    .load(date)
                    .context("load snapshot")?;

                println!("Universe @ {}", snapshot.date);
                println!("CORE:  {}", snapshot.core.join(", "));
                println!("FOCUS: {} tickers", snapshot.focus.len());
                for entry in snapshot.focus.values() {
                    let protected = if entry.protected { " [protected]" } else { "" };
                    let reason = match entry.reason {
                        FocusReason::Structural => "structural",
                        FocusReason::Stress => "stress",
                        FocusReason::Event => "event",
                    };
                    println!(
                        "  {:<6} {:<10} {} (since {}, inactive {}d){}",
                        entry.ticker,
                        reason,
                        entry.detail,
                        entry.entry_date,
                        entry.inactive_days,
                        protected
                    );
                }
            }
        },
    }

    Ok(())
}
