//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::config::EngineConfig;
use crate::domain::engine::{EodEngine, Ports, RunOptions, RunSummary};
use crate::domain::error::EngineError;
use crate::ports::config_port::ConfigPort;
use crate::ports::EngineStore;

#[derive(Parser, Debug)]
#[command(name = "eodtrader", about = "End-of-day signal and dry-run order engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Evaluate the universe for one trading date and record dry-run orders
    Run {
        #[arg(short, long)]
        config: PathBuf,
        /// Trading date (YYYY-MM-DD); defaults to the latest session in the store
        #[arg(short, long)]
        date: Option<String>,
        /// Record signals and statistics without appending orders
        #[arg(long)]
        signals_only: bool,
    },
    /// Create the database schema
    InitDb {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show the market state and run record for a date
    Status {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        date: Option<String>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn execute(cli: Cli) -> Result<(), EngineError> {
    match cli.command {
        Command::Run {
            config,
            date,
            signals_only,
        } => run_engine(&config, date.as_deref(), RunOptions { signals_only }),
        Command::InitDb { config } => run_init_db(&config),
        Command::Status { config, date } => run_status(&config, date.as_deref()),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, EngineError> {
    FileConfigAdapter::from_file(path)
}

pub fn parse_date(value: &str) -> Result<NaiveDate, EngineError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| EngineError::InvalidDate {
        value: value.to_string(),
    })
}

/// Open the configured store: PostgreSQL when built with the `postgres`
/// feature and `[postgres] connection_string` is set, otherwise SQLite.
pub fn open_store(config: &dyn ConfigPort) -> Result<Box<dyn EngineStore>, EngineError> {
    #[cfg(feature = "postgres")]
    {
        use crate::adapters::postgres_adapter::PostgresAdapter;

        if config.get_string("postgres", "connection_string").is_some() {
            return Ok(Box::new(PostgresAdapter::from_config(config)?));
        }
    }

    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::sqlite_adapter::SqliteAdapter;

        Ok(Box::new(SqliteAdapter::from_config(config)?))
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = config;
        Err(EngineError::ConfigMissing {
            section: "postgres".into(),
            key: "connection_string".into(),
        })
    }
}

/// Ensure the schema, resolve the trade date and run the engine.
/// Returns `None` when the store holds no bars and no date was given.
pub fn run_pipeline(
    store: &dyn EngineStore,
    config: &EngineConfig,
    date: Option<NaiveDate>,
    options: RunOptions,
) -> Result<Option<RunSummary>, EngineError> {
    store.initialize_schema()?;

    let engine = EodEngine::new(config, Ports::from_store(store), options);
    match engine.resolve_trade_date(date)? {
        Some(trade_date) => engine.run(trade_date).map(Some),
        None => {
            info!("no price data in store; nothing to evaluate");
            Ok(None)
        }
    }
}

fn run_engine(config_path: &PathBuf, date: Option<&str>, options: RunOptions) -> Result<(), EngineError> {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = load_config(config_path)?;
    let config = EngineConfig::from_config(&adapter)?;
    let date = date.map(parse_date).transpose()?;

    let store = open_store(&adapter)?;
    match run_pipeline(store.as_ref(), &config, date, options)? {
        Some(summary) => print_summary(&summary, options),
        None => eprintln!("No price data available; no action taken"),
    }
    Ok(())
}

fn run_init_db(config_path: &PathBuf) -> Result<(), EngineError> {
    let adapter = load_config(config_path)?;
    let store = open_store(&adapter)?;
    store.initialize_schema()?;
    eprintln!("Schema initialised");
    Ok(())
}

fn run_status(config_path: &PathBuf, date: Option<&str>) -> Result<(), EngineError> {
    let adapter = load_config(config_path)?;
    let store = open_store(&adapter)?;
    store.initialize_schema()?;

    let date = match date.map(parse_date).transpose()? {
        Some(d) => d,
        None => match store.latest_session()? {
            Some(d) => d,
            None => {
                eprintln!("No price data available");
                return Ok(());
            }
        },
    };

    println!("date: {date}");
    match store.market_state(date)? {
        Some(state) => {
            let fmt_price = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"));
            println!(
                "gate: {}",
                if state.gate { "open" } else { "closed" }
            );
            println!("reference close: {}", fmt_price(state.reference_close));
            println!("reference MA: {}", fmt_price(state.reference_ma));
            println!(
                "candidates: {} total, {} filtered ({:.1}%)",
                state.total_candidates, state.filtered_candidates, state.pct_filtered
            );
        }
        None => println!("market state: none"),
    }

    match store.run_record(date)? {
        Some(record) => println!(
            "last run: {} at {}",
            record.status.as_str(),
            record.run_timestamp.format("%Y-%m-%d %H:%M:%S")
        ),
        None => println!("last run: none"),
    }

    println!("signals: {}", store.signals_for(date)?.len());
    println!("orders: {}", store.orders_for(date)?.len());
    Ok(())
}

fn print_summary(summary: &RunSummary, options: RunOptions) {
    let stats = summary.statistics();
    eprintln!("\nTrade date: {}", summary.trade_date);
    eprintln!(
        "Market gate: {}{}",
        if summary.gate.gate_open { "open" } else { "closed" },
        if summary.gate.kill_switch { " (kill switch active)" } else { "" }
    );
    eprintln!("Candidates: {}", stats.total_candidates);
    eprintln!(
        "Filtered: {} ({:.1}%)",
        stats.filtered_candidates,
        stats.pct_filtered()
    );
    for (reason, count) in &summary.filter_counts {
        eprintln!("  {reason}: {count}");
    }
    eprintln!("Signals: {}", summary.signals_generated);
    if options.signals_only {
        eprintln!("Orders: none (signals only)");
    } else {
        eprintln!("Orders: {}", summary.orders_created);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_command() {
        let cli = Cli::try_parse_from([
            "eodtrader",
            "run",
            "--config",
            "eod.ini",
            "--date",
            "2024-06-03",
            "--signals-only",
        ])
        .unwrap();
        match cli.command {
            Command::Run {
                config,
                date,
                signals_only,
            } => {
                assert_eq!(config, PathBuf::from("eod.ini"));
                assert_eq!(date.as_deref(), Some("2024-06-03"));
                assert!(signals_only);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn run_requires_config() {
        assert!(Cli::try_parse_from(["eodtrader", "run"]).is_err());
    }

    #[test]
    fn parses_init_db_and_status() {
        let cli = Cli::try_parse_from(["eodtrader", "init-db", "-c", "eod.ini"]).unwrap();
        assert!(matches!(cli.command, Command::InitDb { .. }));
        let cli = Cli::try_parse_from(["eodtrader", "status", "-c", "eod.ini"]).unwrap();
        assert!(matches!(cli.command, Command::Status { date: None, .. }));
    }

    #[test]
    fn date_parsing() {
        assert_eq!(
            parse_date("2024-06-03").unwrap(),
            NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
        );
        match parse_date("06/03/2024") {
            Err(EngineError::InvalidDate { value }) => assert_eq!(value, "06/03/2024"),
            other => panic!("expected InvalidDate, got {other:?}"),
        }
    }
}
