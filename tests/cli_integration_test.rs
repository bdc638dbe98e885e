//! CLI integration tests: subcommand dispatch against INI files and an
//! on-disk SQLite database.

#![cfg(feature = "sqlite")]

mod common;

use clap::Parser;
use common::*;
use eodtrader::adapters::file_config_adapter::FileConfigAdapter;
use eodtrader::adapters::sqlite_adapter::SqliteAdapter;
use eodtrader::cli::{self, Cli};
use eodtrader::domain::error::EngineError;
use eodtrader::domain::universe::UniverseMember;
use eodtrader::ports::ledger_port::LedgerPort;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const WINDOWS: &str = r#"
[market_filter]
sma_window = 5
symbol = SPY

[atr]
lookback = 5

[mean_reversion]
rsi_window = 5

[trend]
fast = 3
slow = 6
confirm_days = 2

[engine]
lookback_bars = 40
min_history = 10
"#;

struct Workspace {
    dir: TempDir,
    config: PathBuf,
}

impl Workspace {
    fn new(extra: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("eod.db");
        let config = dir.path().join("eod.ini");

        let mut file = std::fs::File::create(&config).unwrap();
        write!(file, "[sqlite]\npath = {}\n{WINDOWS}{extra}", db.display()).unwrap();
        file.flush().unwrap();

        Workspace { dir, config }
    }

    fn config_arg(&self) -> &str {
        self.config.to_str().unwrap()
    }

    fn store(&self) -> SqliteAdapter {
        let adapter = FileConfigAdapter::from_file(&self.config).unwrap();
        SqliteAdapter::from_config(&adapter).unwrap()
    }

    fn seed(&self) {
        let store = self.store();
        store.initialize_schema().unwrap();
        store.insert_bars(&bars_from_closes(REFERENCE, &rising(SERIES_LEN))).unwrap();
        store
            .insert_bars(&bars_from_closes("AAA", &rally_then_dip(SERIES_LEN)))
            .unwrap();
        store
            .insert_bars(&bars_from_closes("CCC", &falling(SERIES_LEN)))
            .unwrap();
        store
            .upsert_symbols(
                &[
                    UniverseMember::new("AAA", Some("Tech")),
                    UniverseMember::new("CCC", Some("Energy")),
                ],
                true,
            )
            .unwrap();
    }
}

fn execute(args: &[&str]) -> Result<(), EngineError> {
    let mut argv = vec!["eodtrader"];
    argv.extend_from_slice(args);
    cli::execute(Cli::try_parse_from(argv).unwrap())
}

mod commands {
    use super::*;

    #[test]
    fn init_db_creates_database_file() {
        let ws = Workspace::new("");
        execute(&["init-db", "-c", ws.config_arg()]).unwrap();

        assert!(ws.dir.path().join("eod.db").exists());
        assert!(ws.store().market_state(trade_date()).unwrap().is_none());
    }

    #[test]
    fn run_uses_latest_session() {
        let ws = Workspace::new("");
        ws.seed();

        execute(&["run", "-c", ws.config_arg()]).unwrap();

        let store = ws.store();
        assert_eq!(store.orders_for(trade_date()).unwrap().len(), 2);
        assert_eq!(store.signals_for(trade_date()).unwrap().len(), 4);
        let state = store.market_state(trade_date()).unwrap().unwrap();
        assert!(state.gate);
        assert_eq!(state.total_candidates, 2);
        assert!(store.run_record(trade_date()).unwrap().is_some());
    }

    #[test]
    fn run_with_explicit_date_and_signals_only() {
        let ws = Workspace::new("");
        ws.seed();
        let date = trade_date().format("%Y-%m-%d").to_string();

        execute(&["run", "-c", ws.config_arg(), "--date", date.as_str(), "--signals-only"]).unwrap();

        let store = ws.store();
        assert!(store.orders_for(trade_date()).unwrap().is_empty());
        assert_eq!(store.signals_for(trade_date()).unwrap().len(), 4);
    }

    #[test]
    fn run_on_empty_database_succeeds() {
        let ws = Workspace::new("");
        execute(&["run", "-c", ws.config_arg()]).unwrap();
        assert!(ws.store().run_record(trade_date()).unwrap().is_none());
    }

    #[test]
    fn status_after_run() {
        let ws = Workspace::new("");
        ws.seed();
        execute(&["run", "-c", ws.config_arg()]).unwrap();

        execute(&["status", "-c", ws.config_arg()]).unwrap();
        execute(&["status", "-c", ws.config_arg(), "-d", "2023-12-01"]).unwrap();
    }

    #[test]
    fn closed_gate_from_config_symbol() {
        let ws = Workspace::new("");
        ws.seed();
        // point the filter at a falling instrument
        let store = ws.store();
        store
            .insert_bars(&bars_from_closes("QQQ", &falling(SERIES_LEN)))
            .unwrap();
        let contents = std::fs::read_to_string(&ws.config)
            .unwrap()
            .replace("symbol = SPY", "symbol = QQQ");
        std::fs::write(&ws.config, contents).unwrap();

        execute(&["run", "-c", ws.config_arg()]).unwrap();

        let orders = store.orders_for(trade_date()).unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].symbol, "CCC");
        assert!(!store.market_state(trade_date()).unwrap().unwrap().gate);
    }
}

mod errors {
    use super::*;

    fn assert_exit_code(err: &EngineError, expected: std::process::ExitCode) {
        let code: std::process::ExitCode = err.into();
        // ExitCode has no PartialEq; compare the debug output
        assert_eq!(format!("{code:?}"), format!("{expected:?}"));
    }

    #[test]
    fn missing_config_file() {
        let missing = Path::new("/nonexistent/eod.ini");
        match execute(&["run", "-c", missing.to_str().unwrap()]) {
            Err(err @ EngineError::ConfigParse { .. }) => {
                assert_exit_code(&err, std::process::ExitCode::from(2))
            }
            other => panic!("expected ConfigParse, got {other:?}"),
        }
    }

    #[test]
    fn malformed_date() {
        let ws = Workspace::new("");
        match execute(&["run", "-c", ws.config_arg(), "--date", "31/01/2024"]) {
            Err(EngineError::InvalidDate { value }) => assert_eq!(value, "31/01/2024"),
            other => panic!("expected InvalidDate, got {other:?}"),
        }
    }

    #[test]
    fn invalid_window_is_rejected_before_touching_the_store() {
        let ws = Workspace::new("\n[confirmation]\nwindow = 2\nmin_count = 3\n");
        match execute(&["run", "-c", ws.config_arg()]) {
            Err(EngineError::ConfigInvalid { section, key, .. }) => {
                assert_eq!((section.as_str(), key.as_str()), ("confirmation", "min_count"));
            }
            other => panic!("expected ConfigInvalid, got {other:?}"),
        }
        assert!(!ws.dir.path().join("eod.db").exists());
    }

    #[test]
    fn missing_sqlite_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("eod.ini");
        let mut file = std::fs::File::create(&config).unwrap();
        file.write_all(WINDOWS.as_bytes()).unwrap();

        match execute(&["init-db", "-c", config.to_str().unwrap()]) {
            Err(err @ EngineError::ConfigMissing { .. }) => {
                assert_exit_code(&err, std::process::ExitCode::from(2))
            }
            other => panic!("expected ConfigMissing, got {other:?}"),
        }
    }
}
