//! SQLite storage adapter.
//!
//! Dates are stored as `YYYY-MM-DD` text and timestamps as
//! `YYYY-MM-DD HH:MM:SS.fff` text so lexical order matches time order.

use crate::domain::cooldown::{EventType, SymbolEvent};
use crate::domain::engine::RunRecord;
use crate::domain::error::EngineError;
use crate::domain::ohlcv::PriceBar;
use crate::domain::order::Order;
use crate::domain::position::Position;
use crate::domain::regime::{KillSwitch, MarketState, RunStatistics};
use crate::domain::strategy::StrategySignal;
use crate::domain::universe::UniverseMember;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::MarketDataPort;
use crate::ports::ledger_port::LedgerPort;
use crate::ports::risk_port::RiskPort;
use crate::ports::EngineStore;
use chrono::{NaiveDate, NaiveDateTime};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};

const DATE_FMT: &str = "%Y-%m-%d";
const TS_FMT: &str = "%Y-%m-%d %H:%M:%S%.f";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS bars_daily (
    symbol TEXT NOT NULL,
    d TEXT NOT NULL,
    open REAL NOT NULL,
    high REAL NOT NULL,
    low REAL NOT NULL,
    close REAL NOT NULL,
    volume INTEGER NOT NULL,
    PRIMARY KEY (symbol, d)
);
CREATE INDEX IF NOT EXISTS idx_bars_daily_d ON bars_daily(d);

CREATE TABLE IF NOT EXISTS symbols (
    symbol TEXT PRIMARY KEY,
    sector TEXT,
    active INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS symbol_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol TEXT NOT NULL,
    d TEXT NOT NULL,
    event_type TEXT NOT NULL,
    detail TEXT
);
CREATE INDEX IF NOT EXISTS idx_symbol_events_lookup ON symbol_events(symbol, event_type, d);

CREATE TABLE IF NOT EXISTS positions (
    symbol TEXT PRIMARY KEY,
    qty INTEGER NOT NULL,
    avg_price REAL NOT NULL,
    sector TEXT
);

CREATE TABLE IF NOT EXISTS signals_daily (
    d TEXT NOT NULL,
    symbol TEXT NOT NULL,
    strategy TEXT NOT NULL,
    direction TEXT NOT NULL CHECK (direction IN ('buy', 'sell', 'hold')),
    strength REAL NOT NULL,
    PRIMARY KEY (d, symbol, strategy)
);

CREATE TABLE IF NOT EXISTS orders_eod (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    d TEXT NOT NULL,
    symbol TEXT NOT NULL,
    side TEXT NOT NULL,
    qty INTEGER NOT NULL,
    type TEXT NOT NULL,
    reason TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_orders_eod_d ON orders_eod(d);

CREATE TABLE IF NOT EXISTS market_state (
    d TEXT PRIMARY KEY,
    reference_close REAL,
    reference_ma REAL,
    gate INTEGER NOT NULL DEFAULT 0,
    total_candidates INTEGER NOT NULL DEFAULT 0,
    filtered_candidates INTEGER NOT NULL DEFAULT 0,
    pct_filtered REAL NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS system_state (
    d TEXT PRIMARY KEY,
    kill_switch INTEGER NOT NULL DEFAULT 0,
    reason TEXT
);

CREATE TABLE IF NOT EXISTS system_runs (
    d TEXT PRIMARY KEY,
    run_ts TEXT NOT NULL,
    status TEXT NOT NULL
);
";

fn pool_err(e: r2d2::Error) -> EngineError {
    EngineError::Database {
        reason: e.to_string(),
    }
}

fn query_err(e: rusqlite::Error) -> EngineError {
    EngineError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn conversion_err(
    column: usize,
    err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, err.into())
}

fn date_text(date: NaiveDate) -> String {
    date.format(DATE_FMT).to_string()
}

fn date_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let text: String = row.get(idx)?;
    NaiveDate::parse_from_str(&text, DATE_FMT).map_err(|e| conversion_err(idx, e))
}

fn timestamp_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let text: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&text, TS_FMT).map_err(|e| conversion_err(idx, e))
}

fn parsed_column<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    let text: String = row.get(idx)?;
    text.parse().map_err(|e: String| conversion_err(idx, e))
}

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, EngineError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| EngineError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = super::pool_size(config, "sqlite")?;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(pool_err)?;

        Ok(Self { pool })
    }

    /// Isolated database living as long as the adapter.
    pub fn in_memory() -> Result<Self, EngineError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(pool_err)?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, EngineError> {
        self.pool.get().map_err(pool_err)
    }

    pub fn initialize_schema(&self) -> Result<(), EngineError> {
        self.conn()?.execute_batch(SCHEMA).map_err(query_err)
    }

    pub fn insert_bars(&self, bars: &[PriceBar]) -> Result<(), EngineError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        for bar in bars {
            tx.execute(
                "INSERT OR REPLACE INTO bars_daily (symbol, d, open, high, low, close, volume)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    bar.symbol,
                    date_text(bar.date),
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.volume
                ],
            )
            .map_err(query_err)?;
        }

        tx.commit().map_err(query_err)
    }

    pub fn upsert_symbols(&self, members: &[UniverseMember], active: bool) -> Result<(), EngineError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        for member in members {
            tx.execute(
                "INSERT INTO symbols (symbol, sector, active) VALUES (?1, ?2, ?3)
                 ON CONFLICT(symbol) DO UPDATE SET sector = excluded.sector, active = excluded.active",
                params![member.symbol, member.sector, active],
            )
            .map_err(query_err)?;
        }

        tx.commit().map_err(query_err)
    }

    pub fn insert_event(&self, event: &SymbolEvent) -> Result<(), EngineError> {
        self.conn()?
            .execute(
                "INSERT INTO symbol_events (symbol, d, event_type, detail) VALUES (?1, ?2, ?3, ?4)",
                params![
                    event.symbol,
                    date_text(event.date),
                    event.event_type.as_str(),
                    event.detail
                ],
            )
            .map_err(query_err)?;
        Ok(())
    }

    pub fn upsert_position(&self, position: &Position) -> Result<(), EngineError> {
        self.conn()?
            .execute(
                "INSERT INTO positions (symbol, qty, avg_price, sector) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(symbol) DO UPDATE SET
                     qty = excluded.qty, avg_price = excluded.avg_price, sector = excluded.sector",
                params![
                    position.symbol,
                    position.quantity,
                    position.avg_price,
                    position.sector
                ],
            )
            .map_err(query_err)?;
        Ok(())
    }

    pub fn set_kill_switch(
        &self,
        date: NaiveDate,
        active: bool,
        reason: Option<&str>,
    ) -> Result<(), EngineError> {
        self.conn()?
            .execute(
                "INSERT INTO system_state (d, kill_switch, reason) VALUES (?1, ?2, ?3)
                 ON CONFLICT(d) DO UPDATE SET kill_switch = excluded.kill_switch, reason = excluded.reason",
                params![date_text(date), active, reason],
            )
            .map_err(query_err)?;
        Ok(())
    }
}

impl MarketDataPort for SqliteAdapter {
    fn latest_session(&self) -> Result<Option<NaiveDate>, EngineError> {
        let conn = self.conn()?;
        let latest: Option<String> = conn
            .query_row("SELECT MAX(d) FROM bars_daily", [], |row| row.get(0))
            .map_err(query_err)?;

        latest
            .map(|text| {
                NaiveDate::parse_from_str(&text, DATE_FMT).map_err(|e| EngineError::DatabaseQuery {
                    reason: format!("bad date '{text}' in bars_daily: {e}"),
                })
            })
            .transpose()
    }

    fn fetch_bars(
        &self,
        symbol: &str,
        end: NaiveDate,
        lookback: usize,
    ) -> Result<Vec<PriceBar>, EngineError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT symbol, d, open, high, low, close, volume
                 FROM bars_daily
                 WHERE symbol = ?1 AND d <= ?2
                 ORDER BY d DESC
                 LIMIT ?3",
            )
            .map_err(query_err)?;

        let limit = i64::try_from(lookback).unwrap_or(i64::MAX);
        let mut bars = stmt
            .query_map(params![symbol, date_text(end), limit], |row| {
                Ok(PriceBar {
                    symbol: row.get(0)?,
                    date: date_column(row, 1)?,
                    open: row.get(2)?,
                    high: row.get(3)?,
                    low: row.get(4)?,
                    close: row.get(5)?,
                    volume: row.get(6)?,
                })
            })
            .map_err(query_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(query_err)?;

        bars.reverse();
        Ok(bars)
    }

    fn list_universe(&self) -> Result<Vec<UniverseMember>, EngineError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT symbol, sector FROM symbols WHERE active = 1 ORDER BY symbol")
            .map_err(query_err)?;

        stmt.query_map([], |row| {
            Ok(UniverseMember {
                symbol: row.get(0)?,
                sector: row.get(1)?,
            })
        })
        .map_err(query_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(query_err)
    }
}

impl RiskPort for SqliteAdapter {
    fn has_event(
        &self,
        symbol: &str,
        event_type: EventType,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<bool, EngineError> {
        self.conn()?
            .query_row(
                "SELECT EXISTS (
                     SELECT 1 FROM symbol_events
                     WHERE symbol = ?1 AND event_type = ?2 AND d >= ?3 AND d < ?4
                 )",
                params![symbol, event_type.as_str(), date_text(start), date_text(end)],
                |row| row.get(0),
            )
            .map_err(query_err)
    }

    fn sector_exposure(&self, sector: &str) -> Result<f64, EngineError> {
        self.conn()?
            .query_row(
                "SELECT COALESCE(SUM(ABS(qty) * avg_price), 0.0)
                 FROM positions
                 WHERE COALESCE(sector, '') = ?1",
                params![sector],
                |row| row.get(0),
            )
            .map_err(query_err)
    }

    fn kill_switch(&self, date: NaiveDate) -> Result<Option<KillSwitch>, EngineError> {
        self.conn()?
            .query_row(
                "SELECT kill_switch, reason FROM system_state WHERE d = ?1",
                params![date_text(date)],
                |row| {
                    Ok(KillSwitch {
                        active: row.get(0)?,
                        reason: row.get(1)?,
                    })
                },
            )
            .optional()
            .map_err(query_err)
    }
}

impl LedgerPort for SqliteAdapter {
    fn upsert_signal(&self, signal: &StrategySignal) -> Result<(), EngineError> {
        self.conn()?
            .execute(
                "INSERT INTO signals_daily (d, symbol, strategy, direction, strength)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(d, symbol, strategy) DO UPDATE SET
                     direction = excluded.direction, strength = excluded.strength",
                params![
                    date_text(signal.date),
                    signal.symbol,
                    signal.strategy.code(),
                    signal.direction.as_str(),
                    signal.strength
                ],
            )
            .map_err(query_err)?;
        Ok(())
    }

    fn append_order(&self, order: &Order) -> Result<(), EngineError> {
        self.conn()?
            .execute(
                "INSERT INTO orders_eod (d, symbol, side, qty, type, reason, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    date_text(order.date),
                    order.symbol,
                    order.side.as_str(),
                    order.quantity,
                    order.order_type.as_str(),
                    order.reason,
                    order.created_at.format(TS_FMT).to_string()
                ],
            )
            .map_err(query_err)?;
        Ok(())
    }

    fn upsert_gate(
        &self,
        date: NaiveDate,
        reference_close: Option<f64>,
        reference_ma: Option<f64>,
        gate: bool,
    ) -> Result<(), EngineError> {
        self.conn()?
            .execute(
                "INSERT INTO market_state (d, reference_close, reference_ma, gate)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(d) DO UPDATE SET
                     reference_close = excluded.reference_close,
                     reference_ma = excluded.reference_ma,
                     gate = excluded.gate",
                params![date_text(date), reference_close, reference_ma, gate],
            )
            .map_err(query_err)?;
        Ok(())
    }

    fn update_statistics(
        &self,
        date: NaiveDate,
        stats: &RunStatistics,
    ) -> Result<(), EngineError> {
        self.conn()?
            .execute(
                "INSERT INTO market_state (d, total_candidates, filtered_candidates, pct_filtered)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(d) DO UPDATE SET
                     total_candidates = excluded.total_candidates,
                     filtered_candidates = excluded.filtered_candidates,
                     pct_filtered = excluded.pct_filtered",
                params![
                    date_text(date),
                    stats.total_candidates as i64,
                    stats.filtered_candidates as i64,
                    stats.pct_filtered()
                ],
            )
            .map_err(query_err)?;
        Ok(())
    }

    fn market_state(&self, date: NaiveDate) -> Result<Option<MarketState>, EngineError> {
        self.conn()?
            .query_row(
                "SELECT d, reference_close, reference_ma, gate,
                        total_candidates, filtered_candidates, pct_filtered
                 FROM market_state WHERE d = ?1",
                params![date_text(date)],
                |row| {
                    Ok(MarketState {
                        date: date_column(row, 0)?,
                        reference_close: row.get(1)?,
                        reference_ma: row.get(2)?,
                        gate: row.get(3)?,
                        total_candidates: row.get(4)?,
                        filtered_candidates: row.get(5)?,
                        pct_filtered: row.get(6)?,
                    })
                },
            )
            .optional()
            .map_err(query_err)
    }

    fn record_run(&self, record: &RunRecord) -> Result<(), EngineError> {
        self.conn()?
            .execute(
                "INSERT INTO system_runs (d, run_ts, status) VALUES (?1, ?2, ?3)
                 ON CONFLICT(d) DO UPDATE SET run_ts = excluded.run_ts, status = excluded.status",
                params![
                    date_text(record.trade_date),
                    record.run_timestamp.format(TS_FMT).to_string(),
                    record.status.as_str()
                ],
            )
            .map_err(query_err)?;
        Ok(())
    }

    fn run_record(&self, date: NaiveDate) -> Result<Option<RunRecord>, EngineError> {
        self.conn()?
            .query_row(
                "SELECT d, run_ts, status FROM system_runs WHERE d = ?1",
                params![date_text(date)],
                |row| {
                    Ok(RunRecord {
                        trade_date: date_column(row, 0)?,
                        run_timestamp: timestamp_column(row, 1)?,
                        status: parsed_column(row, 2)?,
                    })
                },
            )
            .optional()
            .map_err(query_err)
    }

    fn signals_for(&self, date: NaiveDate) -> Result<Vec<StrategySignal>, EngineError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT d, symbol, strategy, direction, strength
                 FROM signals_daily WHERE d = ?1
                 ORDER BY symbol, strategy",
            )
            .map_err(query_err)?;

        stmt.query_map(params![date_text(date)], |row| {
            Ok(StrategySignal {
                date: date_column(row, 0)?,
                symbol: row.get(1)?,
                strategy: parsed_column(row, 2)?,
                direction: parsed_column(row, 3)?,
                strength: row.get(4)?,
            })
        })
        .map_err(query_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(query_err)
    }

    fn orders_for(&self, date: NaiveDate) -> Result<Vec<Order>, EngineError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT d, symbol, side, qty, type, reason, created_at
                 FROM orders_eod WHERE d = ?1
                 ORDER BY id",
            )
            .map_err(query_err)?;

        stmt.query_map(params![date_text(date)], |row| {
            Ok(Order {
                date: date_column(row, 0)?,
                symbol: row.get(1)?,
                side: parsed_column(row, 2)?,
                quantity: row.get(3)?,
                order_type: parsed_column(row, 4)?,
                reason: row.get(5)?,
                created_at: timestamp_column(row, 6)?,
            })
        })
        .map_err(query_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(query_err)
    }
}

impl EngineStore for SqliteAdapter {
    fn initialize_schema(&self) -> Result<(), EngineError> {
        SqliteAdapter::initialize_schema(self)
    }

    fn as_data(&self) -> &dyn MarketDataPort {
        self
    }

    fn as_risk(&self) -> &dyn RiskPort {
        self
    }

    fn as_ledger(&self) -> &dyn LedgerPort {
        self
    }
}
