//! PostgreSQL storage adapter.

use crate::domain::cooldown::EventType;
use crate::domain::engine::RunRecord;
use crate::domain::error::EngineError;
use crate::domain::ohlcv::PriceBar;
use crate::domain::order::Order;
use crate::domain::regime::{KillSwitch, MarketState, RunStatistics};
use crate::domain::strategy::StrategySignal;
use crate::domain::universe::UniverseMember;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::MarketDataPort;
use crate::ports::ledger_port::LedgerPort;
use crate::ports::risk_port::RiskPort;
use crate::ports::EngineStore;
use chrono::NaiveDate;
use postgres::types::ToSql;
use postgres::{NoTls, Row};
use r2d2::{Pool, PooledConnection};
use r2d2_postgres::PostgresConnectionManager;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS bars_daily (
    symbol TEXT NOT NULL,
    d DATE NOT NULL,
    open DOUBLE PRECISION NOT NULL,
    high DOUBLE PRECISION NOT NULL,
    low DOUBLE PRECISION NOT NULL,
    close DOUBLE PRECISION NOT NULL,
    volume BIGINT NOT NULL,
    PRIMARY KEY (symbol, d)
);
CREATE INDEX IF NOT EXISTS idx_bars_daily_d ON bars_daily(d);

CREATE TABLE IF NOT EXISTS symbols (
    symbol TEXT PRIMARY KEY,
    sector TEXT,
    active BOOLEAN NOT NULL DEFAULT TRUE
);

CREATE TABLE IF NOT EXISTS symbol_events (
    id BIGSERIAL PRIMARY KEY,
    symbol TEXT NOT NULL,
    d DATE NOT NULL,
    event_type TEXT NOT NULL,
    detail TEXT
);
CREATE INDEX IF NOT EXISTS idx_symbol_events_lookup ON symbol_events(symbol, event_type, d);

CREATE TABLE IF NOT EXISTS positions (
    symbol TEXT PRIMARY KEY,
    qty BIGINT NOT NULL,
    avg_price DOUBLE PRECISION NOT NULL,
    sector TEXT
);

CREATE TABLE IF NOT EXISTS signals_daily (
    d DATE NOT NULL,
    symbol TEXT NOT NULL,
    strategy TEXT NOT NULL,
    direction TEXT NOT NULL CHECK (direction IN ('buy', 'sell', 'hold')),
    strength DOUBLE PRECISION NOT NULL,
    PRIMARY KEY (d, symbol, strategy)
);

CREATE TABLE IF NOT EXISTS orders_eod (
    id BIGSERIAL PRIMARY KEY,
    d DATE NOT NULL,
    symbol TEXT NOT NULL,
    side TEXT NOT NULL,
    qty BIGINT NOT NULL,
    type TEXT NOT NULL,
    reason TEXT NOT NULL,
    created_at TIMESTAMP NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_orders_eod_d ON orders_eod(d);

CREATE TABLE IF NOT EXISTS market_state (
    d DATE PRIMARY KEY,
    reference_close DOUBLE PRECISION,
    reference_ma DOUBLE PRECISION,
    gate BOOLEAN NOT NULL DEFAULT FALSE,
    total_candidates BIGINT NOT NULL DEFAULT 0,
    filtered_candidates BIGINT NOT NULL DEFAULT 0,
    pct_filtered DOUBLE PRECISION NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS system_state (
    d DATE PRIMARY KEY,
    kill_switch BOOLEAN NOT NULL DEFAULT FALSE,
    reason TEXT
);

CREATE TABLE IF NOT EXISTS system_runs (
    d DATE PRIMARY KEY,
    run_ts TIMESTAMP NOT NULL,
    status TEXT NOT NULL
);
";

fn query_err(e: postgres::Error) -> EngineError {
    EngineError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn parse_text<T>(row: &Row, idx: usize) -> Result<T, EngineError>
where
    T: std::str::FromStr<Err = String>,
{
    let text: String = row.get(idx);
    text.parse()
        .map_err(|reason| EngineError::DatabaseQuery { reason })
}

pub struct PostgresAdapter {
    pool: Pool<PostgresConnectionManager<NoTls>>,
}

impl PostgresAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, EngineError> {
        let connection_string = config
            .get_string("postgres", "connection_string")
            .ok_or_else(|| EngineError::ConfigMissing {
                section: "postgres".into(),
                key: "connection_string".into(),
            })?;

        let pg_config = connection_string
            .parse::<postgres::Config>()
            .map_err(|e| EngineError::invalid("postgres", "connection_string", e.to_string()))?;

        let pool_size = super::pool_size(config, "postgres")?;
        let manager = PostgresConnectionManager::new(pg_config, NoTls);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(|e: r2d2::Error| EngineError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<PostgresConnectionManager<NoTls>>, EngineError> {
        self.pool.get().map_err(|e: r2d2::Error| EngineError::Database {
            reason: e.to_string(),
        })
    }

    fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> Result<(), EngineError> {
        self.conn()?.execute(sql, params).map_err(query_err)?;
        Ok(())
    }

    fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> Result<Vec<Row>, EngineError> {
        self.conn()?.query(sql, params).map_err(query_err)
    }

    fn query_opt(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Option<Row>, EngineError> {
        self.conn()?.query_opt(sql, params).map_err(query_err)
    }
}

impl MarketDataPort for PostgresAdapter {
    fn latest_session(&self) -> Result<Option<NaiveDate>, EngineError> {
        let rows = self.query("SELECT MAX(d) FROM bars_daily", &[])?;
        Ok(rows.first().and_then(|row| row.get(0)))
    }

    fn fetch_bars(
        &self,
        symbol: &str,
        end: NaiveDate,
        lookback: usize,
    ) -> Result<Vec<PriceBar>, EngineError> {
        let limit = i64::try_from(lookback).unwrap_or(i64::MAX);
        let rows = self.query(
            "SELECT symbol, d, open, high, low, close, volume
             FROM bars_daily
             WHERE symbol = $1 AND d <= $2
             ORDER BY d DESC
             LIMIT $3",
            &[&symbol, &end, &limit],
        )?;

        Ok(rows
            .iter()
            .rev()
            .map(|row| PriceBar {
                symbol: row.get(0),
                date: row.get(1),
                open: row.get(2),
                high: row.get(3),
                low: row.get(4),
                close: row.get(5),
                volume: row.get(6),
            })
            .collect())
    }

    fn list_universe(&self) -> Result<Vec<UniverseMember>, EngineError> {
        let rows = self.query(
            "SELECT symbol, sector FROM symbols WHERE active ORDER BY symbol",
            &[],
        )?;
        Ok(rows
            .iter()
            .map(|row| UniverseMember {
                symbol: row.get(0),
                sector: row.get(1),
            })
            .collect())
    }
}

impl RiskPort for PostgresAdapter {
    fn has_event(
        &self,
        symbol: &str,
        event_type: EventType,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<bool, EngineError> {
        let rows = self.query(
            "SELECT EXISTS (
                 SELECT 1 FROM symbol_events
                 WHERE symbol = $1 AND event_type = $2 AND d >= $3 AND d < $4
             )",
            &[&symbol, &event_type.as_str(), &start, &end],
        )?;
        Ok(rows.first().map(|row| row.get(0)).unwrap_or(false))
    }

    fn sector_exposure(&self, sector: &str) -> Result<f64, EngineError> {
        let rows = self.query(
            "SELECT COALESCE(SUM(ABS(qty) * avg_price), 0)::double precision
             FROM positions
             WHERE COALESCE(sector, '') = $1",
            &[&sector],
        )?;
        Ok(rows.first().map(|row| row.get(0)).unwrap_or(0.0))
    }

    fn kill_switch(&self, date: NaiveDate) -> Result<Option<KillSwitch>, EngineError> {
        let row = self.query_opt(
            "SELECT kill_switch, reason FROM system_state WHERE d = $1",
            &[&date],
        )?;
        Ok(row.map(|row| KillSwitch {
            active: row.get(0),
            reason: row.get(1),
        }))
    }
}

impl LedgerPort for PostgresAdapter {
    fn upsert_signal(&self, signal: &StrategySignal) -> Result<(), EngineError> {
        self.execute(
            "INSERT INTO signals_daily (d, symbol, strategy, direction, strength)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (d, symbol, strategy) DO UPDATE SET
                 direction = EXCLUDED.direction, strength = EXCLUDED.strength",
            &[
                &signal.date,
                &signal.symbol,
                &signal.strategy.code(),
                &signal.direction.as_str(),
                &signal.strength,
            ],
        )
    }

    fn append_order(&self, order: &Order) -> Result<(), EngineError> {
        self.execute(
            "INSERT INTO orders_eod (d, symbol, side, qty, type, reason, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
            &[
                &order.date,
                &order.symbol,
                &order.side.as_str(),
                &order.quantity,
                &order.order_type.as_str(),
                &order.reason,
                &order.created_at,
            ],
        )
    }

    fn upsert_gate(
        &self,
        date: NaiveDate,
        reference_close: Option<f64>,
        reference_ma: Option<f64>,
        gate: bool,
    ) -> Result<(), EngineError> {
        self.execute(
            "INSERT INTO market_state (d, reference_close, reference_ma, gate)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (d) DO UPDATE SET
                 reference_close = EXCLUDED.reference_close,
                 reference_ma = EXCLUDED.reference_ma,
                 gate = EXCLUDED.gate",
            &[&date, &reference_close, &reference_ma, &gate],
        )
    }

    fn update_statistics(
        &self,
        date: NaiveDate,
        stats: &RunStatistics,
    ) -> Result<(), EngineError> {
        let total = stats.total_candidates as i64;
        let filtered = stats.filtered_candidates as i64;
        self.execute(
            "INSERT INTO market_state (d, total_candidates, filtered_candidates, pct_filtered)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (d) DO UPDATE SET
                 total_candidates = EXCLUDED.total_candidates,
                 filtered_candidates = EXCLUDED.filtered_candidates,
                 pct_filtered = EXCLUDED.pct_filtered",
            &[&date, &total, &filtered, &stats.pct_filtered()],
        )
    }

    fn market_state(&self, date: NaiveDate) -> Result<Option<MarketState>, EngineError> {
        let row = self.query_opt(
            "SELECT d, reference_close, reference_ma, gate,
                    total_candidates, filtered_candidates, pct_filtered
             FROM market_state WHERE d = $1",
            &[&date],
        )?;
        Ok(row.map(|row| MarketState {
            date: row.get(0),
            reference_close: row.get(1),
            reference_ma: row.get(2),
            gate: row.get(3),
            total_candidates: row.get(4),
            filtered_candidates: row.get(5),
            pct_filtered: row.get(6),
        }))
    }

    fn record_run(&self, record: &RunRecord) -> Result<(), EngineError> {
        self.execute(
            "INSERT INTO system_runs (d, run_ts, status) VALUES ($1, $2, $3)
             ON CONFLICT (d) DO UPDATE SET run_ts = EXCLUDED.run_ts, status = EXCLUDED.status",
            &[
                &record.trade_date,
                &record.run_timestamp,
                &record.status.as_str(),
            ],
        )
    }

    fn run_record(&self, date: NaiveDate) -> Result<Option<RunRecord>, EngineError> {
        let row = self.query_opt(
            "SELECT d, run_ts, status FROM system_runs WHERE d = $1",
            &[&date],
        )?;
        row.map(|row| {
            Ok(RunRecord {
                trade_date: row.get(0),
                run_timestamp: row.get(1),
                status: parse_text(&row, 2)?,
            })
        })
        .transpose()
    }

    fn signals_for(&self, date: NaiveDate) -> Result<Vec<StrategySignal>, EngineError> {
        let rows = self.query(
            "SELECT d, symbol, strategy, direction, strength
             FROM signals_daily WHERE d = $1
             ORDER BY symbol, strategy",
            &[&date],
        )?;
        rows.iter()
            .map(|row| {
                Ok(StrategySignal {
                    date: row.get(0),
                    symbol: row.get(1),
                    strategy: parse_text(row, 2)?,
                    direction: parse_text(row, 3)?,
                    strength: row.get(4),
                })
            })
            .collect()
    }

    fn orders_for(&self, date: NaiveDate) -> Result<Vec<Order>, EngineError> {
        let rows = self.query(
            "SELECT d, symbol, side, qty, type, reason, created_at
             FROM orders_eod WHERE d = $1
             ORDER BY id",
            &[&date],
        )?;
        rows.iter()
            .map(|row| {
                Ok(Order {
                    date: row.get(0),
                    symbol: row.get(1),
                    side: parse_text(row, 2)?,
                    quantity: row.get(3),
                    order_type: parse_text(row, 4)?,
                    reason: row.get(5),
                    created_at: row.get(6),
                })
            })
            .collect()
    }
}

impl EngineStore for PostgresAdapter {
    fn initialize_schema(&self) -> Result<(), EngineError> {
        self.conn()?.batch_execute(SCHEMA).map_err(query_err)
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
