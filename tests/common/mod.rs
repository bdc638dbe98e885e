#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use eodtrader::domain::config::EngineConfig;
use eodtrader::domain::cooldown::{EventType, SymbolEvent};
use eodtrader::domain::engine::RunRecord;
use eodtrader::domain::error::EngineError;
pub use eodtrader::domain::ohlcv::PriceBar;
use eodtrader::domain::order::Order;
use eodtrader::domain::position::Position;
use eodtrader::domain::regime::{KillSwitch, MarketState, RunStatistics};
use eodtrader::domain::strategy::{StrategyKind, StrategySignal};
use eodtrader::domain::universe::UniverseMember;
use eodtrader::ports::data_port::MarketDataPort;
use eodtrader::ports::ledger_port::LedgerPort;
use eodtrader::ports::risk_port::RiskPort;
use eodtrader::ports::EngineStore;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};

pub const REFERENCE: &str = "SPY";
pub const SERIES_LEN: usize = 31;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn start_date() -> NaiveDate {
    date(2024, 1, 1)
}

/// Date of the last bar in a series of `SERIES_LEN` closes.
pub fn trade_date() -> NaiveDate {
    start_date() + Duration::days(SERIES_LEN as i64 - 1)
}

/// One bar per calendar day from `start_date()`, high/low one point around close.
pub fn bars_from_closes(symbol: &str, closes: &[f64]) -> Vec<PriceBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| PriceBar {
            symbol: symbol.to_string(),
            date: start_date() + Duration::days(i as i64),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 10_000,
        })
        .collect()
}

pub fn rising(n: usize) -> Vec<f64> {
    (0..n).map(|i| 100.0 + i as f64).collect()
}

pub fn falling(n: usize) -> Vec<f64> {
    (0..n).map(|i| 200.0 - i as f64).collect()
}

pub fn flat(n: usize) -> Vec<f64> {
    vec![100.0; n]
}

/// Steady rally with a 4-point drop on the last bar: the crossover stays
/// confirmed up while RSI falls back to 50, so the resolved decision is a buy.
pub fn rally_then_dip(n: usize) -> Vec<f64> {
    let mut closes = rising(n - 1);
    let last = closes[closes.len() - 1];
    closes.push(last - 4.0);
    closes
}

pub fn scaled(closes: &[f64], factor: f64) -> Vec<f64> {
    closes.iter().map(|c| c * factor).collect()
}

/// Small windows so a month of bars is enough history.
pub fn test_config() -> EngineConfig {
    let mut cfg = EngineConfig::default();
    cfg.market_filter.sma_window = 5;
    cfg.atr.lookback = 5;
    cfg.mean_reversion.rsi_window = 5;
    cfg.trend.fast = 3;
    cfg.trend.slow = 6;
    cfg.trend.confirm_days = 2;
    cfg.history.lookback_bars = 40;
    cfg.history.min_history = 10;
    cfg
}

/// In-memory store implementing every engine port.
#[derive(Default)]
pub struct MemoryStore {
    pub bars: RefCell<HashMap<String, Vec<PriceBar>>>,
    pub universe: RefCell<Vec<UniverseMember>>,
    pub events: RefCell<Vec<SymbolEvent>>,
    pub positions: RefCell<Vec<Position>>,
    pub kill_switches: RefCell<HashMap<NaiveDate, KillSwitch>>,
    pub signals: RefCell<BTreeMap<(NaiveDate, String, StrategyKind), StrategySignal>>,
    pub orders: RefCell<Vec<Order>>,
    pub market: RefCell<HashMap<NaiveDate, MarketState>>,
    pub runs: RefCell<HashMap<NaiveDate, RunRecord>>,
    pub fail_fetch: Cell<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reference(self, closes: &[f64]) -> Self {
        self.bars
            .borrow_mut()
            .insert(REFERENCE.to_string(), bars_from_closes(REFERENCE, closes));
        self
    }

    pub fn with_symbol(self, symbol: &str, sector: Option<&str>, closes: &[f64]) -> Self {
        self.with_bars(symbol, sector, bars_from_closes(symbol, closes))
    }

    pub fn with_bars(self, symbol: &str, sector: Option<&str>, bars: Vec<PriceBar>) -> Self {
        self.bars.borrow_mut().insert(symbol.to_string(), bars);
        self.universe
            .borrow_mut()
            .push(UniverseMember::new(symbol, sector));
        self
    }

    pub fn with_event(self, event: SymbolEvent) -> Self {
        self.events.borrow_mut().push(event);
        self
    }

    pub fn with_position(self, symbol: &str, quantity: i64, avg_price: f64, sector: &str) -> Self {
        self.positions.borrow_mut().push(Position {
            symbol: symbol.to_string(),
            quantity,
            avg_price,
            sector: Some(sector.to_string()),
        });
        self
    }

    pub fn with_kill_switch(self, date: NaiveDate, reason: &str) -> Self {
        self.kill_switches.borrow_mut().insert(
            date,
            KillSwitch {
                active: true,
                reason: Some(reason.to_string()),
            },
        );
        self
    }

    pub fn order_count(&self) -> usize {
        self.orders.borrow().len()
    }

    pub fn buy_orders(&self) -> Vec<Order> {
        self.orders
            .borrow()
            .iter()
            .filter(|o| o.side == eodtrader::domain::order::OrderSide::Buy)
            .cloned()
            .collect()
    }
}

impl MarketDataPort for MemoryStore {
    fn latest_session(&self) -> Result<Option<NaiveDate>, EngineError> {
        Ok(self
            .bars
            .borrow()
            .values()
            .flat_map(|bars| bars.iter().map(|b| b.date))
            .max())
    }

    fn fetch_bars(
        &self,
        symbol: &str,
        end: NaiveDate,
        lookback: usize,
    ) -> Result<Vec<PriceBar>, EngineError> {
        if self.fail_fetch.get() {
            return Err(EngineError::Database {
                reason: "connection refused".to_string(),
            });
        }
        let bars = self.bars.borrow();
        let Some(series) = bars.get(symbol) else {
            return Ok(Vec::new());
        };
        let upto: Vec<PriceBar> = series.iter().filter(|b| b.date <= end).cloned().collect();
        let skip = upto.len().saturating_sub(lookback);
        Ok(upto.into_iter().skip(skip).collect())
    }

    fn list_universe(&self) -> Result<Vec<UniverseMember>, EngineError> {
        let mut members = self.universe.borrow().clone();
        members.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(members)
    }
}

impl RiskPort for MemoryStore {
    fn has_event(
        &self,
        symbol: &str,
        event_type: EventType,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<bool, EngineError> {
        Ok(self.events.borrow().iter().any(|e| {
            e.symbol == symbol && e.event_type == event_type && e.falls_within(start, end)
        }))
    }

    fn sector_exposure(&self, sector: &str) -> Result<f64, EngineError> {
        Ok(self
            .positions
            .borrow()
            .iter()
            .filter(|p| p.sector.as_deref().unwrap_or("") == sector)
            .map(|p| p.quantity.unsigned_abs() as f64 * p.avg_price)
            .sum())
    }

    fn kill_switch(&self, date: NaiveDate) -> Result<Option<KillSwitch>, EngineError> {
        Ok(self.kill_switches.borrow().get(&date).cloned())
    }
}

impl LedgerPort for MemoryStore {
    fn upsert_signal(&self, signal: &StrategySignal) -> Result<(), EngineError> {
        self.signals.borrow_mut().insert(
            (signal.date, signal.symbol.clone(), signal.strategy),
            signal.clone(),
        );
        Ok(())
    }

    fn append_order(&self, order: &Order) -> Result<(), EngineError> {
        self.orders.borrow_mut().push(order.clone());
        Ok(())
    }

    fn upsert_gate(
        &self,
        date: NaiveDate,
        reference_close: Option<f64>,
        reference_ma: Option<f64>,
        gate: bool,
    ) -> Result<(), EngineError> {
        let mut market = self.market.borrow_mut();
        let state = market.entry(date).or_insert_with(|| MarketState::new(date));
        state.reference_close = reference_close;
        state.reference_ma = reference_ma;
        state.gate = gate;
        Ok(())
    }

    fn update_statistics(
        &self,
        date: NaiveDate,
        stats: &RunStatistics,
    ) -> Result<(), EngineError> {
        let mut market = self.market.borrow_mut();
        let state = market.entry(date).or_insert_with(|| MarketState::new(date));
        state.total_candidates = stats.total_candidates as i64;
        state.filtered_candidates = stats.filtered_candidates as i64;
        state.pct_filtered = stats.pct_filtered();
        Ok(())
    }

    fn market_state(&self, date: NaiveDate) -> Result<Option<MarketState>, EngineError> {
        Ok(self.market.borrow().get(&date).cloned())
    }

    fn record_run(&self, record: &RunRecord) -> Result<(), EngineError> {
        self.runs
            .borrow_mut()
            .insert(record.trade_date, record.clone());
        Ok(())
    }

    fn run_record(&self, date: NaiveDate) -> Result<Option<RunRecord>, EngineError> {
        Ok(self.runs.borrow().get(&date).cloned())
    }

    fn signals_for(&self, date: NaiveDate) -> Result<Vec<StrategySignal>, EngineError> {
        Ok(self
            .signals
            .borrow()
            .values()
            .filter(|s| s.date == date)
            .cloned()
            .collect())
    }

    fn orders_for(&self, date: NaiveDate) -> Result<Vec<Order>, EngineError> {
        Ok(self
            .orders
            .borrow()
            .iter()
            .filter(|o| o.date == date)
            .cloned()
            .collect())
    }
}

impl EngineStore for MemoryStore {
    fn initialize_schema(&self) -> Result<(), EngineError> {
        Ok(())
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
