//! Engine outputs: signals, orders, market state and run records.

use crate::domain::engine::RunRecord;
use crate::domain::error::EngineError;
use crate::domain::order::Order;
use crate::domain::regime::{MarketState, RunStatistics};
use crate::domain::strategy::StrategySignal;
use chrono::NaiveDate;

pub trait LedgerPort {
    /// Insert or overwrite the row keyed by (date, symbol, strategy).
    fn upsert_signal(&self, signal: &StrategySignal) -> Result<(), EngineError>;

    /// Orders are never updated; every call adds a row.
    fn append_order(&self, order: &Order) -> Result<(), EngineError>;

    /// Insert or overwrite the gate columns of the date's MarketState row.
    fn upsert_gate(
        &self,
        date: NaiveDate,
        reference_close: Option<f64>,
        reference_ma: Option<f64>,
        gate: bool,
    ) -> Result<(), EngineError>;

    /// Insert or overwrite the statistics columns, leaving gate columns intact.
    fn update_statistics(
        &self,
        date: NaiveDate,
        stats: &RunStatistics,
    ) -> Result<(), EngineError>;

    fn market_state(&self, date: NaiveDate) -> Result<Option<MarketState>, EngineError>;

    fn record_run(&self, record: &RunRecord) -> Result<(), EngineError>;

    fn run_record(&self, date: NaiveDate) -> Result<Option<RunRecord>, EngineError>;

    fn signals_for(&self, date: NaiveDate) -> Result<Vec<StrategySignal>, EngineError>;

    fn orders_for(&self, date: NaiveDate) -> Result<Vec<Order>, EngineError>;
}
