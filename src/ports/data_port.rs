//! Read-only market data port.

use crate::domain::error::EngineError;
use crate::domain::ohlcv::PriceBar;
use crate::domain::universe::UniverseMember;
use chrono::NaiveDate;

pub trait MarketDataPort {
    /// Most recent bar date across all symbols, if any bars exist.
    fn latest_session(&self) -> Result<Option<NaiveDate>, EngineError>;

    /// Up to `lookback` bars for `symbol` dated on or before `end`, oldest first.
    fn fetch_bars(
        &self,
        symbol: &str,
        end: NaiveDate,
        lookback: usize,
    ) -> Result<Vec<PriceBar>, EngineError>;

    /// Active symbols with their sector, ordered by symbol.
    fn list_universe(&self) -> Result<Vec<UniverseMember>, EngineError>;
}
