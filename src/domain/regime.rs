//! Market regime gate and per-date market state.
//!
//! The gate is a single global decision per trading date: it is open when the
//! reference instrument closes at or above its own moving average. A reading
//! that cannot be computed is returned as [`GateReading::Unavailable`] so the
//! caller decides the fail-safe explicitly.

use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::PriceBar;
use chrono::NaiveDate;

/// One row per trading date: gate inputs and the run's filtering statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketState {
    pub date: NaiveDate,
    pub reference_close: Option<f64>,
    pub reference_ma: Option<f64>,
    pub gate: bool,
    pub total_candidates: i64,
    pub filtered_candidates: i64,
    pub pct_filtered: f64,
}

impl MarketState {
    pub fn new(date: NaiveDate) -> Self {
        MarketState {
            date,
            reference_close: None,
            reference_ma: None,
            gate: false,
            total_candidates: 0,
            filtered_candidates: 0,
            pct_filtered: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GateReading {
    Computed {
        reference_close: f64,
        reference_ma: f64,
        open: bool,
    },
    Unavailable {
        reason: String,
    },
}

/// Where the gate value used by a run came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateSource {
    Computed,
    Cached,
    FailSafe,
}

pub fn market_ok(reference_close: f64, reference_ma: f64) -> bool {
    reference_close >= reference_ma
}

/// Evaluate the gate for `date` from reference bars (oldest first).
pub fn read_gate(reference_bars: &[PriceBar], date: NaiveDate, window: usize) -> GateReading {
    let Some(index) = reference_bars.iter().position(|b| b.date == date) else {
        return GateReading::Unavailable {
            reason: format!("no reference bar on {date}"),
        };
    };

    let series = IndicatorSeries::compute(reference_bars, IndicatorType::Sma(window));
    let reference_close = reference_bars[index].close;

    match series.value_on(date) {
        Some(reference_ma) => GateReading::Computed {
            reference_close,
            reference_ma,
            open: market_ok(reference_close, reference_ma),
        },
        None => GateReading::Unavailable {
            reason: format!(
                "insufficient reference history: have {} bars, need {}",
                index + 1,
                window
            ),
        },
    }
}

/// Externally recorded trading halt for a date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KillSwitch {
    pub active: bool,
    pub reason: Option<String>,
}

/// Candidate counts committed after the per-symbol loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunStatistics {
    pub total_candidates: usize,
    pub filtered_candidates: usize,
}

impl RunStatistics {
    /// Filtered share in percent (0-100); zero when nothing was evaluated.
    pub fn pct_filtered(&self) -> f64 {
        if self.total_candidates == 0 {
            0.0
        } else {
            100.0 * self.filtered_candidates as f64 / self.total_candidates as f64
        }
    }
}
