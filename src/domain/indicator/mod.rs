//! Technical indicators over daily price history.
//!
//! The calculators in [`sma`], [`rsi`] and [`atr`] are pure functions over
//! slices and return one `Option<f64>` per input point: `None` marks the
//! warmup region (or an undefined value) and is never replaced by a numeric
//! stand-in. [`IndicatorSeries`] aligns those values with bar dates.

pub mod atr;
pub mod rsi;
pub mod sma;

use crate::domain::ohlcv::PriceBar;
use chrono::NaiveDate;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorPoint {
    pub date: NaiveDate,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
    Rsi(usize),
    Atr(usize),
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    /// Compute an indicator over `bars` (oldest first).
    pub fn compute(bars: &[PriceBar], indicator_type: IndicatorType) -> Self {
        let raw = match indicator_type {
            IndicatorType::Sma(period) => {
                let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
                sma::moving_average(&closes, period)
            }
            IndicatorType::Rsi(window) => {
                let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
                rsi::rsi(&closes, window)
            }
            IndicatorType::Atr(period) => atr::atr_from_bars(bars, period),
        };

        let values = bars
            .iter()
            .zip(raw)
            .map(|(bar, value)| IndicatorPoint {
                date: bar.date,
                value,
            })
            .collect();

        IndicatorSeries {
            indicator_type,
            values,
        }
    }

    /// Value on `date`, or `None` if the date is absent or still in warmup.
    pub fn value_on(&self, date: NaiveDate) -> Option<f64> {
        self.values
            .iter()
            .find(|p| p.date == date)
            .and_then(|p| p.value)
    }

    /// Value at the most recent point.
    pub fn latest(&self) -> Option<f64> {
        self.values.last().and_then(|p| p.value)
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Rsi(window) => write!(f, "RSI({})", window),
            IndicatorType::Atr(period) => write!(f, "ATR({})", period),
        }
    }
}
