//! RSI mean-reversion generator.
//!
//! Raw buy: RSI < buy_rsi, confirmed over the configured window.
//! Raw sell: RSI >= sell_rsi, acted on immediately.
//! Sell overrides buy overrides hold. Undefined RSI counts as neither.

use crate::domain::confirmation::confirm;
use crate::domain::indicator::rsi::rsi;
use crate::domain::strategy::{Direction, SignalGenerator, StrategyKind};

#[derive(Debug, Clone, PartialEq)]
pub struct MeanReversion {
    pub rsi_window: usize,
    pub buy_rsi: f64,
    pub sell_rsi: f64,
    pub confirm_window: usize,
    pub confirm_min_count: usize,
}

impl Default for MeanReversion {
    fn default() -> Self {
        MeanReversion {
            rsi_window: 14,
            buy_rsi: 30.0,
            sell_rsi: 55.0,
            confirm_window: 3,
            confirm_min_count: 2,
        }
    }
}

impl SignalGenerator for MeanReversion {
    fn kind(&self) -> StrategyKind {
        StrategyKind::MeanReversion
    }

    fn min_history(&self) -> usize {
        self.rsi_window + 1
    }

    fn directions(&self, closes: &[f64]) -> Vec<Direction> {
        let values = rsi(closes, self.rsi_window);

        let buy_raw: Vec<bool> = values
            .iter()
            .map(|v| v.is_some_and(|r| r < self.buy_rsi))
            .collect();
        let buy = confirm(&buy_raw, self.confirm_window, self.confirm_min_count);

        values
            .iter()
            .zip(buy)
            .map(|(value, buy)| {
                let sell = value.is_some_and(|r| r >= self.sell_rsi);
                if sell {
                    Direction::Sell
                } else if buy {
                    Direction::Buy
                } else {
                    Direction::Hold
                }
            })
            .collect()
    }
}
