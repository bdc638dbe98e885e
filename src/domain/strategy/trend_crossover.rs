//! Moving-average crossover generator.
//!
//! Uptrend: fast SMA > slow SMA; downtrend: fast SMA < slow SMA. Both must
//! hold for `confirm_days` consecutive bars before a buy or sell is emitted.

use crate::domain::confirmation::confirm;
use crate::domain::indicator::sma::moving_average;
use crate::domain::strategy::{Direction, SignalGenerator, StrategyKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrendCrossover {
    pub fast: usize,
    pub slow: usize,
    pub confirm_days: usize,
}

impl Default for TrendCrossover {
    fn default() -> Self {
        TrendCrossover {
            fast: 20,
            slow: 100,
            confirm_days: 2,
        }
    }
}

impl SignalGenerator for TrendCrossover {
    fn kind(&self) -> StrategyKind {
        StrategyKind::TrendCrossover
    }

    fn min_history(&self) -> usize {
        self.slow.max(self.fast) + self.confirm_days.saturating_sub(1)
    }

    fn directions(&self, closes: &[f64]) -> Vec<Direction> {
        let fast = moving_average(closes, self.fast);
        let slow = moving_average(closes, self.slow);

        let (up, down): (Vec<bool>, Vec<bool>) = fast
            .iter()
            .zip(&slow)
            .map(|(f, s)| match (f, s) {
                (Some(f), Some(s)) => (f > s, f < s),
                _ => (false, false),
            })
            .unzip();

        let up = confirm(&up, self.confirm_days, self.confirm_days);
        let down = confirm(&down, self.confirm_days, self.confirm_days);

        up.into_iter()
            .zip(down)
            .map(|(up, down)| {
                if down {
                    Direction::Sell
                } else if up {
                    Direction::Buy
                } else {
                    Direction::Hold
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::strategy::Evaluation;

    fn small() -> TrendCrossover {
        TrendCrossover {
            fast: 3,
            slow: 6,
            confirm_days: 2,
        }
    }

    #[test]
    fn uptrend_buys() {
        let closes: Vec<f64> = (0..20).map(|i| 50.0 + i as f64).collect();
        assert_eq!(small().evaluate(&closes), Evaluation::Signal(Direction::Buy));
    }

    #[test]
    fn downtrend_sells() {
        let closes: Vec<f64> = (0..20).map(|i| 50.0 - i as f64).collect();
        assert_eq!(small().evaluate(&closes), Evaluation::Signal(Direction::Sell));
    }

    #[test]
    fn fresh_cross_waits_for_confirmation() {
        // long decline, then a spike that lifts the fast average above the slow one for one bar
        let mut closes: Vec<f64> = (0..20).map(|i| 100.0 - i as f64).collect();
        closes.push(140.0);

        let directions = small().directions(&closes);
        let fast = moving_average(&closes, 3);
        let slow = moving_average(&closes, 6);
        let (f, s) = (fast[20].unwrap(), slow[20].unwrap());

        assert!(f > s, "setup should cross on the last bar");
        assert_eq!(directions[20], Direction::Hold);
        assert_eq!(directions[19], Direction::Sell);
    }

    #[test]
    fn flat_prices_hold() {
        let closes = vec![10.0; 20];
        assert_eq!(small().evaluate(&closes), Evaluation::Signal(Direction::Hold));
    }

    #[test]
    fn min_history_covers_slow_window_and_confirmation() {
        assert_eq!(TrendCrossover::default().min_history(), 101);
        assert_eq!(
            small().evaluate(&[1.0; 6]),
            Evaluation::InsufficientHistory { have: 6, need: 7 }
        );
    }
}
