//! Strategy signal generators and signal types.
//!
//! Each generator turns a close-price history (oldest first) into one
//! [`Direction`] per bar. The orchestrator only acts on the latest one.

pub mod mean_reversion;
pub mod trend_crossover;

use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Buy,
    Sell,
    Hold,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Buy => "buy",
            Direction::Sell => "sell",
            Direction::Hold => "hold",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buy" => Ok(Direction::Buy),
            "sell" => Ok(Direction::Sell),
            "hold" => Ok(Direction::Hold),
            other => Err(format!("unknown direction '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StrategyKind {
    MeanReversion,
    TrendCrossover,
}

impl StrategyKind {
    /// Stable identifier stored with each signal row.
    pub fn code(&self) -> &'static str {
        match self {
            StrategyKind::MeanReversion => "RSI_MR",
            StrategyKind::TrendCrossover => "SMA_X",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RSI_MR" => Ok(StrategyKind::MeanReversion),
            "SMA_X" => Ok(StrategyKind::TrendCrossover),
            other => Err(format!("unknown strategy '{other}'")),
        }
    }
}

/// One persisted per-strategy decision. Unique per (date, symbol, strategy).
#[derive(Debug, Clone, PartialEq)]
pub struct StrategySignal {
    pub date: NaiveDate,
    pub symbol: String,
    pub strategy: StrategyKind,
    pub direction: Direction,
    pub strength: f64,
}

/// Result of evaluating a generator on the latest bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evaluation {
    Signal(Direction),
    InsufficientHistory { have: usize, need: usize },
}

pub trait SignalGenerator {
    fn kind(&self) -> StrategyKind;

    /// Shortest close history that can yield a meaningful latest signal.
    fn min_history(&self) -> usize;

    /// One direction per close, aligned with the input.
    fn directions(&self, closes: &[f64]) -> Vec<Direction>;

    fn evaluate(&self, closes: &[f64]) -> Evaluation {
        let need = self.min_history();
        if closes.len() < need {
            return Evaluation::InsufficientHistory {
                have: closes.len(),
                need,
            };
        }
        let latest = self
            .directions(closes)
            .last()
            .copied()
            .unwrap_or(Direction::Hold);
        Evaluation::Signal(latest)
    }
}

/// Final per-symbol decision with the strategy that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub direction: Direction,
    pub strategy: Option<StrategyKind>,
}

/// Combine per-strategy directions: sell overrides buy overrides hold.
/// Ties are attributed to the first strategy in `signals`.
pub fn resolve(signals: &[(StrategyKind, Direction)]) -> Resolution {
    for wanted in [Direction::Sell, Direction::Buy] {
        if let Some((kind, _)) = signals.iter().find(|(_, d)| *d == wanted) {
            return Resolution {
                direction: wanted,
                strategy: Some(*kind),
            };
        }
    }
    Resolution {
        direction: Direction::Hold,
        strategy: None,
    }
}
