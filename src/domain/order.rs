//! Dry-run order ledger entries.

use crate::domain::strategy::StrategyKind;
use chrono::{NaiveDate, NaiveDateTime};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderSide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buy" => Ok(OrderSide::Buy),
            "sell" => Ok(OrderSide::Sell),
            other => Err(format!("unknown order side '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderType {
    Market,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Market => "market",
        }
    }
}

impl FromStr for OrderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "market" => Ok(OrderType::Market),
            other => Err(format!("unknown order type '{other}'")),
        }
    }
}

/// Append-only record. A sell with quantity 0 means "exit the full position".
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub date: NaiveDate,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: i64,
    pub order_type: OrderType,
    pub reason: String,
    pub created_at: NaiveDateTime,
}

fn reason_tag(strategy: StrategyKind) -> &'static str {
    match strategy {
        StrategyKind::MeanReversion => "rsi_mr",
        StrategyKind::TrendCrossover => "sma_x",
    }
}

impl Order {
    pub fn entry(
        date: NaiveDate,
        symbol: &str,
        quantity: i64,
        strategy: StrategyKind,
        created_at: NaiveDateTime,
    ) -> Self {
        Order {
            date,
            symbol: symbol.to_string(),
            side: OrderSide::Buy,
            quantity,
            order_type: OrderType::Market,
            reason: format!("entry-{}", reason_tag(strategy)),
            created_at,
        }
    }

    pub fn exit(
        date: NaiveDate,
        symbol: &str,
        strategy: StrategyKind,
        created_at: NaiveDateTime,
    ) -> Self {
        Order {
            date,
            symbol: symbol.to_string(),
            side: OrderSide::Sell,
            quantity: 0,
            order_type: OrderType::Market,
            reason: format!("exit-{}", reason_tag(strategy)),
            created_at,
        }
    }

    pub fn is_full_exit(&self) -> bool {
        self.side == OrderSide::Sell && self.quantity == 0
    }
}
