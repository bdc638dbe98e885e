//! Stop-cooldown guard.
//!
//! A symbol with a STOP_HIT event dated in `[date - days, date)` is not
//! eligible for new entries on `date`.

use crate::domain::error::EngineError;
use crate::ports::risk_port::RiskPort;
use chrono::{Duration, NaiveDate};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    StopHit,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::StopHit => "STOP_HIT",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STOP_HIT" => Ok(EventType::StopHit),
            other => Err(format!("unknown event type '{other}'")),
        }
    }
}

/// Externally recorded per-symbol event.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolEvent {
    pub symbol: String,
    pub date: NaiveDate,
    pub event_type: EventType,
    pub detail: Option<String>,
}

impl SymbolEvent {
    pub fn stop_hit(symbol: &str, date: NaiveDate) -> Self {
        SymbolEvent {
            symbol: symbol.to_string(),
            date,
            event_type: EventType::StopHit,
            detail: None,
        }
    }

    /// Half-open containment: `start <= date < end`.
    pub fn falls_within(&self, start: NaiveDate, end: NaiveDate) -> bool {
        start <= self.date && self.date < end
    }
}

/// Returns `(start, end)` of the half-open lookback window, or `None` when
/// the cooldown is disabled. A window reaching past the earliest
/// representable date starts there.
pub fn cooldown_window(date: NaiveDate, days: i64) -> Option<(NaiveDate, NaiveDate)> {
    if days <= 0 {
        return None;
    }
    let start = Duration::try_days(days)
        .and_then(|span| date.checked_sub_signed(span))
        .unwrap_or(NaiveDate::MIN);
    Some((start, date))
}

pub fn cooldown_active(
    risk: &dyn RiskPort,
    symbol: &str,
    date: NaiveDate,
    days: i64,
) -> Result<bool, EngineError> {
    match cooldown_window(date, days) {
        Some((start, end)) => risk.has_event(symbol, EventType::StopHit, start, end),
        None => Ok(false),
    }
}
