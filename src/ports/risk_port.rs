//! Risk inputs written by external collaborators: stop events, held
//! positions and the kill switch.

use crate::domain::cooldown::EventType;
use crate::domain::error::EngineError;
use crate::domain::regime::KillSwitch;
use chrono::NaiveDate;

pub trait RiskPort {
    /// True if an event of `event_type` exists for `symbol` dated in `[start, end)`.
    fn has_event(
        &self,
        symbol: &str,
        event_type: EventType,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<bool, EngineError>;

    /// Aggregate held value in `sector` at average cost.
    fn sector_exposure(&self, sector: &str) -> Result<f64, EngineError>;

    fn kill_switch(&self, date: NaiveDate) -> Result<Option<KillSwitch>, EngineError>;
}
