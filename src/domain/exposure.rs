//! Sector exposure control.

use std::collections::HashMap;

/// Approve iff `current + candidate <= max_fraction * portfolio_value`.
/// The boundary is inclusive.
pub fn sector_ok(
    current_sector_value: f64,
    portfolio_value: f64,
    candidate_value: f64,
    max_fraction: f64,
) -> bool {
    current_sector_value + candidate_value <= max_fraction * portfolio_value
}

/// Buy value committed per sector during a single run.
///
/// Held positions only change through reconciliation, so entries approved
/// earlier in the same run are tracked here and added to the stored exposure.
#[derive(Debug, Default, Clone)]
pub struct SectorBook {
    pending: HashMap<String, f64>,
}

impl SectorBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self, sector: &str) -> f64 {
        self.pending.get(sector).copied().unwrap_or(0.0)
    }

    pub fn commit(&mut self, sector: &str, value: f64) {
        *self.pending.entry(sector.to_string()).or_insert(0.0) += value;
    }

    /// Check a candidate against stored exposure plus this run's pending buys.
    pub fn approves(
        &self,
        sector: &str,
        held_value: f64,
        portfolio_value: f64,
        candidate_value: f64,
        max_fraction: f64,
    ) -> bool {
        sector_ok(
            held_value + self.pending(sector),
            portfolio_value,
            candidate_value,
            max_fraction,
        )
    }
}
