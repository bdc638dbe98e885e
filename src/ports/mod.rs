//! Port traits: the engine's only view of storage and configuration.

pub mod config_port;
pub mod data_port;
pub mod ledger_port;
pub mod risk_port;

use crate::domain::error::EngineError;
use data_port::MarketDataPort;
use ledger_port::LedgerPort;
use risk_port::RiskPort;

/// A single backing store serving every engine port.
pub trait EngineStore: MarketDataPort + RiskPort + LedgerPort {
    /// Create tables and indexes if they do not exist.
    fn initialize_schema(&self) -> Result<(), EngineError>;

    fn as_data(&self) -> &dyn MarketDataPort;
    fn as_risk(&self) -> &dyn RiskPort;
    fn as_ledger(&self) -> &dyn LedgerPort;
}
