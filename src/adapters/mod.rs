//! Concrete adapter implementations for ports.

pub mod file_config_adapter;
#[cfg(feature = "postgres")]
pub mod postgres_adapter;
#[cfg(feature = "sqlite")]
pub mod sqlite_adapter;

#[cfg(any(feature = "sqlite", feature = "postgres"))]
use crate::{domain::error::EngineError, ports::config_port::ConfigPort};

/// `[section] pool_size`, defaulting to 4. Must be a positive `u32`.
#[cfg(any(feature = "sqlite", feature = "postgres"))]
pub(crate) fn pool_size(config: &dyn ConfigPort, section: &str) -> Result<u32, EngineError> {
    let value = config.get_int(section, "pool_size", 4);
    u32::try_from(value)
        .ok()
        .filter(|n| *n >= 1)
        .ok_or_else(|| {
            EngineError::invalid(section, "pool_size", format!("{value} is not a valid pool size"))
        })
}
