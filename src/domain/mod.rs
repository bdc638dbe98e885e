//! Core domain types and decision logic.

pub mod config;
pub mod confirmation;
pub mod cooldown;
pub mod engine;
pub mod error;
pub mod exposure;
pub mod indicator;
pub mod ohlcv;
pub mod order;
pub mod position;
pub mod regime;
pub mod sizing;
pub mod strategy;
pub mod universe;
