//! Core domain types and logic.

pub mod candle;
pub mod series;
pub mod regime;
pub mod signal;
pub mod session;
pub mod position;
pub mod backtest;
pub mod metrics;
pub mod sweep;
pub mod advisory;
pub mod config_validation;
pub mod error;

#[cfg(test)]
pub mod fixtures;
