//! Core domain types and logic.

pub mod analytics;
pub mod config_validation;
pub mod error;
pub mod ohlcv;
pub mod rolling;
pub mod series;
pub mod universe;
