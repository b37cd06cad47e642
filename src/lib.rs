//! Household virtual battery ledger and time-of-use tariff valuation.

pub mod config;
pub mod error;
pub mod io;
/// Accumulator, tariff, valuation, and aggregation modules.
pub mod sim;
pub mod source;

pub use error::EngineError;
