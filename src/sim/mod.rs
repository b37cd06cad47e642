/// Stored-energy recurrence and clamping policies.
pub mod accumulator;
/// Date-range filtering and decimal totals over ledger rows.
pub mod aggregate;
pub mod summary;
/// Time-of-use band classification.
pub mod tariff;
pub mod types;
pub mod valuation;
