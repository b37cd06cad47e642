//! File boundaries: ledger ingestion and report export.

/// CSV and JSON export of series, valuations, and totals.
pub mod export;
/// CSV ingestion of financial ledgers and recorded event sheets.
pub mod ledger;
