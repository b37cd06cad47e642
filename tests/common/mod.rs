//! Shared test fixtures for integration tests.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::path::Path;

use chrono::NaiveDate;
use vbat_sim::io::ledger::load_ledger;
use vbat_sim::sim::aggregate::FieldSelector;
use vbat_sim::sim::types::{EnergyEvent, Granularity, LedgerRow};
use vbat_sim::source::{EventSource, SyntheticSource};

/// Sample financial ledger: 2024-01 through 2024-06, monthly fee 10.
pub const LEDGER_PATH: &str = "scenarios/ledger_2024.csv";

/// Recorded hourly sheet for Saturday 2024-01-06.
pub const BATTERY_SHEET_PATH: &str = "scenarios/battery_sheet.csv";

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

/// Rows of the sample ledger.
pub fn sample_ledger() -> Vec<LedgerRow> {
    load_ledger(Path::new(LEDGER_PATH)).expect("sample ledger should load")
}

/// Every aggregatable ledger column.
pub fn all_fields() -> BTreeSet<FieldSelector> {
    FieldSelector::ALL.into_iter().collect()
}

/// Synthetic events starting 2024-01-01.
pub fn synthetic_events(granularity: Granularity, periods: usize, seed: u64) -> Vec<EnergyEvent> {
    SyntheticSource::new(granularity, periods, date(2024, 1, 1), seed).events()
}
