//! CSV ingestion of financial ledgers and recorded event sheets.
//!
//! Empty or absent numeric cells read as `0`. Cells that are present but not
//! numbers, and rows without a period key or timestamp, are rejected.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::error::EngineError;
use crate::sim::types::{EnergyEvent, LedgerRow};

/// Failure to load a ledger file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot open \"{path}\": {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// One row of the financial sheet as it appears on disk.
#[derive(Debug, Deserialize)]
struct RawFinancialRow {
    #[serde(default, alias = "period_key")]
    month_year: Option<String>,
    #[serde(default)]
    injection_price_cents_kwh: Option<f64>,
    #[serde(default)]
    energy_charged_kwh: Option<f64>,
    #[serde(default)]
    energy_discharged_kwh: Option<f64>,
    #[serde(default)]
    battery_end_state_kwh: Option<f64>,
    #[serde(default)]
    stored_value_euros: Option<f64>,
    #[serde(default)]
    stored_value_variation_euros: Option<f64>,
    #[serde(default, alias = "loss_euros")]
    loss_not_injecting_euros: Option<f64>,
    #[serde(default, alias = "gain_euros")]
    gain_not_drawing_euros: Option<f64>,
    #[serde(default)]
    total_gain_euros: Option<f64>,
}

/// One row of the recorded virtual-battery sheet.
#[derive(Debug, Deserialize)]
struct RawBatteryRow {
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    excessprod: Option<f64>,
    #[serde(default)]
    excesscons: Option<f64>,
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader)
}

fn line_key(index: usize) -> String {
    // header is line 1
    format!("line {}", index + 2)
}

/// Reads financial ledger rows from CSV.
///
/// Columns follow the financial sheet (`month_year`, `energy_charged_kwh`,
/// ..., `loss_not_injecting_euros`, `gain_not_drawing_euros`,
/// `total_gain_euros`); `period_key`, `loss_euros`, and `gain_euros` are
/// accepted as aliases. Unknown columns are ignored.
///
/// # Errors
///
/// Returns [`EngineError::MalformedRow`] for a row that cannot be parsed or
/// has no period key.
pub fn read_ledger<R: Read>(reader: R) -> Result<Vec<LedgerRow>, EngineError> {
    let mut rdr = csv_reader(reader);
    let mut rows = Vec::new();

    for (i, record) in rdr.deserialize::<RawFinancialRow>().enumerate() {
        let raw = record.map_err(|e| EngineError::malformed(&line_key(i), e.to_string()))?;
        let period_key = raw
            .month_year
            .filter(|k| !k.is_empty())
            .ok_or_else(|| EngineError::malformed(&line_key(i), "missing month_year"))?;

        rows.push(LedgerRow {
            period_key,
            injection_price_cents_kwh: raw.injection_price_cents_kwh.unwrap_or(0.0),
            energy_charged_kwh: raw.energy_charged_kwh.unwrap_or(0.0),
            energy_discharged_kwh: raw.energy_discharged_kwh.unwrap_or(0.0),
            battery_end_state_kwh: raw.battery_end_state_kwh.unwrap_or(0.0),
            stored_value_euros: raw.stored_value_euros.unwrap_or(0.0),
            stored_value_variation_euros: raw.stored_value_variation_euros.unwrap_or(0.0),
            loss_euros: raw.loss_not_injecting_euros.unwrap_or(0.0),
            gain_euros: raw.gain_not_drawing_euros.unwrap_or(0.0),
            total_gain_euros: raw.total_gain_euros.unwrap_or(0.0),
        });
    }

    Ok(rows)
}

/// Reads a recorded virtual-battery sheet into energy events.
///
/// The sheet stores consumption as a magnitude, so `excesscons` is negated
/// whatever its sign on disk. Production keeps its sign and is validated.
///
/// # Errors
///
/// Returns [`EngineError::MalformedRow`] for an unparseable row, a missing
/// timestamp, or negative production.
pub fn read_battery_events<R: Read>(reader: R) -> Result<Vec<EnergyEvent>, EngineError> {
    let mut rdr = csv_reader(reader);
    let mut events = Vec::new();

    for (i, record) in rdr.deserialize::<RawBatteryRow>().enumerate() {
        let raw = record.map_err(|e| EngineError::malformed(&line_key(i), e.to_string()))?;
        let timestamp = raw
            .timestamp
            .filter(|t| !t.is_empty())
            .ok_or_else(|| EngineError::malformed(&line_key(i), "missing timestamp"))?;
        let event = EnergyEvent::new(
            timestamp,
            raw.excessprod.unwrap_or(0.0),
            -raw.excesscons.unwrap_or(0.0).abs(),
        );
        event.validate()?;
        events.push(event);
    }

    Ok(events)
}

/// Loads a financial ledger from a CSV file.
///
/// # Errors
///
/// Returns [`LoadError::Io`] if the file cannot be opened, otherwise the
/// errors of [`read_ledger`].
pub fn load_ledger(path: &Path) -> Result<Vec<LedgerRow>, LoadError> {
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let rows = read_ledger(io::BufReader::new(file))?;
    info!(path = %path.display(), rows = rows.len(), "loaded ledger");
    Ok(rows)
}

/// Loads recorded events from a CSV file.
///
/// # Errors
///
/// Returns [`LoadError::Io`] if the file cannot be opened, otherwise the
/// errors of [`read_battery_events`].
pub fn load_battery_events(path: &Path) -> Result<Vec<EnergyEvent>, LoadError> {
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let events = read_battery_events(io::BufReader::new(file))?;
    info!(path = %path.display(), events = events.len(), "loaded recorded events");
    Ok(events)
}
