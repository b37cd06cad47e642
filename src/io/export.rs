//! CSV and JSON export of stored-energy series, valuations, and totals.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;

use crate::sim::aggregate::Totals;
use crate::sim::summary::RunSummary;
use crate::sim::types::StoredEnergyPoint;
use crate::sim::valuation::{PeriodValuation, Savings, ValuationSource};

/// Column header for the stored-energy series export.
const SERIES_HEADER: &str = "timestamp,stored_kwh,stored_percent,grid_draw_kwh,spilled_kwh";

/// Column header for the valuation table export.
const VALUATION_HEADER: &str = "period,loss,gain,fee,total_gain";

/// Everything one run hands to the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub points: Vec<StoredEnergyPoint>,
    pub valuation_source: ValuationSource,
    pub valuations: Vec<PeriodValuation>,
    pub savings: Option<Savings>,
    pub summary: Option<RunSummary>,
    pub totals: Option<Totals>,
}

/// Exports a stored-energy series to a CSV file at the given path.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_series_csv(points: &[StoredEnergyPoint], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    write_series_csv(points, io::BufWriter::new(file))
}

/// Writes a stored-energy series as CSV to any writer.
///
/// The percent column is empty for unbounded ledgers. Output is
/// deterministic for identical input.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_series_csv(points: &[StoredEnergyPoint], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(SERIES_HEADER.split(','))?;

    for p in points {
        wtr.write_record(&[
            p.timestamp.clone(),
            format!("{:.2}", p.stored_kwh),
            p.stored_percent.map(|v| format!("{v:.2}")).unwrap_or_default(),
            format!("{:.2}", p.grid_draw_kwh),
            format!("{:.2}", p.spilled_kwh),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

/// Writes a valuation table as CSV to any writer, amounts to the cent.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_valuations_csv(rows: &[PeriodValuation], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(VALUATION_HEADER.split(','))?;

    for r in rows {
        wtr.write_record(&[
            r.period_label.clone(),
            format!("{:.2}", r.loss),
            format!("{:.2}", r.gain),
            format!("{:.2}", r.fee),
            format!("{:.2}", r.total_gain),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

/// Exports a valuation table to a CSV file at the given path.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_valuations_csv(rows: &[PeriodValuation], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    write_valuations_csv(rows, io::BufWriter::new(file))
}

/// Writes a full report as pretty-printed JSON.
///
/// # Errors
///
/// Returns an `io::Error` if serialisation or writing fails.
pub fn write_report_json(report: &Report, writer: impl Write) -> io::Result<()> {
    serde_json::to_writer_pretty(writer, report).map_err(io::Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(t: usize, percent: Option<f64>) -> StoredEnergyPoint {
        StoredEnergyPoint {
            timestamp: format!("{t:02}:00"),
            stored_kwh: 4.5,
            stored_percent: percent,
            grid_draw_kwh: 0.0,
            spilled_kwh: 0.25,
        }
    }

    fn valuation(label: &str) -> PeriodValuation {
        PeriodValuation {
            period_label: label.to_string(),
            loss: -1.5,
            gain: 3.0,
            fee: -10.0,
            total_gain: -8.5,
        }
    }

    #[test]
    fn series_header_and_row_count() {
        let points: Vec<_> = (0..24).map(|t| point(t, Some(45.0))).collect();
        let mut buf = Vec::new();
        write_series_csv(&points, &mut buf).ok();
        let output = String::from_utf8(buf).unwrap_or_default();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.first().copied(), Some(SERIES_HEADER));
        assert_eq!(lines.len(), 25);
        assert_eq!(lines[1], "00:00,4.50,45.00,0.00,0.25");
    }

    #[test]
    fn unbounded_series_leaves_percent_empty() {
        let mut buf = Vec::new();
        write_series_csv(&[point(3, None)], &mut buf).ok();
        let output = String::from_utf8(buf).unwrap_or_default();
        assert_eq!(output.lines().nth(1), Some("03:00,4.50,,0.00,0.25"));
    }

    #[test]
    fn valuations_round_to_cents() {
        let mut buf = Vec::new();
        write_valuations_csv(&[valuation("2024-01")], &mut buf).ok();
        let output = String::from_utf8(buf).unwrap_or_default();
        let mut lines = output.lines();
        assert_eq!(lines.next(), Some(VALUATION_HEADER));
        assert_eq!(lines.next(), Some("2024-01,-1.50,3.00,-10.00,-8.50"));
    }

    #[test]
    fn deterministic_output() {
        let points: Vec<_> = (0..5).map(|t| point(t, None)).collect();
        let mut buf1 = Vec::new();
        let mut buf2 = Vec::new();
        write_series_csv(&points, &mut buf1).ok();
        write_series_csv(&points, &mut buf2).ok();
        assert_eq!(buf1, buf2);
    }

    #[test]
    fn json_report_has_all_sections() {
        let report = Report {
            points: vec![point(0, None)],
            valuation_source: ValuationSource::Derived,
            valuations: vec![valuation("00:00")],
            savings: None,
            summary: None,
            totals: Some(Totals::default()),
        };
        let mut buf = Vec::new();
        write_report_json(&report, &mut buf).ok();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap_or_default();
        assert_eq!(value["points"].as_array().map(Vec::len), Some(1));
        assert_eq!(value["valuation_source"], "Derived");
        assert_eq!(value["valuations"][0]["total_gain"], -8.5);
        assert!(value["savings"].is_null());
        assert_eq!(value["totals"]["rows_matched"], 0);
    }
}
