//! Post-hoc summary of a completed stored-energy series.

use std::fmt;

use serde::Serialize;

use super::types::{EnergyEvent, StoredEnergyPoint};

/// Aggregate indicators derived from one accumulator run.
///
/// Computed after the fact from the events and the points they produced, so
/// the report always agrees with the series it describes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    /// Number of samples in the series.
    pub periods: usize,
    /// Stored energy after the last event (kWh).
    pub final_stored_kwh: f64,
    /// Final fill level when a capacity is configured.
    pub final_percent: Option<f64>,
    /// Highest stored energy seen (kWh).
    pub peak_stored_kwh: f64,
    /// Sum of positive net flows (kWh).
    pub total_charged_kwh: f64,
    /// Sum of negative net flows as a positive magnitude (kWh).
    pub total_discharged_kwh: f64,
    /// Energy drawn from the grid because storage was empty (kWh, <= 0).
    pub total_grid_draw_kwh: f64,
    /// Energy discarded at the capacity ceiling (kWh).
    pub total_spilled_kwh: f64,
}

impl RunSummary {
    /// Computes the summary from the events and the series they produced.
    ///
    /// `events` and `points` are expected to be the same length; extra
    /// entries on either side are ignored for the flow totals.
    pub fn from_series(events: &[EnergyEvent], points: &[StoredEnergyPoint]) -> Self {
        let Some(last) = points.last() else {
            return Self {
                periods: 0,
                final_stored_kwh: 0.0,
                final_percent: None,
                peak_stored_kwh: 0.0,
                total_charged_kwh: 0.0,
                total_discharged_kwh: 0.0,
                total_grid_draw_kwh: 0.0,
                total_spilled_kwh: 0.0,
            };
        };

        let mut charged = 0.0_f64;
        let mut discharged = 0.0_f64;
        for ev in events.iter().take(points.len()) {
            let net = ev.net_flow_kwh();
            if net > 0.0 {
                charged += net;
            } else {
                discharged -= net;
            }
        }

        Self {
            periods: points.len(),
            final_stored_kwh: last.stored_kwh,
            final_percent: last.stored_percent,
            peak_stored_kwh: points.iter().map(|p| p.stored_kwh).fold(0.0, f64::max),
            total_charged_kwh: charged,
            total_discharged_kwh: discharged,
            total_grid_draw_kwh: points.iter().map(|p| p.grid_draw_kwh).sum(),
            total_spilled_kwh: points.iter().map(|p| p.spilled_kwh).sum(),
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Virtual Battery Summary ---")?;
        writeln!(f, "Periods:               {}", self.periods)?;
        write!(f, "Final stored:          {:.2} kWh", self.final_stored_kwh)?;
        if let Some(pct) = self.final_percent {
            write!(f, " ({pct:.0}%)")?;
        }
        writeln!(f)?;
        writeln!(f, "Peak stored:           {:.2} kWh", self.peak_stored_kwh)?;
        writeln!(
            f,
            "Charged / discharged:  {:.2} / {:.2} kWh",
            self.total_charged_kwh, self.total_discharged_kwh
        )?;
        writeln!(f, "Drawn from grid:       {:.2} kWh", self.total_grid_draw_kwh.abs())?;
        write!(f, "Spilled at capacity:   {:.2} kWh", self.total_spilled_kwh)
    }
}
