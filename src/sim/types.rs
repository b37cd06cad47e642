//! Core data types: energy events, stored-energy samples, ledger rows, and
//! reporting granularity.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// One discrete energy observation.
///
/// Flows follow the storage convention: production is a positive magnitude,
/// consumption and external draw are negative magnitudes, so the sum of the
/// three is the net flow into the virtual battery.
///
/// # Examples
///
/// ```
/// use vbat_sim::sim::types::EnergyEvent;
///
/// let ev = EnergyEvent::new("08:00", 5.0, -3.0).with_external_draw(-1.0);
/// assert_eq!(ev.net_flow_kwh(), 1.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyEvent {
    /// Opaque ordering label (hour, day, month, or date).
    pub timestamp: String,
    /// Energy produced beyond immediate consumption (kWh, >= 0).
    pub excess_production_kwh: f64,
    /// Energy drawn beyond immediate production (kWh, <= 0).
    pub excess_consumption_kwh: f64,
    /// Draw not attributable to the household, e.g. charging away from home (kWh, <= 0).
    #[serde(default)]
    pub external_draw_kwh: f64,
}

impl EnergyEvent {
    /// Creates an event without external draw.
    pub fn new(
        timestamp: impl Into<String>,
        excess_production_kwh: f64,
        excess_consumption_kwh: f64,
    ) -> Self {
        Self {
            timestamp: timestamp.into(),
            excess_production_kwh,
            excess_consumption_kwh,
            external_draw_kwh: 0.0,
        }
    }

    /// Returns the event with the given external draw (kWh, <= 0).
    pub fn with_external_draw(mut self, external_draw_kwh: f64) -> Self {
        self.external_draw_kwh = external_draw_kwh;
        self
    }

    /// Net flow into storage: production + consumption + external draw.
    pub fn net_flow_kwh(&self) -> f64 {
        self.excess_production_kwh + self.excess_consumption_kwh + self.external_draw_kwh
    }

    /// Checks the sign conventions and finiteness of all three flows.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::MalformedRow`] keyed by the event timestamp.
    pub fn validate(&self) -> Result<(), EngineError> {
        let flows = [
            ("excess_production_kwh", self.excess_production_kwh),
            ("excess_consumption_kwh", self.excess_consumption_kwh),
            ("external_draw_kwh", self.external_draw_kwh),
        ];
        if let Some((name, _)) = flows.iter().find(|(_, v)| !v.is_finite()) {
            return Err(EngineError::malformed(
                &self.timestamp,
                format!("{name} is not a finite number"),
            ));
        }
        if self.excess_production_kwh < 0.0 {
            return Err(EngineError::malformed(
                &self.timestamp,
                "excess_production_kwh must be >= 0",
            ));
        }
        if self.excess_consumption_kwh > 0.0 {
            return Err(EngineError::malformed(
                &self.timestamp,
                "excess_consumption_kwh must be <= 0",
            ));
        }
        if self.external_draw_kwh > 0.0 {
            return Err(EngineError::malformed(
                &self.timestamp,
                "external_draw_kwh must be <= 0",
            ));
        }
        Ok(())
    }
}

/// One output sample of the accumulator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredEnergyPoint {
    /// Label inherited from the source event.
    pub timestamp: String,
    /// Stored energy after this event, rounded to 2 decimals (kWh, >= 0).
    pub stored_kwh: f64,
    /// `stored_kwh / capacity * 100` when a capacity is configured.
    pub stored_percent: Option<f64>,
    /// Deficit the battery could not cover and had to come from the grid (kWh, <= 0).
    pub grid_draw_kwh: f64,
    /// Surplus discarded at the capacity ceiling (kWh, >= 0).
    pub spilled_kwh: f64,
}

impl fmt::Display for StoredEnergyPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>16} | stored={:>8.2} kWh", self.timestamp, self.stored_kwh)?;
        if let Some(pct) = self.stored_percent {
            write!(f, " ({pct:>5.1}%)")?;
        }
        write!(
            f,
            " | grid={:>6.2} kWh  spilled={:>6.2} kWh",
            self.grid_draw_kwh, self.spilled_kwh
        )
    }
}

/// Reporting resolution of an event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Hourly,
    Daily,
    Weekly,
    Monthly,
}

impl Granularity {
    /// All granularities, finest first.
    pub const ALL: [Granularity; 4] = [
        Granularity::Hourly,
        Granularity::Daily,
        Granularity::Weekly,
        Granularity::Monthly,
    ];

    /// Number of periods the monthly fee is spread across.
    pub fn periods_per_month(self) -> f64 {
        match self {
            Granularity::Hourly => 720.0,
            Granularity::Daily => 30.0,
            Granularity::Weekly => 4.0,
            Granularity::Monthly => 1.0,
        }
    }

    /// Hours covered by one period; months are treated as 30 days.
    pub fn hours_per_period(self) -> usize {
        match self {
            Granularity::Hourly => 1,
            Granularity::Daily => 24,
            Granularity::Weekly => 24 * 7,
            Granularity::Monthly => 24 * 30,
        }
    }

    /// Lowercase name as used in configuration files.
    pub fn as_str(self) -> &'static str {
        match self {
            Granularity::Hourly => "hourly",
            Granularity::Daily => "daily",
            Granularity::Weekly => "weekly",
            Granularity::Monthly => "monthly",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One externally supplied period-level financial record, typically a month.
///
/// `loss_euros` is kept at or below zero; sources reporting it as a positive
/// magnitude are normalised by [`LedgerRow::normalized_loss`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerRow {
    /// `YYYY-MM` identifier, unique within a ledger.
    pub period_key: String,
    /// Price paid for injected energy (cents/kWh).
    pub injection_price_cents_kwh: f64,
    pub energy_charged_kwh: f64,
    pub energy_discharged_kwh: f64,
    pub battery_end_state_kwh: f64,
    /// Value of the energy held in storage at period end.
    pub stored_value_euros: f64,
    /// Change in stored value over the period.
    pub stored_value_variation_euros: f64,
    /// Cost of drawing from the grid instead of self-consuming.
    pub loss_euros: f64,
    /// Avoided cost from self-consumption plus change in stored value.
    pub gain_euros: f64,
    /// Net of loss, gain, and the monthly fee.
    pub total_gain_euros: f64,
}

impl LedgerRow {
    /// Loss with the sign fixed to `<= 0`.
    pub fn normalized_loss(&self) -> f64 {
        -self.loss_euros.abs()
    }

    /// `loss + gain - monthly_fee`, the value `total_gain_euros` must match.
    pub fn expected_total_gain(&self, monthly_fee: f64) -> f64 {
        self.normalized_loss() + self.gain_euros - monthly_fee
    }
}
