//! Monetary valuation of energy flows and ledger rows.
//!
//! Two computation paths produce the same [`PeriodValuation`] shape:
//!
//! - **derived**: loss, gain, and fee computed from raw energy events and the
//!   base price, used when no financial ledger exists;
//! - **ledger**: loss and gain taken from externally supplied rows, with the
//!   total recomputed and checked against the stated one.
//!
//! When both are available the ledger wins.

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info};

use super::aggregate::{decimal_from_f64, decimal_to_f64};
use super::tariff::OFF_PEAK_MULTIPLIER;
use super::types::{EnergyEvent, Granularity, LedgerRow, StoredEnergyPoint};
use crate::error::EngineError;

/// Largest tolerated gap between a stated and recomputed ledger total (euros).
pub const TOTAL_GAIN_TOLERANCE: f64 = 0.01;

/// Financial figures for one reporting period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodValuation {
    pub period_label: String,
    /// Cost of drawing from the grid (<= 0).
    pub loss: f64,
    /// Value of production (>= 0).
    pub gain: f64,
    /// Share of the monthly fee charged to this period (<= 0).
    pub fee: f64,
    /// `gain + loss + fee`.
    pub total_gain: f64,
}

/// Which path produced a set of valuations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ValuationSource {
    Derived,
    Ledger,
}

/// Estimated savings from storing energy instead of buying it at the normal rate.
///
/// Every stored kWh is assumed to have been charged at the off-peak rate.
/// Nothing checks when charging actually happened, so this is an upper-bound
/// estimate, not metered fact.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Savings {
    /// Sum of per-sample savings.
    pub total: Decimal,
    /// Number of samples summed.
    pub samples: usize,
}

impl Savings {
    pub fn total_f64(&self) -> f64 {
        decimal_to_f64(self.total)
    }
}

/// Values energy flows under a flat base price and a fixed monthly fee.
#[derive(Debug, Clone)]
pub struct Valuator {
    base_price_per_kwh: f64,
    monthly_fee: f64,
    granularity: Granularity,
}

impl Valuator {
    /// Creates a valuator.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Configuration`] if `base_price_per_kwh <= 0` or
    /// `monthly_fee < 0`, or either is not finite.
    pub fn new(
        base_price_per_kwh: f64,
        monthly_fee: f64,
        granularity: Granularity,
    ) -> Result<Self, EngineError> {
        if !base_price_per_kwh.is_finite() || base_price_per_kwh <= 0.0 {
            return Err(EngineError::config(
                "tariff.base_price_per_kwh",
                "must be > 0",
            ));
        }
        if !monthly_fee.is_finite() || monthly_fee < 0.0 {
            return Err(EngineError::config("tariff.monthly_fee", "must be >= 0"));
        }
        Ok(Self {
            base_price_per_kwh,
            monthly_fee,
            granularity,
        })
    }

    pub fn base_price_per_kwh(&self) -> f64 {
        self.base_price_per_kwh
    }

    pub fn monthly_fee(&self) -> f64 {
        self.monthly_fee
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// Fee charged per period at the configured granularity (<= 0).
    pub fn fee_per_period(&self) -> f64 {
        -self.monthly_fee / self.granularity.periods_per_month()
    }

    /// Derived path: values each event from its flows.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::MalformedRow`] for an event violating the flow
    /// sign conventions.
    pub fn derive(&self, events: &[EnergyEvent]) -> Result<Vec<PeriodValuation>, EngineError> {
        let fee = self.fee_per_period();
        let rows = events
            .iter()
            .map(|event| {
                event.validate()?;
                let loss = if event.excess_consumption_kwh < 0.0 {
                    -event.excess_consumption_kwh.abs() * self.base_price_per_kwh
                } else {
                    0.0
                };
                let gain = if event.excess_production_kwh > 0.0 {
                    event.excess_production_kwh * self.base_price_per_kwh
                } else {
                    0.0
                };
                Ok(PeriodValuation {
                    period_label: event.timestamp.clone(),
                    loss,
                    gain,
                    fee,
                    total_gain: gain + loss + fee,
                })
            })
            .collect::<Result<Vec<_>, EngineError>>()?;

        debug!(periods = rows.len(), granularity = %self.granularity, "derived valuation");
        Ok(rows)
    }

    /// Ledger path: passes loss and gain through and checks each stated total.
    ///
    /// Ledger rows are monthly, so every row carries the full monthly fee.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::MalformedRow`] when a value is not finite or the
    /// stated `total_gain_euros` differs from `loss + gain - monthly_fee` by
    /// more than [`TOTAL_GAIN_TOLERANCE`].
    pub fn from_ledger(&self, rows: &[LedgerRow]) -> Result<Vec<PeriodValuation>, EngineError> {
        let valuations = rows
            .iter()
            .map(|row| {
                for (name, v) in [
                    ("loss_euros", row.loss_euros),
                    ("gain_euros", row.gain_euros),
                    ("total_gain_euros", row.total_gain_euros),
                ] {
                    if !v.is_finite() {
                        return Err(EngineError::malformed(
                            &row.period_key,
                            format!("{name} is not a finite number"),
                        ));
                    }
                }

                let expected = row.expected_total_gain(self.monthly_fee);
                if (expected - row.total_gain_euros).abs() > TOTAL_GAIN_TOLERANCE {
                    return Err(EngineError::malformed(
                        &row.period_key,
                        format!(
                            "total_gain_euros {:.2} does not match loss + gain - fee = {expected:.2}",
                            row.total_gain_euros
                        ),
                    ));
                }

                Ok(PeriodValuation {
                    period_label: row.period_key.clone(),
                    loss: row.normalized_loss(),
                    gain: row.gain_euros,
                    fee: -self.monthly_fee,
                    total_gain: expected,
                })
            })
            .collect::<Result<Vec<_>, EngineError>>()?;

        debug!(periods = valuations.len(), "ledger valuation");
        Ok(valuations)
    }

    /// Values a period set, preferring ledger rows whenever a ledger is supplied.
    ///
    /// An empty ledger slice still counts as a ledger and yields no rows.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`Valuator::from_ledger`] or [`Valuator::derive`].
    pub fn value(
        &self,
        ledger: Option<&[LedgerRow]>,
        events: &[EnergyEvent],
    ) -> Result<(ValuationSource, Vec<PeriodValuation>), EngineError> {
        match ledger {
            Some(rows) => {
                info!(rows = rows.len(), "valuing from ledger rows");
                Ok((ValuationSource::Ledger, self.from_ledger(rows)?))
            }
            None => {
                info!(events = events.len(), "no ledger, deriving valuation from events");
                Ok((ValuationSource::Derived, self.derive(events)?))
            }
        }
    }

    /// Savings attributable to off-peak charging of every stored sample.
    ///
    /// Per sample: `normal = stored * base_price`, `off_peak = normal * 0.75`,
    /// `saving = normal - off_peak`. See [`Savings`] for the assumption involved.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::MalformedRow`], keyed by the sample timestamp,
    /// when a saving has no decimal representation or would overflow the total.
    pub fn savings(&self, points: &[StoredEnergyPoint]) -> Result<Savings, EngineError> {
        let total = points.iter().try_fold(Decimal::ZERO, |acc, p| {
            let saving = self.savings_for_sample(p.stored_kwh);
            let saving = decimal_from_f64(saving).ok_or_else(|| {
                EngineError::malformed(&p.timestamp, "saving is not representable as a decimal")
            })?;
            acc.checked_add(saving)
                .ok_or_else(|| EngineError::malformed(&p.timestamp, "saving overflows the total"))
        })?;
        Ok(Savings {
            total,
            samples: points.len(),
        })
    }

    /// Saving for a single stored-energy sample.
    pub fn savings_for_sample(&self, stored_kwh: f64) -> f64 {
        let normal_cost = stored_kwh * self.base_price_per_kwh;
        let off_peak_cost = normal_cost * OFF_PEAK_MULTIPLIER;
        normal_cost - off_peak_cost
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn valuator(granularity: Granularity) -> Valuator {
        Valuator::new(0.30, 10.0, granularity).unwrap()
    }

    fn point(stored_kwh: f64) -> StoredEnergyPoint {
        StoredEnergyPoint {
            timestamp: "t".to_string(),
            stored_kwh,
            stored_percent: None,
            grid_draw_kwh: 0.0,
            spilled_kwh: 0.0,
        }
    }

    #[test]
    fn rejects_bad_configuration() {
        assert!(Valuator::new(0.0, 10.0, Granularity::Monthly).is_err());
        assert!(Valuator::new(-0.1, 10.0, Granularity::Monthly).is_err());
        assert!(Valuator::new(0.3, -1.0, Granularity::Monthly).is_err());
        assert!(Valuator::new(f64::NAN, 1.0, Granularity::Monthly).is_err());
        assert!(Valuator::new(0.3, 0.0, Granularity::Monthly).is_ok());
    }

    #[test]
    fn fee_is_apportioned_by_granularity() {
        assert_relative_eq!(valuator(Granularity::Monthly).fee_per_period(), -10.0);
        assert_relative_eq!(valuator(Granularity::Weekly).fee_per_period(), -2.5);
        assert_relative_eq!(valuator(Granularity::Daily).fee_per_period(), -10.0 / 30.0);
    }

    #[test]
    fn derived_signs_and_total() {
        let v = valuator(Granularity::Monthly);
        let rows = v
            .derive(&[
                EnergyEvent::new("2024-01", 100.0, 0.0),
                EnergyEvent::new("2024-02", 0.0, -50.0),
                EnergyEvent::new("2024-03", 20.0, -10.0),
            ])
            .unwrap();

        assert_relative_eq!(rows[0].gain, 30.0);
        assert_eq!(rows[0].loss, 0.0);
        assert_relative_eq!(rows[0].total_gain, 20.0);

        assert_eq!(rows[1].gain, 0.0);
        assert_relative_eq!(rows[1].loss, -15.0);
        assert_relative_eq!(rows[1].total_gain, -25.0);

        assert_relative_eq!(rows[2].gain, 6.0);
        assert_relative_eq!(rows[2].loss, -3.0);
        assert_relative_eq!(rows[2].total_gain, -7.0);

        for r in &rows {
            assert!(r.loss <= 0.0 && r.gain >= 0.0 && r.fee <= 0.0);
            assert_relative_eq!(r.total_gain, r.gain + r.loss + r.fee);
        }
    }

    #[test]
    fn ledger_passes_values_through() {
        let v = valuator(Granularity::Monthly);
        let row = LedgerRow {
            period_key: "2024-05".to_string(),
            loss_euros: -4.0,
            gain_euros: 20.0,
            total_gain_euros: 6.0,
            ..LedgerRow::default()
        };
        let out = v.from_ledger(&[row]).unwrap();
        assert_eq!(out[0].period_label, "2024-05");
        assert_eq!(out[0].loss, -4.0);
        assert_eq!(out[0].gain, 20.0);
        assert_eq!(out[0].fee, -10.0);
        assert_relative_eq!(out[0].total_gain, 6.0);
    }

    #[test]
    fn ledger_positive_loss_magnitude_is_normalised() {
        let v = valuator(Granularity::Monthly);
        let row = LedgerRow {
            period_key: "2024-05".to_string(),
            loss_euros: 4.0,
            gain_euros: 20.0,
            total_gain_euros: 6.0,
            ..LedgerRow::default()
        };
        let out = v.from_ledger(&[row]).unwrap();
        assert_eq!(out[0].loss, -4.0);
    }

    #[test]
    fn ledger_total_mismatch_is_malformed() {
        let v = valuator(Granularity::Monthly);
        let row = LedgerRow {
            period_key: "2024-05".to_string(),
            loss_euros: -4.0,
            gain_euros: 20.0,
            total_gain_euros: 16.0,
            ..LedgerRow::default()
        };
        let err = v.from_ledger(&[row]);
        assert!(matches!(err, Err(EngineError::MalformedRow { ref key, .. }) if key == "2024-05"));
    }

    #[test]
    fn ledger_preferred_when_present() {
        let v = valuator(Granularity::Monthly);
        let events = vec![EnergyEvent::new("2024-01", 10.0, 0.0)];
        let (source, rows) = v.value(Some(&[]), &events).unwrap();
        assert_eq!(source, ValuationSource::Ledger);
        assert!(rows.is_empty());

        let (source, rows) = v.value(None, &events).unwrap();
        assert_eq!(source, ValuationSource::Derived);
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn savings_assume_off_peak_charging() {
        let v = Valuator::new(0.25, 10.0, Granularity::Hourly).unwrap();
        assert_relative_eq!(v.savings_for_sample(4.0), 0.25);
        let s = v.savings(&[point(4.0), point(8.0), point(0.0)]).unwrap();
        assert_eq!(s.samples, 3);
        assert_relative_eq!(s.total_f64(), 0.75);
    }

    #[test]
    fn savings_of_empty_series_is_zero() {
        let s = valuator(Granularity::Hourly).savings(&[]).unwrap();
        assert_eq!(s.total, Decimal::ZERO);
        assert_eq!(s.samples, 0);
    }

    #[test]
    fn oversized_sample_is_rejected_not_zeroed() {
        let v = valuator(Granularity::Hourly);
        let mut big = point(1e31);
        big.timestamp = "2024-01-01 10:00".to_string();
        let err = v.savings(&[point(4.0), big]);
        assert!(
            matches!(err, Err(EngineError::MalformedRow { ref key, .. }) if key == "2024-01-01 10:00")
        );
    }

    #[test]
    fn savings_total_overflow_is_rejected() {
        let v = valuator(Granularity::Hourly);
        // each saving is 7.5e28, inside the decimal range; their sum is not
        let err = v.savings(&[point(1e30), point(1e30)]);
        assert!(matches!(err, Err(EngineError::MalformedRow { .. })));
    }
}
