//! Folds an ordered event stream into a stored-energy series.

use tracing::debug;

use super::types::{EnergyEvent, StoredEnergyPoint};
use crate::error::EngineError;

/// Clamping policy applied after every event.
///
/// The floor is always zero: a virtual battery cannot incur energy debt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StoragePolicy {
    /// Only the zero floor applies; stored energy may grow without limit.
    Unbounded,
    /// Stored energy is capped at `capacity_kwh`; surplus is discarded, not carried.
    Bounded { capacity_kwh: f64 },
}

impl StoragePolicy {
    /// Upper clamp bound, if any.
    pub fn ceiling(&self) -> Option<f64> {
        match *self {
            StoragePolicy::Unbounded => None,
            StoragePolicy::Bounded { capacity_kwh } => Some(capacity_kwh),
        }
    }
}

/// Virtual battery accumulator.
///
/// Holds no state between runs: each call to [`Accumulator::run`] starts
/// again from the configured starting charge.
///
/// # Examples
///
/// ```
/// use vbat_sim::sim::accumulator::{Accumulator, StoragePolicy};
/// use vbat_sim::sim::types::EnergyEvent;
///
/// let acc = Accumulator::new(StoragePolicy::Unbounded, 2.0).unwrap();
/// let events = vec![
///     EnergyEvent::new("h0", 5.0, 0.0),
///     EnergyEvent::new("h1", 0.0, -3.0),
///     EnergyEvent::new("h2", 0.0, -4.0),
/// ];
/// let stored: Vec<f64> = acc.run(&events).unwrap().iter().map(|p| p.stored_kwh).collect();
/// assert_eq!(stored, vec![7.0, 4.0, 0.0]);
/// ```
#[derive(Debug, Clone)]
pub struct Accumulator {
    policy: StoragePolicy,
    starting_charge_kwh: f64,
}

impl Accumulator {
    /// Creates an accumulator seeded with `starting_charge_kwh`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Configuration`] if the capacity is not a
    /// positive finite number, or the starting charge is negative, non-finite,
    /// or above the capacity.
    pub fn new(policy: StoragePolicy, starting_charge_kwh: f64) -> Result<Self, EngineError> {
        if let Some(cap) = policy.ceiling() {
            if !cap.is_finite() || cap <= 0.0 {
                return Err(EngineError::config("battery.capacity_kwh", "must be > 0"));
            }
            if starting_charge_kwh > cap {
                return Err(EngineError::config(
                    "battery.starting_charge_kwh",
                    format!("must be <= capacity ({cap} kWh)"),
                ));
            }
        }
        if !starting_charge_kwh.is_finite() || starting_charge_kwh < 0.0 {
            return Err(EngineError::config(
                "battery.starting_charge_kwh",
                "must be >= 0",
            ));
        }
        Ok(Self {
            policy,
            starting_charge_kwh,
        })
    }

    pub fn policy(&self) -> StoragePolicy {
        self.policy
    }

    pub fn starting_charge_kwh(&self) -> f64 {
        self.starting_charge_kwh
    }

    /// Produces one point per event, in event order.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::MalformedRow`] for the first event violating the
    /// flow sign conventions; no partial series is returned.
    pub fn run(&self, events: &[EnergyEvent]) -> Result<Vec<StoredEnergyPoint>, EngineError> {
        let ceiling = self.policy.ceiling();
        let mut stored = self.starting_charge_kwh;
        let mut points = Vec::with_capacity(events.len());

        for event in events {
            event.validate()?;
            let unclamped = stored + event.net_flow_kwh();

            let grid_draw_kwh = unclamped.min(0.0);
            let spilled_kwh = ceiling.map_or(0.0, |cap| (unclamped - cap).max(0.0));
            stored = match ceiling {
                Some(cap) => unclamped.clamp(0.0, cap),
                None => unclamped.max(0.0),
            };

            points.push(StoredEnergyPoint {
                timestamp: event.timestamp.clone(),
                stored_kwh: round2(stored),
                stored_percent: ceiling.map(|cap| round2(stored / cap * 100.0)),
                grid_draw_kwh: round2(grid_draw_kwh),
                spilled_kwh: round2(spilled_kwh),
            });
        }

        debug!(
            events = events.len(),
            start_kwh = self.starting_charge_kwh,
            end_kwh = stored,
            "accumulated stored-energy series"
        );
        Ok(points)
    }
}

/// Net flow per event rounded to 2 decimals, for display.
pub fn net_energy_series(events: &[EnergyEvent]) -> Vec<(String, f64)> {
    events
        .iter()
        .map(|e| (e.timestamp.clone(), round2(e.net_flow_kwh())))
        .collect()
}

pub(crate) fn round2(v: f64) -> f64 {
    // Keep -0.0 out of the output.
    let r = (v * 100.0).round() / 100.0;
    if r == 0.0 { 0.0 } else { r }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(prod: f64, cons: f64) -> EnergyEvent {
        EnergyEvent::new("t", prod, cons)
    }

    fn stored(points: &[StoredEnergyPoint]) -> Vec<f64> {
        points.iter().map(|p| p.stored_kwh).collect()
    }

    #[test]
    fn unbounded_clamps_at_zero() {
        let acc = Accumulator::new(StoragePolicy::Unbounded, 2.0).unwrap();
        let points = acc
            .run(&[ev(5.0, 0.0), ev(0.0, -3.0), ev(0.0, -4.0)])
            .unwrap();
        assert_eq!(stored(&points), vec![7.0, 4.0, 0.0]);
        assert_eq!(points[2].grid_draw_kwh, 0.0);
        assert!(points.iter().all(|p| p.stored_percent.is_none()));
    }

    #[test]
    fn deficit_is_reported_as_grid_draw() {
        let acc = Accumulator::new(StoragePolicy::Unbounded, 1.0).unwrap();
        let points = acc.run(&[ev(0.0, -3.5)]).unwrap();
        assert_eq!(points[0].stored_kwh, 0.0);
        assert_eq!(points[0].grid_draw_kwh, -2.5);
    }

    #[test]
    fn bounded_discards_surplus() {
        let acc = Accumulator::new(StoragePolicy::Bounded { capacity_kwh: 10.0 }, 8.0).unwrap();
        let points = acc.run(&[ev(5.0, 0.0), ev(0.0, -1.0)]).unwrap();
        assert_eq!(stored(&points), vec![10.0, 9.0]);
        assert_eq!(points[0].spilled_kwh, 3.0);
        assert_eq!(points[0].stored_percent, Some(100.0));
        assert_eq!(points[1].stored_percent, Some(90.0));
    }

    #[test]
    fn unbounded_grows_without_limit() {
        let acc = Accumulator::new(StoragePolicy::Unbounded, 0.0).unwrap();
        let events: Vec<_> = (0..100).map(|_| ev(10.0, 0.0)).collect();
        let points = acc.run(&events).unwrap();
        assert_eq!(points.last().map(|p| p.stored_kwh), Some(1000.0));
        assert!(points.iter().all(|p| p.spilled_kwh == 0.0));
    }

    #[test]
    fn external_draw_reduces_storage() {
        let acc = Accumulator::new(StoragePolicy::Unbounded, 5.0).unwrap();
        let points = acc
            .run(&[ev(1.0, -1.0).with_external_draw(-2.0)])
            .unwrap();
        assert_eq!(points[0].stored_kwh, 3.0);
    }

    #[test]
    fn zero_flows_keep_starting_charge() {
        let acc = Accumulator::new(StoragePolicy::Bounded { capacity_kwh: 10.0 }, 4.2).unwrap();
        let events: Vec<_> = (0..24).map(|_| ev(0.0, 0.0)).collect();
        let points = acc.run(&events).unwrap();
        assert!(points.iter().all(|p| p.stored_kwh == 4.2));
    }

    #[test]
    fn empty_input_yields_empty_series() {
        let acc = Accumulator::new(StoragePolicy::Unbounded, 3.0).unwrap();
        assert!(acc.run(&[]).unwrap().is_empty());
    }

    #[test]
    fn rounding_is_presentation_only() {
        let acc = Accumulator::new(StoragePolicy::Unbounded, 0.0).unwrap();
        let events = vec![ev(0.004, 0.0); 3];
        let points = acc.run(&events).unwrap();
        // running value 0.012 is carried unrounded
        assert_eq!(stored(&points), vec![0.0, 0.01, 0.01]);
    }

    #[test]
    fn malformed_event_rejects_whole_run() {
        let acc = Accumulator::new(StoragePolicy::Unbounded, 0.0).unwrap();
        let result = acc.run(&[ev(1.0, 0.0), ev(-1.0, 0.0)]);
        assert!(matches!(result, Err(EngineError::MalformedRow { .. })));
    }

    #[test]
    fn invalid_configuration_rejected() {
        assert!(Accumulator::new(StoragePolicy::Bounded { capacity_kwh: 0.0 }, 0.0).is_err());
        assert!(Accumulator::new(StoragePolicy::Unbounded, -1.0).is_err());
        assert!(Accumulator::new(StoragePolicy::Bounded { capacity_kwh: 5.0 }, 6.0).is_err());
    }

    #[test]
    fn net_series_is_rounded() {
        let series = net_energy_series(&[ev(1.234, -0.5)]);
        assert_eq!(series, vec![("t".to_string(), 0.73)]);
    }
}
