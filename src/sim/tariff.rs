//! Time-of-use tariff classification.

use std::fmt;

use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};
use serde::Serialize;

/// Multiplier applied during peak hours.
pub const PEAK_MULTIPLIER: f64 = 1.06;
/// Multiplier applied during off-peak hours.
pub const OFF_PEAK_MULTIPLIER: f64 = 0.75;
/// Multiplier applied at all other times.
pub const NORMAL_MULTIPLIER: f64 = 1.00;

/// Named time-of-use pricing tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TariffBand {
    Peak,
    OffPeak,
    Normal,
}

impl TariffBand {
    /// Fixed rate multiplier relative to the base price.
    pub fn multiplier(self) -> f64 {
        match self {
            TariffBand::Peak => PEAK_MULTIPLIER,
            TariffBand::OffPeak => OFF_PEAK_MULTIPLIER,
            TariffBand::Normal => NORMAL_MULTIPLIER,
        }
    }
}

impl fmt::Display for TariffBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TariffBand::Peak => "Peak Hours",
            TariffBand::OffPeak => "Off-Peak Hours",
            TariffBand::Normal => "Normal Hours",
        })
    }
}

/// Band and multiplier for one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TariffRate {
    pub band: TariffBand,
    pub multiplier: f64,
}

impl From<TariffBand> for TariffRate {
    fn from(band: TariffBand) -> Self {
        Self {
            band,
            multiplier: band.multiplier(),
        }
    }
}

/// Classifies an hour of day into a tariff band.
///
/// Peak runs 17:00–24:00 every day. Off-peak covers 00:00–06:00 every day,
/// plus 12:00–17:00 on weekends. Everything else is normal.
///
/// # Panics
///
/// Panics if `hour >= 24`.
///
/// # Examples
///
/// ```
/// use vbat_sim::sim::tariff::{classify, TariffBand};
///
/// assert_eq!(classify(18, false).band, TariffBand::Peak);
/// assert_eq!(classify(13, true).band, TariffBand::OffPeak);
/// assert_eq!(classify(13, false).band, TariffBand::Normal);
/// ```
pub fn classify(hour: u32, is_weekend: bool) -> TariffRate {
    assert!(hour < 24, "hour must be in 0..24, got {hour}");

    let band = match (hour, is_weekend) {
        (17..=23, _) => TariffBand::Peak,
        (0..=5, _) => TariffBand::OffPeak,
        (12..=16, true) => TariffBand::OffPeak,
        _ => TariffBand::Normal,
    };
    band.into()
}

/// Classifies a calendar instant; Saturday and Sunday count as weekend.
pub fn classify_at(at: NaiveDateTime) -> TariffRate {
    let is_weekend = matches!(at.weekday(), Weekday::Sat | Weekday::Sun);
    classify(at.hour(), is_weekend)
}

/// Value of stored energy at a given time: `stored_kwh * multiplier`.
pub fn real_time_value(stored_kwh: f64, hour: u32, is_weekend: bool) -> f64 {
    stored_kwh * classify(hour, is_weekend).multiplier
}

/// Band in force at `at` and the value of `stored_kwh` under it.
pub fn real_time_value_at(stored_kwh: f64, at: NaiveDateTime) -> (TariffRate, f64) {
    let rate = classify_at(at);
    (rate, stored_kwh * rate.multiplier)
}
