//! TOML-based valuation configuration and preset definitions.

use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;
use thiserror::Error;

use crate::error::EngineError;
use crate::sim::accumulator::{Accumulator, StoragePolicy};
use crate::sim::types::Granularity;
use crate::sim::valuation::Valuator;

/// Top-level configuration parsed from TOML.
///
/// Missing tariff, report, and source fields default to the `hourly`
/// preset; a missing battery section means an empty, unbounded ledger. Load
/// from TOML with [`ValuationConfig::from_toml_file`] or pick a preset with
/// [`ValuationConfig::from_preset`].
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValuationConfig {
    /// Prices and fees.
    #[serde(default)]
    pub tariff: TariffConfig,
    /// Virtual battery capacity and starting charge.
    #[serde(default)]
    pub battery: BatteryConfig,
    /// Reporting resolution.
    #[serde(default)]
    pub report: ReportConfig,
    /// Synthetic event source parameters.
    #[serde(default)]
    pub source: SourceConfig,
}

/// Prices and fees.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TariffConfig {
    /// Base electricity price (currency/kWh, must be > 0).
    pub base_price_per_kwh: f64,
    /// Fixed monthly fee (currency, must be >= 0).
    pub monthly_fee: f64,
}

impl Default for TariffConfig {
    fn default() -> Self {
        Self {
            base_price_per_kwh: 0.30,
            monthly_fee: 10.0,
        }
    }
}

/// Virtual battery capacity and starting charge.
///
/// Without a capacity the ledger is unbounded kWh. The starting charge is
/// given either in kWh or, when a capacity is set, as a percentage.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatteryConfig {
    /// Capacity ceiling (kWh, > 0); `None` for an unbounded ledger.
    pub capacity_kwh: Option<f64>,
    /// Starting charge (kWh, >= 0).
    pub starting_charge_kwh: Option<f64>,
    /// Starting charge as a percentage of capacity (0–100).
    pub starting_charge_pct: Option<f64>,
}

/// Reporting resolution.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportConfig {
    /// `hourly`, `daily`, `weekly`, or `monthly`.
    pub granularity: Granularity,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            granularity: Granularity::Hourly,
        }
    }
}

/// Synthetic event source parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceConfig {
    /// Random seed.
    pub seed: u64,
    /// Number of periods to generate (must be > 0).
    pub periods: usize,
    /// Date of the first period.
    pub start_date: NaiveDate,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            periods: 24,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("config error: {field}: {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"tariff.base_price_per_kwh"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl ValuationConfig {
    /// Hourly view of one day: 10 kWh battery starting half full.
    pub fn hourly() -> Self {
        Self {
            tariff: TariffConfig::default(),
            battery: BatteryConfig {
                capacity_kwh: Some(10.0),
                starting_charge_kwh: None,
                starting_charge_pct: Some(50.0),
            },
            report: ReportConfig::default(),
            source: SourceConfig::default(),
        }
    }

    /// Daily view of one month on an unbounded ledger.
    pub fn daily() -> Self {
        Self::unbounded(Granularity::Daily, 10.0, 30)
    }

    /// Weekly view of a quarter on an unbounded ledger.
    pub fn weekly() -> Self {
        Self::unbounded(Granularity::Weekly, 25.0, 13)
    }

    /// Monthly view of one year on an unbounded ledger.
    pub fn monthly() -> Self {
        Self::unbounded(Granularity::Monthly, 50.0, 12)
    }

    fn unbounded(granularity: Granularity, starting_charge_kwh: f64, periods: usize) -> Self {
        Self {
            tariff: TariffConfig::default(),
            battery: BatteryConfig {
                capacity_kwh: None,
                starting_charge_kwh: Some(starting_charge_kwh),
                starting_charge_pct: None,
            },
            report: ReportConfig { granularity },
            source: SourceConfig {
                periods,
                ..SourceConfig::default()
            },
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["hourly", "daily", "weekly", "monthly"];

    /// Loads a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "hourly" => Ok(Self::hourly()),
            "daily" => Ok(Self::daily()),
            "weekly" => Ok(Self::weekly()),
            "monthly" => Ok(Self::monthly()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("config", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if the configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        let t = &self.tariff;
        if !t.base_price_per_kwh.is_finite() || t.base_price_per_kwh <= 0.0 {
            errors.push(ConfigError::new("tariff.base_price_per_kwh", "must be > 0"));
        }
        if !t.monthly_fee.is_finite() || t.monthly_fee < 0.0 {
            errors.push(ConfigError::new("tariff.monthly_fee", "must be >= 0"));
        }

        let b = &self.battery;
        if let Some(cap) = b.capacity_kwh {
            if !cap.is_finite() || cap <= 0.0 {
                errors.push(ConfigError::new("battery.capacity_kwh", "must be > 0"));
            }
        }
        match (b.starting_charge_kwh, b.starting_charge_pct) {
            (Some(_), Some(_)) => errors.push(ConfigError::new(
                "battery.starting_charge_kwh",
                "set either starting_charge_kwh or starting_charge_pct, not both",
            )),
            (Some(kwh), None) => {
                if !kwh.is_finite() || kwh < 0.0 {
                    errors.push(ConfigError::new("battery.starting_charge_kwh", "must be >= 0"));
                } else if b.capacity_kwh.is_some_and(|cap| kwh > cap) {
                    errors.push(ConfigError::new(
                        "battery.starting_charge_kwh",
                        "must be <= battery.capacity_kwh",
                    ));
                }
            }
            (None, Some(pct)) => {
                if b.capacity_kwh.is_none() {
                    errors.push(ConfigError::new(
                        "battery.starting_charge_pct",
                        "requires battery.capacity_kwh",
                    ));
                }
                if !(0.0..=100.0).contains(&pct) {
                    errors.push(ConfigError::new(
                        "battery.starting_charge_pct",
                        "must be in [0, 100]",
                    ));
                }
            }
            (None, None) => {}
        }

        if self.source.periods == 0 {
            errors.push(ConfigError::new("source.periods", "must be > 0"));
        }

        errors
    }

    /// Clamping policy implied by the battery section.
    pub fn storage_policy(&self) -> StoragePolicy {
        match self.battery.capacity_kwh {
            Some(capacity_kwh) => StoragePolicy::Bounded { capacity_kwh },
            None => StoragePolicy::Unbounded,
        }
    }

    /// Starting charge in kWh, resolving a percentage against the capacity.
    pub fn starting_charge_kwh(&self) -> f64 {
        let b = &self.battery;
        match (b.starting_charge_kwh, b.starting_charge_pct, b.capacity_kwh) {
            (Some(kwh), _, _) => kwh,
            (None, Some(pct), Some(cap)) => cap * pct / 100.0,
            _ => 0.0,
        }
    }

    /// Builds the accumulator for this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Configuration`] for an invalid capacity or starting charge.
    pub fn accumulator(&self) -> Result<Accumulator, EngineError> {
        Accumulator::new(self.storage_policy(), self.starting_charge_kwh())
    }

    /// Builds the valuator for this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Configuration`] for an invalid price or fee.
    pub fn valuator(&self) -> Result<Valuator, EngineError> {
        Valuator::new(
            self.tariff.base_price_per_kwh,
            self.tariff.monthly_fee,
            self.report.granularity,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hourly_preset_valid() {
        let cfg = ValuationConfig::hourly();
        let errors = cfg.validate();
        assert!(errors.is_empty(), "hourly should be valid: {errors:?}");
        assert_eq!(cfg.starting_charge_kwh(), 5.0);
        assert_eq!(cfg.storage_policy(), StoragePolicy::Bounded { capacity_kwh: 10.0 });
    }

    #[test]
    fn all_presets_are_valid() {
        for name in ValuationConfig::PRESETS {
            let cfg = ValuationConfig::from_preset(name);
            assert!(cfg.is_ok(), "preset \"{name}\" should load");
            let errors = cfg.as_ref().map(|c| c.validate()).unwrap_or_default();
            assert!(errors.is_empty(), "preset \"{name}\" should be valid: {errors:?}");
            assert!(cfg.as_ref().is_ok_and(|c| c.accumulator().is_ok()));
            assert!(cfg.as_ref().is_ok_and(|c| c.valuator().is_ok()));
        }
    }

    #[test]
    fn coarser_presets_start_fuller() {
        let hourly = ValuationConfig::hourly().starting_charge_kwh();
        let monthly = ValuationConfig::monthly().starting_charge_kwh();
        assert!(monthly > hourly);
        assert_eq!(ValuationConfig::monthly().storage_policy(), StoragePolicy::Unbounded);
    }

    #[test]
    fn from_preset_unknown() {
        let err = ValuationConfig::from_preset("yearly");
        assert!(err.as_ref().is_err_and(|e| e.message.contains("unknown preset")));
    }

    #[test]
    fn valid_toml_parses() {
        let toml = r#"
[tariff]
base_price_per_kwh = 0.25
monthly_fee = 12.5

[battery]
starting_charge_kwh = 40.0

[report]
granularity = "monthly"

[source]
seed = 7
periods = 12
start_date = "2023-01-01"
"#;
        let cfg = ValuationConfig::from_toml_str(toml);
        assert!(cfg.is_ok(), "valid TOML should parse: {:?}", cfg.err());
        let cfg = cfg.ok();
        assert_eq!(cfg.as_ref().map(|c| c.report.granularity), Some(Granularity::Monthly));
        assert_eq!(cfg.as_ref().map(|c| c.tariff.monthly_fee), Some(12.5));
        assert_eq!(cfg.as_ref().map(|c| c.starting_charge_kwh()), Some(40.0));
        assert_eq!(cfg.as_ref().map(|c| c.storage_policy()), Some(StoragePolicy::Unbounded));
        assert!(cfg.as_ref().is_some_and(|c| c.validate().is_empty()));
    }

    #[test]
    fn invalid_toml_unknown_field() {
        let toml = r#"
[tariff]
base_price_per_kwh = 0.25
bogus_field = true
"#;
        assert!(ValuationConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn unknown_granularity_rejected() {
        let toml = r#"
[report]
granularity = "yearly"
"#;
        assert!(ValuationConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn validation_catches_bad_price_and_fee() {
        let mut cfg = ValuationConfig::hourly();
        cfg.tariff.base_price_per_kwh = 0.0;
        cfg.tariff.monthly_fee = -1.0;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "tariff.base_price_per_kwh"));
        assert!(errors.iter().any(|e| e.field == "tariff.monthly_fee"));
        assert!(cfg.valuator().is_err());
    }

    #[test]
    fn validation_catches_percent_without_capacity() {
        let mut cfg = ValuationConfig::hourly();
        cfg.battery.capacity_kwh = None;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "battery.starting_charge_pct"));
    }

    #[test]
    fn validation_catches_start_above_capacity() {
        let mut cfg = ValuationConfig::hourly();
        cfg.battery.starting_charge_pct = None;
        cfg.battery.starting_charge_kwh = Some(12.0);
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "battery.starting_charge_kwh"));
        assert!(cfg.accumulator().is_err());
    }

    #[test]
    fn validation_catches_zero_periods() {
        let mut cfg = ValuationConfig::daily();
        cfg.source.periods = 0;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "source.periods"));
    }
}
