//! Date-range filtering and decimal-safe totals over ledger rows.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use serde::Serialize;
use tracing::debug;

use super::types::LedgerRow;
use crate::error::EngineError;

/// Inclusive calendar interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    from: NaiveDate,
    to: NaiveDate,
}

impl DateRange {
    /// Creates a range covering `from..=to`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Configuration`] if `from > to`; the bounds are
    /// never swapped silently.
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self, EngineError> {
        if from > to {
            return Err(EngineError::config(
                "range",
                format!("from ({from}) must not be after to ({to})"),
            ));
        }
        Ok(Self { from, to })
    }

    /// A range containing every representable date.
    pub fn unbounded() -> Self {
        Self {
            from: NaiveDate::MIN,
            to: NaiveDate::MAX,
        }
    }

    pub fn from(&self) -> NaiveDate {
        self.from
    }

    pub fn to(&self) -> NaiveDate {
        self.to
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }
}

/// Numeric ledger column that can be totalled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum FieldSelector {
    EnergyCharged,
    EnergyDischarged,
    BatteryEndState,
    StoredValue,
    StoredValueVariation,
    Loss,
    Gain,
    TotalGain,
}

impl FieldSelector {
    pub const ALL: [FieldSelector; 8] = [
        FieldSelector::EnergyCharged,
        FieldSelector::EnergyDischarged,
        FieldSelector::BatteryEndState,
        FieldSelector::StoredValue,
        FieldSelector::StoredValueVariation,
        FieldSelector::Loss,
        FieldSelector::Gain,
        FieldSelector::TotalGain,
    ];

    /// Reads the selected value from a row. Loss is read with its sign normalised.
    pub fn value(self, row: &LedgerRow) -> f64 {
        match self {
            FieldSelector::EnergyCharged => row.energy_charged_kwh,
            FieldSelector::EnergyDischarged => row.energy_discharged_kwh,
            FieldSelector::BatteryEndState => row.battery_end_state_kwh,
            FieldSelector::StoredValue => row.stored_value_euros,
            FieldSelector::StoredValueVariation => row.stored_value_variation_euros,
            FieldSelector::Loss => row.normalized_loss(),
            FieldSelector::Gain => row.gain_euros,
            FieldSelector::TotalGain => row.total_gain_euros,
        }
    }

    /// Column name as used in ledger files.
    pub fn column(self) -> &'static str {
        match self {
            FieldSelector::EnergyCharged => "energy_charged_kwh",
            FieldSelector::EnergyDischarged => "energy_discharged_kwh",
            FieldSelector::BatteryEndState => "battery_end_state_kwh",
            FieldSelector::StoredValue => "stored_value_euros",
            FieldSelector::StoredValueVariation => "stored_value_variation_euros",
            FieldSelector::Loss => "loss_not_injecting_euros",
            FieldSelector::Gain => "gain_not_drawing_euros",
            FieldSelector::TotalGain => "total_gain_euros",
        }
    }
}

/// Summed values per selected field.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Totals {
    /// Exact sums; round only when presenting.
    pub sums: BTreeMap<FieldSelector, Decimal>,
    /// Rows that fell inside the range.
    pub rows_matched: usize,
}

impl Totals {
    /// Exact total for `field`; zero when the field was not selected or nothing matched.
    pub fn decimal(&self, field: FieldSelector) -> Decimal {
        self.sums.get(&field).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn get(&self, field: FieldSelector) -> f64 {
        decimal_to_f64(self.decimal(field))
    }
}

impl fmt::Display for Totals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Range Totals ({} rows) ---", self.rows_matched)?;
        for (field, sum) in &self.sums {
            writeln!(f, "{:<30} {:>12}", field.column(), sum.round_dp(2))?;
        }
        Ok(())
    }
}

/// Parses a `YYYY-MM` period key into the first day of its month.
///
/// Only a four-digit year and a two-digit month are accepted, so valid keys
/// sort lexicographically in calendar order. Surrounding whitespace is ignored.
///
/// # Errors
///
/// Returns [`EngineError::MalformedRow`] if the key is not a calendar month.
pub fn parse_period_key(key: &str) -> Result<NaiveDate, EngineError> {
    let trimmed = key.trim();
    let bytes = trimmed.as_bytes();
    let well_formed = bytes.len() == 7
        && bytes[4] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 4 || b.is_ascii_digit());
    if !well_formed {
        return Err(EngineError::malformed(key, "period key is not a YYYY-MM month"));
    }
    NaiveDate::parse_from_str(&format!("{trimmed}-01"), "%Y-%m-%d")
        .map_err(|_| EngineError::malformed(key, "period key is not a calendar month"))
}

/// Totals the selected fields of every row whose month starts inside `range`.
///
/// A row is kept when the first day of its month lies in `[from, to]`. Input
/// order does not affect the result and the rows are not modified.
///
/// # Errors
///
/// Returns [`EngineError::MalformedRow`] for the first row whose period key
/// cannot be parsed, whose selected value has no decimal representation, or
/// whose value would overflow the running total. No partial totals are
/// returned.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeSet;
/// use vbat_sim::sim::aggregate::{aggregate, DateRange, FieldSelector};
/// use vbat_sim::sim::types::LedgerRow;
///
/// let rows = vec![LedgerRow { period_key: "2024-01".into(), total_gain_euros: 5.0, ..Default::default() }];
/// let fields = BTreeSet::from([FieldSelector::TotalGain]);
/// let totals = aggregate(&rows, &DateRange::unbounded(), &fields).unwrap();
/// assert_eq!(totals.get(FieldSelector::TotalGain), 5.0);
/// ```
pub fn aggregate(
    rows: &[LedgerRow],
    range: &DateRange,
    fields: &BTreeSet<FieldSelector>,
) -> Result<Totals, EngineError> {
    let mut totals = Totals {
        sums: fields.iter().map(|f| (*f, Decimal::ZERO)).collect(),
        rows_matched: 0,
    };

    for row in rows {
        let month = parse_period_key(&row.period_key)?;
        if !range.contains(month) {
            continue;
        }
        totals.rows_matched += 1;
        for field in fields {
            let value = decimal_from_f64(field.value(row)).ok_or_else(|| {
                EngineError::malformed(
                    &row.period_key,
                    format!("{} is not representable as a decimal", field.column()),
                )
            })?;
            if let Some(sum) = totals.sums.get_mut(field) {
                *sum = sum.checked_add(value).ok_or_else(|| {
                    EngineError::malformed(
                        &row.period_key,
                        format!("{} overflows the range total", field.column()),
                    )
                })?;
            }
        }
    }

    debug!(
        rows = rows.len(),
        matched = totals.rows_matched,
        from = %range.from,
        to = %range.to,
        "aggregated ledger range"
    );
    Ok(totals)
}

/// Converts a float to a decimal; `None` for NaN, infinity, or a magnitude
/// outside the decimal range.
pub(crate) fn decimal_from_f64(v: f64) -> Option<Decimal> {
    Decimal::from_f64(v)
}

pub(crate) fn decimal_to_f64(d: Decimal) -> f64 {
    d.to_f64().unwrap_or(0.0)
}
