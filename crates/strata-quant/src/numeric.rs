//! Decimal/float conversions and day counting.

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use strata_traits::ValuationError;

/// Days per year for ACT/365 fixed.
pub(crate) const DAYS_PER_YEAR: f64 = 365.0;

/// Decimal places kept on model output.
const OUTPUT_DP: u32 = 10;

pub(crate) fn to_f64(value: Decimal, what: &str) -> Result<f64, ValuationError> {
    value
        .to_f64()
        .ok_or_else(|| ValuationError::numerical(format!("{} not representable: {}", what, value)))
}

pub(crate) fn to_decimal(value: f64, what: &str) -> Result<Decimal, ValuationError> {
    if !value.is_finite() {
        return Err(ValuationError::numerical(format!("{} is {}", what, value)));
    }
    Decimal::from_f64_retain(value)
        .map(|d| d.round_dp(OUTPUT_DP))
        .ok_or_else(|| ValuationError::numerical(format!("{} out of range: {}", what, value)))
}

/// ACT/365 fixed year fraction. Negative when `to` precedes `from`.
pub(crate) fn year_fraction(from: NaiveDate, to: NaiveDate) -> f64 {
    (to - from).num_days() as f64 / DAYS_PER_YEAR
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_non_finite_rejected() {
        assert!(to_decimal(f64::NAN, "price").is_err());
        assert!(to_decimal(f64::INFINITY, "price").is_err());
        assert_eq!(to_decimal(1.5, "price").unwrap(), dec!(1.5));
    }

    #[test]
    fn test_year_fraction() {
        let a = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let b = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        assert_eq!(year_fraction(a, b), 1.0);
        assert_eq!(year_fraction(b, a), -1.0);
        assert_eq!(to_f64(dec!(0.25), "rate").unwrap(), 0.25);
    }
}
