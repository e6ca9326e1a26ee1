//! Fixed coupon bond discounting.
//!
//! Cash flows are generated by stepping back from maturity in whole coupon
//! periods. Discount times are measured in coupon periods from the
//! valuation date, with the first (possibly broken) period weighted by the
//! ACT/ACT fraction still to run. Accrued interest is the coupon times the
//! elapsed fraction of the current period.

use chrono::{Months, NaiveDate};
use rust_decimal::Decimal;

use strata_traits::instrument::{BondParameters, Compounding};
use strata_traits::ValuationError;

use crate::numeric::{to_decimal, to_f64, year_fraction};

/// Result of a bond valuation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BondPrice {
    /// Dirty price minus accrued interest
    pub clean: Decimal,
    /// Present value of the remaining cash flows
    pub dirty: Decimal,
    /// Coupon accrued since the last payment date
    pub accrued: Decimal,
}

/// Bond pricing engine.
pub struct BondPricer;

impl BondPricer {
    /// Prices a bond at `yield_rate` as of `as_of`.
    ///
    /// The valuation date is the later of `as_of` and the issue date.
    ///
    /// # Errors
    ///
    /// `ModelUnsupported` for inconsistent terms, `NumericalFailure` for a
    /// matured bond or a yield the discounting cannot use.
    pub fn price(
        params: &BondParameters,
        yield_rate: Decimal,
        as_of: NaiveDate,
    ) -> Result<BondPrice, ValuationError> {
        if params.maturity_date <= params.issue_date {
            return Err(ValuationError::ModelUnsupported(
                "maturity date must be after issue date".to_string(),
            ));
        }

        let valuation_date = as_of.max(params.issue_date);
        if valuation_date >= params.maturity_date {
            return Err(ValuationError::numerical(format!(
                "bond matured on {}",
                params.maturity_date
            )));
        }

        let y = to_f64(yield_rate, "yield")?;
        let nominal = to_f64(params.nominal, "nominal")?;
        let coupon_rate = to_f64(params.coupon_rate, "coupon rate")?;
        if params.compounding == Compounding::Annual && y <= -1.0 {
            return Err(ValuationError::numerical(format!("yield {} below -100%", y)));
        }

        let discount = |t: f64| match params.compounding {
            Compounding::Annual => (1.0 + y).powf(-t),
            Compounding::Continuous => (-y * t).exp(),
        };

        if params.frequency == 0 {
            let t = year_fraction(valuation_date, params.maturity_date);
            let dirty = to_decimal(nominal * discount(t), "bond price")?;
            return Ok(BondPrice {
                clean: dirty,
                dirty,
                accrued: Decimal::ZERO,
            });
        }

        if 12 % params.frequency != 0 {
            return Err(ValuationError::ModelUnsupported(format!(
                "coupon frequency {} does not divide the year",
                params.frequency
            )));
        }

        let (previous, schedule) = coupon_schedule(
            params.maturity_date,
            valuation_date,
            12 / params.frequency,
        )?;
        let next = schedule[0];
        let frequency = f64::from(params.frequency);
        let coupon = nominal * coupon_rate / frequency;

        let period_days = (next - previous).num_days() as f64;
        let accrual_start = previous.max(params.issue_date);
        let accrued = coupon * (valuation_date - accrual_start).num_days() as f64 / period_days;
        let first_fraction = (next - valuation_date).num_days() as f64 / period_days;

        let mut dirty = 0.0;
        for k in 0..schedule.len() {
            dirty += coupon * discount((k as f64 + first_fraction) / frequency);
        }
        let t_maturity = (schedule.len() as f64 - 1.0 + first_fraction) / frequency;
        dirty += nominal * discount(t_maturity);

        Ok(BondPrice {
            clean: to_decimal(dirty - accrued, "clean price")?,
            dirty: to_decimal(dirty, "dirty price")?,
            accrued: to_decimal(accrued, "accrued interest")?,
        })
    }
}

/// Payment dates after `valuation_date` (ascending, ending at maturity) and
/// the last period boundary on or before it.
fn coupon_schedule(
    maturity: NaiveDate,
    valuation_date: NaiveDate,
    months: u32,
) -> Result<(NaiveDate, Vec<NaiveDate>), ValuationError> {
    let mut schedule = Vec::new();
    let mut periods = 0u32;

    let previous = loop {
        let date = maturity
            .checked_sub_months(Months::new(months * periods))
            .ok_or_else(|| ValuationError::numerical("coupon schedule out of date range"))?;
        if date <= valuation_date {
            break date;
        }
        schedule.push(date);
        periods += 1;
    };

    schedule.reverse();
    Ok((previous, schedule))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rust_decimal::prelude::ToPrimitive;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn bond(frequency: u32, issue: NaiveDate, maturity: NaiveDate, coupon: Decimal) -> BondParameters {
        BondParameters {
            coupon_rate: coupon,
            frequency,
            issue_date: issue,
            maturity_date: maturity,
            nominal: dec!(1000),
            compounding: Compounding::Annual,
            constant_yield: None,
        }
    }

    fn f(d: Decimal) -> f64 {
        d.to_f64().unwrap()
    }

    #[test]
    fn test_zero_coupon_priced_from_issue() {
        let params = bond(1, date(2020, 1, 1), date(2040, 1, 1), dec!(0));
        let result = BondPricer::price(&params, dec!(0.05), date(2019, 1, 1)).unwrap();

        assert_abs_diff_eq!(f(result.clean), 376.89, epsilon = 0.01);
        assert_eq!(result.clean, result.dirty);
        assert_eq!(result.accrued, Decimal::ZERO);
    }

    #[test]
    fn test_annual_coupon_at_issue() {
        let params = bond(1, date(2020, 1, 1), date(2040, 1, 1), dec!(0.025));
        let result = BondPricer::price(&params, dec!(0.04), date(2020, 1, 1)).unwrap();

        assert_abs_diff_eq!(f(result.clean), 796.14, epsilon = 0.01);
        assert_eq!(result.accrued, Decimal::ZERO);
    }

    #[test]
    fn test_semi_annual_coupon_at_issue() {
        let params = bond(2, date(2020, 1, 1), date(2040, 1, 1), dec!(0.025));
        let result = BondPricer::price(&params, dec!(0.04), date(2020, 1, 1)).unwrap();
        assert_abs_diff_eq!(f(result.clean), 798.83, epsilon = 1.0);

        let params = bond(2, date(2021, 1, 1), date(2023, 1, 1), dec!(0.05));
        let result = BondPricer::price(&params, dec!(0.03), date(2020, 1, 1)).unwrap();
        assert_abs_diff_eq!(f(result.clean), 1038.54, epsilon = 1.0);
    }

    #[test]
    fn test_accrued_interest() {
        let params = bond(2, date(2021, 1, 1), date(2023, 1, 1), dec!(0.04));
        let result = BondPricer::price(&params, dec!(0), date(2021, 6, 30)).unwrap();
        assert_abs_diff_eq!(f(result.accrued), 19.90, epsilon = 0.1);
        assert_abs_diff_eq!(f(result.clean), f(result.dirty - result.accrued), epsilon = 1e-8);

        let params = bond(2, date(2011, 1, 1), date(2031, 1, 1), dec!(0.05));
        let result = BondPricer::price(&params, dec!(0.04), date(2011, 4, 30)).unwrap();
        assert_abs_diff_eq!(f(result.accrued), 16.43, epsilon = 0.01);
    }

    #[test]
    fn test_continuous_zero_bond() {
        let params = BondParameters {
            compounding: Compounding::Continuous,
            ..bond(0, date(2025, 1, 1), date(2026, 1, 1), dec!(0))
        };
        let result = BondPricer::price(&params, dec!(0.05), date(2025, 1, 1)).unwrap();
        assert_abs_diff_eq!(f(result.clean), 1000.0 * (-0.05f64).exp(), epsilon = 1e-6);
    }

    #[test]
    fn test_matured_bond_fails() {
        let params = bond(1, date(2020, 1, 1), date(2021, 1, 1), dec!(0.05));
        let result = BondPricer::price(&params, dec!(0.05), date(2022, 1, 1));
        assert!(matches!(result, Err(ValuationError::NumericalFailure { .. })));
    }

    #[test]
    fn test_odd_frequency_unsupported() {
        let params = bond(5, date(2020, 1, 1), date(2030, 1, 1), dec!(0.05));
        let result = BondPricer::price(&params, dec!(0.05), date(2020, 1, 1));
        assert!(matches!(result, Err(ValuationError::ModelUnsupported(_))));
    }
}
