//! Black-Scholes European options.

use statrs::distribution::{ContinuousCDF, Normal};

use strata_traits::instrument::OptionRight;
use strata_traits::ValuationError;

/// Black-Scholes price of a European option.
///
/// `rate` and `volatility` are annualised and continuously compounded;
/// `time_to_expiry` is in years. At or past expiry the intrinsic value is
/// returned.
pub fn black_scholes(
    right: OptionRight,
    spot: f64,
    strike: f64,
    rate: f64,
    volatility: f64,
    time_to_expiry: f64,
) -> Result<f64, ValuationError> {
    if spot <= 0.0 || strike <= 0.0 {
        return Err(ValuationError::numerical(format!(
            "spot {} and strike {} must be positive",
            spot, strike
        )));
    }

    if time_to_expiry <= 0.0 {
        return Ok(match right {
            OptionRight::Call => (spot - strike).max(0.0),
            OptionRight::Put => (strike - spot).max(0.0),
        });
    }

    if volatility <= 0.0 {
        return Err(ValuationError::numerical(format!(
            "volatility {} must be positive",
            volatility
        )));
    }

    let normal = Normal::new(0.0, 1.0).map_err(|e| ValuationError::numerical(e.to_string()))?;
    let sqrt_t = time_to_expiry.sqrt();
    let d1 = ((spot / strike).ln() + (rate + 0.5 * volatility * volatility) * time_to_expiry)
        / (volatility * sqrt_t);
    let d2 = d1 - volatility * sqrt_t;
    let discounted_strike = strike * (-rate * time_to_expiry).exp();

    Ok(match right {
        OptionRight::Call => spot * normal.cdf(d1) - discounted_strike * normal.cdf(d2),
        OptionRight::Put => discounted_strike * normal.cdf(-d2) - spot * normal.cdf(-d1),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    #[test]
    fn test_at_the_money_one_year() {
        let call = black_scholes(OptionRight::Call, 100.0, 100.0, 0.05, 0.2, 1.0).unwrap();
        let put = black_scholes(OptionRight::Put, 100.0, 100.0, 0.05, 0.2, 1.0).unwrap();
        assert_abs_diff_eq!(call, 10.4506, epsilon = 1e-4);
        assert_abs_diff_eq!(put, 5.5735, epsilon = 1e-4);
    }

    #[test]
    fn test_expired_is_intrinsic() {
        assert_eq!(black_scholes(OptionRight::Call, 110.0, 100.0, 0.05, 0.2, 0.0).unwrap(), 10.0);
        assert_eq!(black_scholes(OptionRight::Put, 110.0, 100.0, 0.05, 0.2, -0.1).unwrap(), 0.0);
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(black_scholes(OptionRight::Call, 0.0, 100.0, 0.05, 0.2, 1.0).is_err());
        assert!(black_scholes(OptionRight::Call, 100.0, 100.0, 0.05, 0.0, 1.0).is_err());
    }

    proptest! {
        #[test]
        fn prop_put_call_parity(
            spot in 10.0f64..500.0,
            strike in 10.0f64..500.0,
            rate in 0.0f64..0.1,
            vol in 0.05f64..1.0,
            t in 0.05f64..5.0,
        ) {
            let call = black_scholes(OptionRight::Call, spot, strike, rate, vol, t).unwrap();
            let put = black_scholes(OptionRight::Put, spot, strike, rate, vol, t).unwrap();
            let parity = spot - strike * (-rate * t).exp();
            prop_assert!((call - put - parity).abs() < 1e-6 * spot.max(strike));
        }
    }
}
