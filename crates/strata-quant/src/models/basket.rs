//! Weighted baskets (indices, ETF iNAV).

use rust_decimal::Decimal;

use strata_traits::ValuationError;

/// Sum of `weights[i] * prices[i]`.
pub fn basket_value(weights: &[Decimal], prices: &[Decimal]) -> Result<Decimal, ValuationError> {
    if weights.len() != prices.len() {
        return Err(ValuationError::ModelUnsupported(format!(
            "basket has {} weights for {} inputs",
            weights.len(),
            prices.len()
        )));
    }

    weights
        .iter()
        .zip(prices)
        .try_fold(Decimal::ZERO, |acc, (w, p)| {
            w.checked_mul(*p)
                .and_then(|v| acc.checked_add(v))
                .ok_or_else(|| ValuationError::numerical("basket value overflow"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_weighted_sum() {
        let value = basket_value(&[dec!(0.5), dec!(2)], &[dec!(100), dec!(10)]).unwrap();
        assert_eq!(value, dec!(70));
    }

    #[test]
    fn test_weight_count_mismatch() {
        let result = basket_value(&[dec!(1)], &[dec!(100), dec!(10)]);
        assert!(matches!(result, Err(ValuationError::ModelUnsupported(_))));
    }
}
