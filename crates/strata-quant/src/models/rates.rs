//! Rate interpolation between curve pillars.

use rust_decimal::Decimal;

use strata_traits::ValuationError;

/// Linear interpolation of the rate at `tenor` from `(pillars[i], rates[i])`.
///
/// Pillars must be strictly increasing. Outside the pillar range the
/// nearest rate is used (flat extrapolation).
pub fn interpolate_rate(
    tenor: Decimal,
    pillars: &[Decimal],
    rates: &[Decimal],
) -> Result<Decimal, ValuationError> {
    if pillars.is_empty() || pillars.len() != rates.len() {
        return Err(ValuationError::ModelUnsupported(format!(
            "{} pillars for {} rates",
            pillars.len(),
            rates.len()
        )));
    }
    if pillars.windows(2).any(|w| w[1] <= w[0]) {
        return Err(ValuationError::ModelUnsupported(
            "pillar tenors must be strictly increasing".to_string(),
        ));
    }

    let last = pillars.len() - 1;
    if tenor <= pillars[0] {
        return Ok(rates[0]);
    }
    if tenor >= pillars[last] {
        return Ok(rates[last]);
    }

    // First pillar strictly above the tenor; 1..=last by the bounds above.
    let i = pillars.partition_point(|p| *p <= tenor);
    let (x0, x1) = (pillars[i - 1], pillars[i]);
    let (y0, y1) = (rates[i - 1], rates[i]);

    Ok(y0 + (y1 - y0) * (tenor - x0) / (x1 - x0))
}
