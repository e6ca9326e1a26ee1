//! Model router - selects the valuation model from an instrument's parameters.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::trace;

use strata_traits::instrument::{Instrument, InstrumentKind, ModelParameters};
use strata_traits::pricing::{ResolvedInputs, ValuationModel};
use strata_traits::ValuationError;

use crate::models::{
    basket_value, black_scholes, cost_of_carry, interpolate_rate, market_price, BondPricer,
};
use crate::numeric::{to_decimal, to_f64, year_fraction};

/// Routes each instrument to the model named by its parameters.
///
/// Bond, option and future models only accept instruments of the matching
/// kind; any other combination is `ModelUnsupported`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ModelRouter;

impl ModelRouter {
    /// Create a new model router.
    pub fn new() -> Self {
        Self
    }

    fn require_kind(instrument: &Instrument, expected: InstrumentKind) -> Result<(), ValuationError> {
        if instrument.kind == expected {
            Ok(())
        } else {
            Err(ValuationError::ModelUnsupported(format!(
                "{} model cannot price {} instrument {}",
                instrument.parameters.model_name(),
                instrument.kind,
                instrument.id
            )))
        }
    }

    fn valuation_date(inputs: &ResolvedInputs) -> NaiveDate {
        inputs.as_of.date_naive()
    }
}

impl ValuationModel for ModelRouter {
    fn price(
        &self,
        instrument: &Instrument,
        inputs: &ResolvedInputs,
    ) -> Result<Decimal, ValuationError> {
        let price = match &instrument.parameters {
            ModelParameters::Market { priority } => {
                market_price(inputs.observation()?, priority)?
            }

            ModelParameters::Basket { weights } => basket_value(weights, &inputs.prices()?)?,

            ModelParameters::Interpolated { tenor, pillars } => {
                interpolate_rate(*tenor, pillars, &inputs.prices()?)?
            }

            ModelParameters::Bond(params) => {
                Self::require_kind(instrument, InstrumentKind::Bond)?;
                let yield_rate = match params.constant_yield {
                    Some(y) => y,
                    None => inputs.price(0)?,
                };
                BondPricer::price(params, yield_rate, Self::valuation_date(inputs))?.clean
            }

            ModelParameters::EuropeanOption(params) => {
                Self::require_kind(instrument, InstrumentKind::Option)?;
                let spot = to_f64(inputs.price(0)?, "spot")?;
                let volatility = match params.volatility {
                    Some(v) => v,
                    None => inputs.price(1)?,
                };
                let t = year_fraction(Self::valuation_date(inputs), params.expiry);
                let value = black_scholes(
                    params.right,
                    spot,
                    to_f64(params.strike, "strike")?,
                    to_f64(params.rate, "rate")?,
                    to_f64(volatility, "volatility")?,
                    t,
                )?;
                to_decimal(value, "option price")?
            }

            ModelParameters::Future(params) => {
                Self::require_kind(instrument, InstrumentKind::Future)?;
                let spot = to_f64(inputs.price(0)?, "spot")?;
                let t = year_fraction(Self::valuation_date(inputs), params.expiry);
                to_decimal(
                    cost_of_carry(spot, to_f64(params.rate, "rate")?, t),
                    "future price",
                )?
            }
        };

        trace!(
            instrument = %instrument.id,
            model = instrument.parameters.model_name(),
            %price,
            "Model priced"
        );
        Ok(price)
    }
}
