//! Leaf prices from market observations.

use rust_decimal::Decimal;

use strata_traits::instrument::PriceType;
use strata_traits::market_data::Observation;
use strata_traits::ValuationError;

/// First available price in `priority` order.
pub fn market_price(
    observation: &Observation,
    priority: &[PriceType],
) -> Result<Decimal, ValuationError> {
    priority
        .iter()
        .find_map(|price_type| match price_type {
            PriceType::Mid => observation.mid(),
            PriceType::Last => observation.last,
            PriceType::Vwap => observation.vwap(),
            PriceType::Bid => observation.bid,
            PriceType::Ask => observation.ask,
            PriceType::Settlement => observation.settlement,
        })
        .ok_or_else(|| {
            ValuationError::MissingInput(format!("no price of type {:?} observed", priority))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_mid_preferred_when_both_sides_quoted() {
        let observation = Observation {
            bid: Some(dec!(99)),
            ask: Some(dec!(101)),
            last: Some(dec!(105)),
            ..Default::default()
        };
        let price = market_price(&observation, &PriceType::default_priority()).unwrap();
        assert_eq!(price, dec!(100));
    }

    #[test]
    fn test_falls_through_priority() {
        let observation = Observation {
            bid: Some(dec!(99)),
            traded_notional: dec!(2030),
            traded_volume: dec!(20),
            ..Default::default()
        };
        let price = market_price(&observation, &PriceType::default_priority()).unwrap();
        assert_eq!(price, dec!(101.5));

        let price = market_price(&observation, &[PriceType::Ask, PriceType::Bid]).unwrap();
        assert_eq!(price, dec!(99));
    }

    #[test]
    fn test_nothing_observed() {
        let result = market_price(&Observation::default(), &PriceType::default_priority());
        assert!(matches!(result, Err(ValuationError::MissingInput(_))));
    }
}
