//! Calculation context - resolves an instrument's inputs from the price cache.

use chrono::{DateTime, Utc};

use strata_traits::ids::{InstrumentId, Version};
use strata_traits::instrument::Instrument;
use strata_traits::pricing::{ConsumedInput, ResolvedInput, ResolvedInputs};

use crate::cache::PriceCache;

/// Inputs of one instrument as read from the cache at dispatch time.
#[derive(Debug, Clone)]
pub(crate) struct PreparedInputs {
    /// What the model sees.
    pub resolved: ResolvedInputs,
    /// Dependency versions recorded on the resulting price.
    pub consumed: Vec<ConsumedInput>,
    /// Observation version recorded on the resulting price.
    pub observation_version: Option<Version>,
}

/// Outcome of input resolution.
#[derive(Debug, Clone)]
pub(crate) enum Resolution {
    /// Inputs resolved; the model can run.
    Ready(PreparedInputs),
    /// A dependency is Failed; the model must not run.
    Blocked {
        /// The failed dependency
        dependency: InstrumentId,
        /// Versions seen while resolving
        consumed: Vec<ConsumedInput>,
    },
}

/// Context for a calculation cycle.
pub(crate) struct CalculationContext<'a> {
    /// Price and observation cache
    pub cache: &'a PriceCache,
    /// Valuation timestamp shared by every task in the cycle
    pub as_of: DateTime<Utc>,
}

impl<'a> CalculationContext<'a> {
    /// Create a context valued now.
    pub fn new(cache: &'a PriceCache) -> Self {
        Self {
            cache,
            as_of: Utc::now(),
        }
    }

    /// Read the current versions and prices of every input of `instrument`.
    ///
    /// Inputs without a record resolve as missing; the model decides
    /// whether that is fatal.
    pub fn resolve(&self, instrument: &Instrument) -> Resolution {
        let mut consumed = Vec::with_capacity(instrument.inputs.len());
        let mut inputs = Vec::with_capacity(instrument.inputs.len());
        let mut blocked = None;

        for dependency in &instrument.inputs {
            let record = self.cache.try_get(dependency);
            let version = record
                .as_ref()
                .map(|r| r.version)
                .unwrap_or(Version::ZERO);
            consumed.push(ConsumedInput {
                instrument_id: dependency.clone(),
                version,
            });

            match record {
                Some(r) if r.is_failed() => {
                    if blocked.is_none() {
                        blocked = Some(dependency.clone());
                    }
                    inputs.push(None);
                }
                Some(r) => inputs.push(r.price.map(|price| ResolvedInput {
                    instrument_id: dependency.clone(),
                    price,
                    version,
                })),
                None => inputs.push(None),
            }
        }

        if let Some(dependency) = blocked {
            return Resolution::Blocked {
                dependency,
                consumed,
            };
        }

        let observation = self.cache.observations().get(&instrument.id);
        let observation_version = observation.as_ref().map(|o| o.version);

        Resolution::Ready(PreparedInputs {
            resolved: ResolvedInputs {
                as_of: self.as_of,
                observation,
                inputs,
            },
            consumed,
            observation_version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use strata_traits::instrument::InstrumentKind;
    use strata_traits::pricing::{FailureReason, PriceRecord, PriceStatus, ValuationError};

    fn put(cache: &PriceCache, id: &str, status: PriceStatus, version: u64) {
        cache.put(PriceRecord {
            instrument_id: id.into(),
            price: Some(dec!(10)),
            version: Version(version),
            inputs: vec![],
            observation_version: None,
            computed_at: Utc::now(),
            status,
            failure: (status == PriceStatus::Failed)
                .then(|| FailureReason::Valuation(ValuationError::numerical("boom"))),
        });
    }

    #[test]
    fn test_resolve_reads_versions() {
        let cache = PriceCache::new();
        put(&cache, "Q1", PriceStatus::Fresh, 3);
        let d1 = Instrument::new("D1", InstrumentKind::Index).with_inputs(["Q1", "Q2"]);

        let ctx = CalculationContext::new(&cache);
        match ctx.resolve(&d1) {
            Resolution::Ready(prepared) => {
                assert_eq!(prepared.resolved.price(0), Ok(dec!(10)));
                assert!(prepared.resolved.price(1).is_err());
                assert_eq!(prepared.consumed[0].version, Version(3));
                assert_eq!(prepared.consumed[1].version, Version::ZERO);
                assert_eq!(prepared.observation_version, None);
            }
            other => panic!("Expected Ready, got {:?}", other),
        }
    }

    #[test]
    fn test_failed_dependency_blocks() {
        let cache = PriceCache::new();
        put(&cache, "D1", PriceStatus::Failed, 1);
        let e1 = Instrument::new("E1", InstrumentKind::Index).with_inputs(["D1"]);

        let ctx = CalculationContext::new(&cache);
        assert!(matches!(
            ctx.resolve(&e1),
            Resolution::Blocked { dependency, .. } if dependency == InstrumentId::new("D1")
        ));
    }
}
