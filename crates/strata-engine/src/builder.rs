//! Builder pattern for the pricing engine.

use std::sync::Arc;

use strata_traits::config::EngineConfig;
use strata_traits::output::{AlertSink, NullAlertSink, PriceSink};
use strata_traits::pricing::ValuationModel;

use crate::error::EngineError;
use crate::PricingEngine;

/// Builder for constructing a [`PricingEngine`].
pub struct PricingEngineBuilder {
    config: Option<EngineConfig>,
    model: Option<Arc<dyn ValuationModel>>,
    sink: Option<Arc<dyn PriceSink>>,
    alerts: Option<Arc<dyn AlertSink>>,
}

impl PricingEngineBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            config: None,
            model: None,
            sink: None,
            alerts: None,
        }
    }

    /// Set the engine configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the valuation model.
    pub fn with_model(mut self, model: Arc<dyn ValuationModel>) -> Self {
        self.model = Some(model);
        self
    }

    /// Set the outbound price sink.
    pub fn with_sink(mut self, sink: Arc<dyn PriceSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Set the alert sink. Alerts are discarded when none is set.
    pub fn with_alerts(mut self, alerts: Arc<dyn AlertSink>) -> Self {
        self.alerts = Some(alerts);
        self
    }

    /// Build the pricing engine.
    pub fn build(self) -> Result<PricingEngine, EngineError> {
        let config = self.config.unwrap_or_default();
        config.validate().map_err(EngineError::ConfigError)?;

        let model = self
            .model
            .ok_or_else(|| EngineError::ConfigError("model not configured".into()))?;

        let sink = self
            .sink
            .ok_or_else(|| EngineError::ConfigError("sink not configured".into()))?;

        let alerts = self.alerts.unwrap_or_else(|| Arc::new(NullAlertSink));

        Ok(PricingEngine::new(config, model, sink, alerts))
    }
}

impl Default for PricingEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_traits::output::NullPriceSink;

    #[test]
    fn test_build_requires_model() {
        let result = PricingEngineBuilder::new()
            .with_sink(Arc::new(NullPriceSink))
            .build();
        assert!(matches!(result, Err(EngineError::ConfigError(_))));
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        struct Unused;
        impl ValuationModel for Unused {
            fn price(
                &self,
                _: &strata_traits::instrument::Instrument,
                _: &strata_traits::pricing::ResolvedInputs,
            ) -> Result<rust_decimal::Decimal, strata_traits::ValuationError> {
                Ok(rust_decimal::Decimal::ZERO)
            }
        }

        let result = PricingEngineBuilder::new()
            .with_config(EngineConfig {
                queue_capacity: 0,
                ..Default::default()
            })
            .with_model(Arc::new(Unused))
            .with_sink(Arc::new(NullPriceSink))
            .build();
        assert!(matches!(result, Err(EngineError::ConfigError(_))));
    }
}
