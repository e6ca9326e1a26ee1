//! # Strata Traits
//!
//! Data model and collaborator traits for the Strata pricing engine.
//!
//! This crate contains the shared vocabulary of the engine and the trait
//! seams to its external collaborators. It carries no runtime dependencies;
//! all implementations live in separate crates.
//!
//! ## Module Structure
//!
//! - [`ids`]: Identifiers and per-instrument versions
//! - [`instrument`]: Static instrument definitions and model parameters
//! - [`market_data`]: Market events and aggregated observations
//! - [`pricing`]: Price records, resolved inputs and the [`ValuationModel`] boundary
//! - [`output`]: Outbound price and alert publishing traits
//! - [`transport`]: Wire codec abstraction
//! - [`config`]: Engine configuration
//!
//! ## Dependency Injection
//!
//! ```ignore
//! PricingEngineBuilder::new()
//!     .with_config(EngineConfig::default())
//!     .with_model(impl ValuationModel)
//!     .with_sink(impl PriceSink)
//!     .with_alerts(impl AlertSink)
//!     .build()
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod ids;
pub mod instrument;
pub mod market_data;
pub mod output;
pub mod pricing;
pub mod transport;

// Re-export commonly used types
pub use error::TraitError;
pub use ids::*;
pub use pricing::{ValuationError, ValuationModel};
