//! # Strata Quant
//!
//! Reference valuation library for the Strata pricing engine.
//!
//! The engine treats valuation as a black box behind
//! [`ValuationModel`](strata_traits::ValuationModel). This crate provides a
//! router over a small set of closed-form models, selected per instrument
//! by its [`ModelParameters`](strata_traits::instrument::ModelParameters):
//!
//! - **Market**: price from the instrument's own observation
//! - **Basket**: weighted sum of constituent prices
//! - **Interpolated**: linear interpolation of a rate between pillars
//! - **Bond**: discounted fixed coupon cash flows, clean price
//! - **European option**: Black-Scholes
//! - **Future**: cost of carry
//!
//! ## Example
//!
//! ```ignore
//! use strata_quant::ModelRouter;
//!
//! let engine = PricingEngineBuilder::new()
//!     .with_model(Arc::new(ModelRouter::new()))
//!     .with_sink(sink)
//!     .build()?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod models;
mod numeric;
pub mod router;

pub use router::ModelRouter;
