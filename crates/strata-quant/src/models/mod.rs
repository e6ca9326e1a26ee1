//! Closed-form valuation models.
//!
//! Each model is a pure function of its parameters and resolved inputs.
//! [`ModelRouter`](crate::ModelRouter) selects the model per instrument.

pub mod basket;
pub mod bond;
pub mod future;
pub mod market;
pub mod option;
pub mod rates;

pub use basket::basket_value;
pub use bond::{BondPrice, BondPricer};
pub use future::cost_of_carry;
pub use market::market_price;
pub use option::black_scholes;
pub use rates::interpolate_rate;
