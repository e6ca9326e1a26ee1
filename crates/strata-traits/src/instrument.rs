//! Static instrument definitions.
//!
//! An [`Instrument`] is immutable once registered. It names the instruments
//! it consumes (its inputs, in model order) and the parameters the valuation
//! library needs to price it. Editing an instrument means registering a new
//! definition, which replaces the old one in a new registry snapshot.

use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ids::InstrumentId;

// =============================================================================
// INSTRUMENT KIND
// =============================================================================

/// Kind of priced instrument.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentKind {
    /// Listed equity
    Equity,
    /// Index or basket (e.g., ETF iNAV)
    Index,
    /// Single point on a rate curve
    CurvePoint,
    /// Option on an underlying
    Option,
    /// Bond
    Bond,
    /// Future on an underlying
    Future,
    /// Anything else, named
    Other(String),
}

impl fmt::Display for InstrumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstrumentKind::Equity => write!(f, "equity"),
            InstrumentKind::Index => write!(f, "index"),
            InstrumentKind::CurvePoint => write!(f, "curve_point"),
            InstrumentKind::Option => write!(f, "option"),
            InstrumentKind::Bond => write!(f, "bond"),
            InstrumentKind::Future => write!(f, "future"),
            InstrumentKind::Other(name) => write!(f, "{}", name),
        }
    }
}

// =============================================================================
// MODEL PARAMETERS
// =============================================================================

/// Which observed price a market-priced instrument publishes.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceType {
    /// Mid of bid and ask (requires both sides)
    Mid,
    /// Last traded or quoted price
    Last,
    /// Volume weighted average of trades
    Vwap,
    /// Best bid
    Bid,
    /// Best ask
    Ask,
    /// Official settlement price
    Settlement,
}

impl PriceType {
    /// Default intraday priority for market-priced instruments.
    pub fn default_priority() -> Vec<PriceType> {
        vec![
            PriceType::Mid,
            PriceType::Last,
            PriceType::Vwap,
            PriceType::Settlement,
        ]
    }
}

/// Compounding convention for discounting.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compounding {
    /// (1 + y)^-t
    #[default]
    Annual,
    /// e^(-y t)
    Continuous,
}

/// Option exercise right.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionRight {
    /// Right to buy
    Call,
    /// Right to sell
    Put,
}

/// Terms of a fixed coupon bond.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BondParameters {
    /// Annual coupon rate (0.05 = 5%)
    pub coupon_rate: Decimal,
    /// Coupons per year (0 for zero coupon)
    pub frequency: u32,
    /// Issue (accrual start) date
    pub issue_date: NaiveDate,
    /// Maturity date
    pub maturity_date: NaiveDate,
    /// Nominal amount
    pub nominal: Decimal,
    /// Compounding used for discounting
    #[serde(default)]
    pub compounding: Compounding,
    /// Fixed discount yield; when absent the yield is the first input
    #[serde(default)]
    pub constant_yield: Option<Decimal>,
}

/// Terms of a European option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionParameters {
    /// Strike price
    pub strike: Decimal,
    /// Expiry date
    pub expiry: NaiveDate,
    /// Call or put
    pub right: OptionRight,
    /// Continuously compounded risk-free rate
    pub rate: Decimal,
    /// Annualised volatility; when absent the volatility is the second input
    #[serde(default)]
    pub volatility: Option<Decimal>,
}

/// Terms of a future priced by cost of carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FutureParameters {
    /// Expiry date
    pub expiry: NaiveDate,
    /// Continuously compounded carry rate
    pub rate: Decimal,
}

/// Parameters selecting and configuring the valuation model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum ModelParameters {
    /// Price taken from the instrument's own market observation.
    Market {
        /// Price types tried in order
        #[serde(default = "PriceType::default_priority")]
        priority: Vec<PriceType>,
    },
    /// Weighted sum of input prices.
    Basket {
        /// One weight per input
        weights: Vec<Decimal>,
    },
    /// Linear interpolation between input rates quoted at pillar tenors.
    Interpolated {
        /// Target tenor in years
        tenor: Decimal,
        /// Tenor in years of each input, same order as the inputs
        pillars: Vec<Decimal>,
    },
    /// Discounted cash flow bond model.
    Bond(BondParameters),
    /// Black-Scholes European option.
    EuropeanOption(OptionParameters),
    /// Cost-of-carry future.
    Future(FutureParameters),
}

impl Default for ModelParameters {
    fn default() -> Self {
        ModelParameters::Market {
            priority: PriceType::default_priority(),
        }
    }
}

impl ModelParameters {
    /// Short model name for logs and alerts.
    pub fn model_name(&self) -> &'static str {
        match self {
            ModelParameters::Market { .. } => "market",
            ModelParameters::Basket { .. } => "basket",
            ModelParameters::Interpolated { .. } => "interpolated",
            ModelParameters::Bond(_) => "bond",
            ModelParameters::EuropeanOption(_) => "european_option",
            ModelParameters::Future(_) => "future",
        }
    }
}

// =============================================================================
// INSTRUMENT
// =============================================================================

/// A registered instrument definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    /// Unique identifier
    pub id: InstrumentId,
    /// Instrument kind
    pub kind: InstrumentKind,
    /// Instruments this one depends on, in the order the model consumes them
    #[serde(default)]
    pub inputs: Vec<InstrumentId>,
    /// Valuation model parameters
    #[serde(default)]
    pub parameters: ModelParameters,
}

impl Instrument {
    /// Create a leaf instrument priced from its own market observation.
    pub fn new(id: impl Into<InstrumentId>, kind: InstrumentKind) -> Self {
        Self {
            id: id.into(),
            kind,
            inputs: Vec::new(),
            parameters: ModelParameters::default(),
        }
    }

    /// Set the instruments this one depends on.
    pub fn with_inputs<I, T>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<InstrumentId>,
    {
        self.inputs = inputs.into_iter().map(Into::into).collect();
        self
    }

    /// Set the model parameters.
    pub fn with_parameters(mut self, parameters: ModelParameters) -> Self {
        self.parameters = parameters;
        self
    }

    /// Returns true if the instrument has no dependencies.
    pub fn is_leaf(&self) -> bool {
        self.inputs.is_empty()
    }
}
