//! # Strata Ext File
//!
//! File-based integrations for the Strata pricing engine.
//!
//! This crate provides default implementations for testing, replay and
//! batch runs:
//! - JSON instrument definitions ([`load_instruments`])
//! - CSV market event replay ([`CsvEventSource`])
//! - JSON-lines price and alert output ([`FilePriceSink`], [`FileAlertSink`])
//!
//! For production real-time feeds and distribution, use broker extensions.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod events;
mod instruments;
mod output;

pub use events::*;
pub use instruments::*;
pub use output::*;
