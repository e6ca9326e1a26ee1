//! Instrument definitions from JSON.

use std::path::Path;

use strata_traits::error::TraitError;
use strata_traits::instrument::Instrument;

/// Load instrument definitions from a JSON array.
///
/// ```json
/// [
///   { "id": "Q1", "kind": "equity" },
///   { "id": "IDX", "kind": "index", "inputs": ["Q1", "Q2"],
///     "parameters": { "model": "basket", "weights": [0.5, 0.5] } }
/// ]
/// ```
pub fn load_instruments(path: impl AsRef<Path>) -> Result<Vec<Instrument>, TraitError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .map_err(|e| TraitError::IoError(format!("{}: {}", path.display(), e)))?;
    parse_instruments(&content)
}

/// Parse instrument definitions from a JSON array.
pub fn parse_instruments(content: &str) -> Result<Vec<Instrument>, TraitError> {
    serde_json::from_str(content).map_err(|e| TraitError::ParseError(e.to_string()))
}
