//! Market event replay from CSV.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use strata_traits::error::TraitError;
use strata_traits::ids::{InstrumentId, SourceId};
use strata_traits::market_data::{MarketEvent, QuoteField};

/// CSV record for market events.
///
/// Prices and volumes are read as text and parsed as decimals so no
/// precision is lost through floats.
#[derive(Debug, Deserialize)]
struct EventRecord {
    instrument_id: String,
    #[serde(default)]
    source: Option<String>,
    sequence: u64,
    field: QuoteField,
    value: String,
    #[serde(default)]
    volume: Option<String>,
    #[serde(default)]
    timestamp_ms: Option<i64>,
}

impl EventRecord {
    fn into_event(self, line: u64) -> Result<MarketEvent, TraitError> {
        let parse = |text: &str, what: &str| {
            Decimal::from_str(text.trim()).map_err(|e| {
                TraitError::ParseError(format!("line {}: bad {} '{}': {}", line, what, text, e))
            })
        };

        let value = parse(&self.value, "value")?;
        let volume = match self.volume.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(text) => Some(parse(text, "volume")?),
        };
        let timestamp = match self.timestamp_ms {
            Some(ms) => DateTime::<Utc>::from_timestamp_millis(ms).ok_or_else(|| {
                TraitError::ParseError(format!("line {}: bad timestamp {}", line, ms))
            })?,
            None => Utc::now(),
        };
        let source = match self.source.as_deref().map(str::trim) {
            None | Some("") => SourceId::default(),
            Some(name) => SourceId::new(name),
        };

        Ok(MarketEvent {
            instrument_id: InstrumentId::new(self.instrument_id.trim()),
            source,
            sequence: self.sequence,
            field: self.field,
            value,
            volume,
            timestamp,
        })
    }
}

/// CSV-based market event source for replay and testing.
///
/// Columns: `instrument_id,source,sequence,field,value,volume,timestamp_ms`;
/// `source`, `volume` and `timestamp_ms` may be empty. Events are kept in
/// file order.
pub struct CsvEventSource {
    file_path: PathBuf,
    events: Vec<MarketEvent>,
}

impl CsvEventSource {
    /// Read all events from a CSV file.
    pub fn new(file_path: impl AsRef<Path>) -> Result<Self, TraitError> {
        let file_path = file_path.as_ref().to_path_buf();
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(&file_path)
            .map_err(|e| TraitError::IoError(format!("{}: {}", file_path.display(), e)))?;
        let events = read_events(reader)?;

        tracing::debug!(path = %file_path.display(), events = events.len(), "Market events loaded");
        Ok(Self { file_path, events })
    }

    /// Parse events from CSV text (with header).
    pub fn from_reader<R: std::io::Read>(source: R) -> Result<Self, TraitError> {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(source);
        Ok(Self {
            file_path: PathBuf::new(),
            events: read_events(reader)?,
        })
    }

    /// Source file, empty when read from a reader.
    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Loaded events.
    pub fn events(&self) -> &[MarketEvent] {
        &self.events
    }

    /// Number of loaded events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns true if the file held no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Take the events.
    pub fn into_events(self) -> Vec<MarketEvent> {
        self.events
    }
}

fn read_events<R: std::io::Read>(mut reader: csv::Reader<R>) -> Result<Vec<MarketEvent>, TraitError> {
    let mut events = Vec::new();
    for (i, result) in reader.deserialize::<EventRecord>().enumerate() {
        // Header is line 1.
        let line = i as u64 + 2;
        let record =
            result.map_err(|e| TraitError::ParseError(format!("line {}: {}", line, e)))?;
        events.push(record.into_event(line)?);
    }
    Ok(events)
}
