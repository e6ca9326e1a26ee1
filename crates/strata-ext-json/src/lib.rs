//! # Strata Ext JSON
//!
//! JSON codec for the Strata pricing engine transport layer.
//!
//! Price records and alerts leave the engine as JSON objects, one per
//! message. [`JsonCodec::encode_line`] produces the newline-delimited form
//! used by file and socket sinks.

#![warn(missing_docs)]
#![warn(clippy::all)]

use bytes::{BufMut, Bytes, BytesMut};
use serde::{de::DeserializeOwned, Serialize};

use strata_traits::error::TraitError;
use strata_traits::transport::Codec;

/// JSON codec using serde_json.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec {
    pretty: bool,
}

impl JsonCodec {
    /// Compact JSON.
    pub fn new() -> Self {
        Self { pretty: false }
    }

    /// Indented JSON (for debugging).
    pub fn pretty() -> Self {
        Self { pretty: true }
    }

    /// Encode one value as a single newline-terminated line.
    ///
    /// Always compact, regardless of `pretty`, so that each line holds
    /// exactly one value.
    pub fn encode_line<T: Serialize>(&self, value: &T) -> Result<Bytes, TraitError> {
        let mut buf = BytesMut::new().writer();
        serde_json::to_writer(&mut buf, value)
            .map_err(|e| TraitError::SerializationError(e.to_string()))?;
        let mut buf = buf.into_inner();
        buf.put_u8(b'\n');
        Ok(buf.freeze())
    }
}

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Bytes, TraitError> {
        let encoded = if self.pretty {
            serde_json::to_vec_pretty(value)
        } else {
            serde_json::to_vec(value)
        };
        encoded
            .map(Bytes::from)
            .map_err(|e| TraitError::SerializationError(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, TraitError> {
        serde_json::from_slice(bytes).map_err(|e| TraitError::ParseError(e.to_string()))
    }

    fn content_type(&self) -> &'static str {
        "application/json"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use strata_traits::ids::Version;
    use strata_traits::pricing::{FailureReason, PriceRecord, PriceStatus, ValuationError};

    fn failed_record() -> PriceRecord {
        PriceRecord {
            instrument_id: "D1".into(),
            price: Some(dec!(100.5)),
            version: Version::new(3),
            inputs: Vec::new(),
            observation_version: None,
            computed_at: Utc::now(),
            status: PriceStatus::Failed,
            failure: Some(FailureReason::Valuation(ValuationError::MissingInput(
                "input #0 has no price".into(),
            ))),
        }
    }

    #[test]
    fn test_record_wire_shape() {
        let codec = JsonCodec::new();
        let encoded = codec.encode(&failed_record()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&encoded).unwrap();

        assert_eq!(value["instrument_id"], "D1");
        assert_eq!(value["version"], 3);
        assert_eq!(value["status"], "failed");

        let decoded: PriceRecord = codec.decode(&encoded).unwrap();
        assert_eq!(decoded.failure, failed_record().failure);
    }

    #[test]
    fn test_encode_line_is_single_line() {
        let codec = JsonCodec::pretty();
        let line = codec.encode_line(&failed_record()).unwrap();

        assert_eq!(line.last(), Some(&b'\n'));
        assert_eq!(line.iter().filter(|b| **b == b'\n').count(), 1);
        assert!(codec.encode(&failed_record()).unwrap().contains(&b'\n'));
    }

    #[test]
    fn test_decode_error() {
        let codec = JsonCodec::new();
        let result: Result<PriceRecord, _> = codec.decode(b"{not json");
        assert!(matches!(result, Err(TraitError::ParseError(_))));
        assert_eq!(codec.content_type(), "application/json");
    }
}
