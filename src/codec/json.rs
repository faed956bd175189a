//! UTF-8 JSON codec backed by `serde_json`.
//!
//! Calls travel as a named-field record (`object`, `method`, `params`,
//! `kwargs`). Bytes have no JSON form and come back as a list of integers.
//! NaN and infinities have no JSON form either and are refused on encode.

use crate::core::call::CallEnvelope;
use crate::core::serialization::{Codec, SerializationFormat};
use crate::core::value::Value;
use crate::error::{MarshalError, Result};

/// JSON text codec.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl JsonCodec {
    fn to_bytes(value: &Value) -> Result<Vec<u8>> {
        reject_non_finite(value)?;
        serde_json::to_vec(value).map_err(|e| MarshalError::Serialization(e.to_string()))
    }

    fn from_bytes(data: &[u8]) -> Result<Value> {
        let text = std::str::from_utf8(data)
            .map_err(|e| MarshalError::Decode(format!("json payload is not UTF-8: {e}")))?;
        serde_json::from_str(text).map_err(|e| MarshalError::Decode(e.to_string()))
    }
}

fn reject_non_finite(value: &Value) -> Result<()> {
    match value {
        Value::Float(f) if !f.is_finite() => Err(MarshalError::Serialization(format!(
            "non-finite float {f} has no JSON form"
        ))),
        Value::List(items) => items.iter().try_for_each(reject_non_finite),
        Value::Map(map) => map.values().try_for_each(reject_non_finite),
        _ => Ok(()),
    }
}

impl Codec for JsonCodec {
    fn name(&self) -> &str {
        SerializationFormat::Json.name()
    }

    fn class_name(&self) -> &str {
        SerializationFormat::Json.class_name()
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        Self::to_bytes(value)
    }

    fn decode(&self, data: &[u8]) -> Result<Value> {
        Self::from_bytes(data)
    }

    fn encode_call(&self, call: &CallEnvelope) -> Result<Vec<u8>> {
        Self::to_bytes(&call.to_record())
    }

    fn decode_call(&self, data: &[u8]) -> Result<CallEnvelope> {
        CallEnvelope::from_record(Self::from_bytes(data)?)
    }
}
