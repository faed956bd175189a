//! Compact binary codec backed by MessagePack (`rmp-serde`).

use crate::core::call::CallEnvelope;
use crate::core::serialization::{Codec, SerializationFormat};
use crate::core::value::Value;
use crate::error::{MarshalError, Result};

/// MessagePack codec. Fast and small; integers and floats keep their kind,
/// bytes travel as MessagePack `bin`.
#[derive(Debug, Default, Clone, Copy)]
pub struct CompactCodec;

impl CompactCodec {
    fn to_bytes(value: &Value) -> Result<Vec<u8>> {
        rmp_serde::to_vec(value).map_err(|e| MarshalError::Serialization(e.to_string()))
    }

    fn from_bytes(data: &[u8]) -> Result<Value> {
        rmp_serde::from_slice(data).map_err(|e| MarshalError::Decode(e.to_string()))
    }
}

impl Codec for CompactCodec {
    fn name(&self) -> &str {
        SerializationFormat::Compact.name()
    }

    fn class_name(&self) -> &str {
        SerializationFormat::Compact.class_name()
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        Self::to_bytes(value)
    }

    fn decode(&self, data: &[u8]) -> Result<Value> {
        Self::from_bytes(data)
    }

    fn encode_call(&self, call: &CallEnvelope) -> Result<Vec<u8>> {
        Self::to_bytes(&call.to_sequence())
    }

    fn decode_call(&self, data: &[u8]) -> Result<CallEnvelope> {
        CallEnvelope::from_sequence(Self::from_bytes(data)?)
    }
}
