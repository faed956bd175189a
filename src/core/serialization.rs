//! # Serialization Formats
//!
//! This module defines the [`Codec`] contract every wire format implements and
//! the identifiers of the built-in formats.
//!
//! ## Formats
//! - **Binary** (`bincode`): full fidelity, not self-describing
//! - **Compact** (MessagePack): fast and small, minimal fidelity
//! - **Json** (`serde_json`): UTF-8 text, named-field call envelopes
//! - **Literal**: literal data forms only, parsed by a restricted parser
//!
//! ## Contract
//! Codecs work on already-flattened data: they never see live objects and
//! never run reconstruction. Flattening and the reconstruction gate live in
//! [`crate::protocol::Marshaller`], which wraps a codec.
//!
//! ## Usage
//! ```ignore
//! use remote_marshal::core::serialization::{Codec, SerializationFormat};
//!
//! let codec = remote_marshal::codec::JsonCodec;
//! let bytes = codec.encode(&Value::Int(5))?;
//! assert_eq!(codec.decode(&bytes)?, Value::Int(5));
//! ```

use crate::core::call::CallEnvelope;
use crate::core::value::Value;
use crate::error::{MarshalError, Result};
use std::fmt;

/// Module path of codec implementation types on the wire.
pub const CODEC_MODULE: &str = "remote_marshal.codec";

/// Supported serialization formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SerializationFormat {
    /// Full-fidelity binary format (bincode)
    Binary,
    /// Compact binary format (MessagePack)
    Compact,
    /// UTF-8 JSON text
    Json,
    /// Restricted literal-expression text
    Literal,
}

impl SerializationFormat {
    pub const ALL: [SerializationFormat; 4] = [
        SerializationFormat::Binary,
        SerializationFormat::Compact,
        SerializationFormat::Json,
        SerializationFormat::Literal,
    ];

    /// Get the format identifier byte for transports that carry a numeric id
    pub fn format_byte(self) -> u8 {
        match self {
            SerializationFormat::Binary => 0x01,
            SerializationFormat::Compact => 0x02,
            SerializationFormat::Json => 0x03,
            SerializationFormat::Literal => 0x04,
        }
    }

    /// Detect format from identifier byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(SerializationFormat::Binary),
            0x02 => Some(SerializationFormat::Compact),
            0x03 => Some(SerializationFormat::Json),
            0x04 => Some(SerializationFormat::Literal),
            _ => None,
        }
    }

    /// Registry identifier
    pub fn name(self) -> &'static str {
        match self {
            SerializationFormat::Binary => "binary",
            SerializationFormat::Compact => "compact",
            SerializationFormat::Json => "json",
            SerializationFormat::Literal => "literal",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    /// Name of the implementing codec type
    pub fn class_name(self) -> &'static str {
        match self {
            SerializationFormat::Binary => "BinaryCodec",
            SerializationFormat::Compact => "CompactCodec",
            SerializationFormat::Json => "JsonCodec",
            SerializationFormat::Literal => "LiteralCodec",
        }
    }

    /// Fully-qualified type tag of the implementing codec
    pub fn type_tag(self) -> String {
        format!("{CODEC_MODULE}.{}", self.class_name())
    }

    /// Format whose codec type carries this tag
    pub fn from_type_tag(tag: &str) -> Option<Self> {
        let class = tag.strip_prefix(CODEC_MODULE)?.strip_prefix('.')?;
        Self::ALL.into_iter().find(|f| f.class_name() == class)
    }
}

impl fmt::Display for SerializationFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Encode/decode contract of one wire format.
///
/// Implementations must be stateless after construction: one instance is
/// shared by every concurrent call. Each operation left out signals
/// [`MarshalError::Unimplemented`] when invoked.
pub trait Codec: Send + Sync + fmt::Debug + 'static {
    /// Registry identifier, e.g. `json`.
    fn name(&self) -> &str;

    /// Name of the implementing type, e.g. `JsonCodec`.
    fn class_name(&self) -> &str;

    /// Fully-qualified type tag used when the codec itself is sent.
    fn type_tag(&self) -> String {
        format!("{CODEC_MODULE}.{}", self.class_name())
    }

    /// Encode a flattened value.
    fn encode(&self, _value: &Value) -> Result<Vec<u8>> {
        Err(MarshalError::Unimplemented("encode"))
    }

    /// Decode a value; tagged mappings are returned as plain maps.
    fn decode(&self, _data: &[u8]) -> Result<Value> {
        Err(MarshalError::Unimplemented("decode"))
    }

    /// Encode a flattened call envelope as one framed value.
    fn encode_call(&self, _call: &CallEnvelope) -> Result<Vec<u8>> {
        Err(MarshalError::Unimplemented("encode_call"))
    }

    /// Decode a call envelope, rejecting malformed ones.
    fn decode_call(&self, _data: &[u8]) -> Result<CallEnvelope> {
        Err(MarshalError::Unimplemented("decode_call"))
    }
}
