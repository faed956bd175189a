//! Full-fidelity binary codec backed by `bincode`.
//!
//! bincode is not self-describing, so values go through a tagged mirror enum
//! instead of the untagged [`Value`] representation. Every variant survives
//! the round trip, including the bytes/list and int/float distinctions.
//!
//! Decoding walks the mirror through a depth-counting seed and refuses
//! nesting beyond [`MAX_NESTING_DEPTH`](crate::core::value::MAX_NESTING_DEPTH).

use crate::config::MAX_PAYLOAD_SIZE;
use crate::core::call::CallEnvelope;
use crate::core::serialization::{Codec, SerializationFormat};
use crate::core::value::{check_depth, Map, Value};
use crate::error::{MarshalError, Result};
use bincode::Options;
use serde::de::{self, DeserializeSeed, EnumAccess, MapAccess, SeqAccess, VariantAccess, Visitor};
use serde::{Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Serialize)]
enum Tagged {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<Tagged>),
    Map(BTreeMap<String, Tagged>),
}

impl TryFrom<&Value> for Tagged {
    type Error = MarshalError;

    fn try_from(value: &Value) -> Result<Self> {
        Ok(match value {
            Value::None => Tagged::None,
            Value::Bool(b) => Tagged::Bool(*b),
            Value::Int(i) => Tagged::Int(*i),
            Value::Float(f) => Tagged::Float(*f),
            Value::Str(s) => Tagged::Str(s.clone()),
            Value::Bytes(b) => Tagged::Bytes(b.clone()),
            Value::List(items) => {
                Tagged::List(items.iter().map(Tagged::try_from).collect::<Result<_>>()?)
            }
            Value::Map(map) => Tagged::Map(
                map.iter()
                    .map(|(k, v)| Ok((k.clone(), Tagged::try_from(v)?)))
                    .collect::<Result<_>>()?,
            ),
            Value::Object(obj) => {
                return Err(MarshalError::Serialization(format!(
                    "live object {} must be flattened before encoding",
                    obj.type_name()
                )))
            }
        })
    }
}

impl From<Tagged> for Value {
    fn from(tagged: Tagged) -> Self {
        match tagged {
            Tagged::None => Value::None,
            Tagged::Bool(b) => Value::Bool(b),
            Tagged::Int(i) => Value::Int(i),
            Tagged::Float(f) => Value::Float(f),
            Tagged::Str(s) => Value::Str(s),
            Tagged::Bytes(b) => Value::Bytes(b),
            Tagged::List(items) => Value::List(items.into_iter().map(Value::from).collect()),
            Tagged::Map(map) => Value::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect::<Map>(),
            ),
        }
    }
}

const VARIANTS: &[&str] = &["None", "Bool", "Int", "Float", "Str", "Bytes", "List", "Map"];

/// Reads one `Tagged` at a known nesting depth.
#[derive(Clone, Copy, Default)]
struct TaggedSeed {
    depth: usize,
}

impl TaggedSeed {
    fn child(self) -> Self {
        Self {
            depth: self.depth + 1,
        }
    }
}

impl<'de> DeserializeSeed<'de> for TaggedSeed {
    type Value = Tagged;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> std::result::Result<Tagged, D::Error> {
        check_depth::<D::Error>(self.depth)?;
        deserializer.deserialize_enum("Tagged", VARIANTS, self)
    }
}

impl<'de> Visitor<'de> for TaggedSeed {
    type Value = Tagged;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a tagged value")
    }

    fn visit_enum<A: EnumAccess<'de>>(self, data: A) -> std::result::Result<Tagged, A::Error> {
        let (index, variant) = data.variant::<u32>()?;
        Ok(match index {
            0 => {
                variant.unit_variant()?;
                Tagged::None
            }
            1 => Tagged::Bool(variant.newtype_variant()?),
            2 => Tagged::Int(variant.newtype_variant()?),
            3 => Tagged::Float(variant.newtype_variant()?),
            4 => Tagged::Str(variant.newtype_variant()?),
            5 => Tagged::Bytes(variant.newtype_variant()?),
            6 => Tagged::List(variant.newtype_variant_seed(ListSeed(self.child()))?),
            7 => Tagged::Map(variant.newtype_variant_seed(MapSeed(self.child()))?),
            other => {
                return Err(de::Error::invalid_value(
                    de::Unexpected::Unsigned(u64::from(other)),
                    &"a variant index below 8",
                ))
            }
        })
    }
}

struct ListSeed(TaggedSeed);

impl<'de> DeserializeSeed<'de> for ListSeed {
    type Value = Vec<Tagged>;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> std::result::Result<Self::Value, D::Error> {
        deserializer.deserialize_seq(self)
    }
}

impl<'de> Visitor<'de> for ListSeed {
    type Value = Vec<Tagged>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a list of tagged values")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Self::Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0).min(4096));
        while let Some(item) = seq.next_element_seed(self.0)? {
            items.push(item);
        }
        Ok(items)
    }
}

struct MapSeed(TaggedSeed);

impl<'de> DeserializeSeed<'de> for MapSeed {
    type Value = BTreeMap<String, Tagged>;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> std::result::Result<Self::Value, D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for MapSeed {
    type Value = BTreeMap<String, Tagged>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of tagged values")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Self::Value, A::Error> {
        let mut map = BTreeMap::new();
        while let Some(key) = access.next_key::<String>()? {
            let value = access.next_value_seed(self.0)?;
            map.insert(key, value);
        }
        Ok(map)
    }
}

fn options() -> impl Options {
    bincode::DefaultOptions::new().with_limit(MAX_PAYLOAD_SIZE as u64)
}

/// Binary codec (`bincode`).
#[derive(Debug, Default, Clone, Copy)]
pub struct BinaryCodec;

impl BinaryCodec {
    fn to_bytes(value: &Value) -> Result<Vec<u8>> {
        let tagged = Tagged::try_from(value)?;
        options()
            .serialize(&tagged)
            .map_err(|e| MarshalError::Serialization(e.to_string()))
    }

    fn from_bytes(data: &[u8]) -> Result<Value> {
        options()
            .deserialize_seed(TaggedSeed::default(), data)
            .map(Value::from)
            .map_err(|e| MarshalError::Decode(e.to_string()))
    }
}

impl Codec for BinaryCodec {
    fn name(&self) -> &str {
        SerializationFormat::Binary.name()
    }

    fn class_name(&self) -> &str {
        SerializationFormat::Binary.class_name()
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
