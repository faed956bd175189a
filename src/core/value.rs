//! # Dynamic Values
//!
//! [`Value`] is the data model every codec speaks. Plain variants map onto the
//! natural types of self-describing formats (JSON, MessagePack, the literal
//! format); [`Value::Object`] holds a live object that must be flattened into
//! an attribute mapping before any codec sees it.
//!
//! The `Serialize`/`Deserialize` impls here are the untagged, self-describing
//! representation. Formats that are not self-describing (bincode) use their
//! own tagged mirror, see `codec::binary`. Both decode through a depth
//! counting seed, so hostile nesting fails with a decode error instead of
//! exhausting the stack.

use crate::core::exception::Exception;
use crate::core::objects::{Daemon, Proxy, RemoteObject, Uri};
use crate::core::serialization::Codec;
use crate::error::constants;
use serde::de::{self, DeserializeSeed, MapAccess, SeqAccess, Visitor};
use serde::ser::{self, SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Reserved key holding the fully-qualified type tag of an attribute mapping.
pub const CLASS_KEY: &str = "__class__";

/// Deepest list/map nesting any decoder accepts.
pub const MAX_NESTING_DEPTH: usize = 256;

/// Fail once `depth` passes [`MAX_NESTING_DEPTH`].
pub(crate) fn check_depth<E: de::Error>(depth: usize) -> Result<(), E> {
    if depth > MAX_NESTING_DEPTH {
        Err(E::custom(constants::ERR_NESTING_TOO_DEEP))
    } else {
        Ok(())
    }
}

/// String-keyed, ordered mapping.
pub type Map = BTreeMap<String, Value>;

/// A dynamically typed value.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Map(Map),
    Object(Object),
}

impl Value {
    /// Name of the variant, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "none",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Object(_) => "object",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    /// True if a live object sits anywhere inside this value.
    pub fn contains_objects(&self) -> bool {
        match self {
            Value::Object(_) => true,
            Value::List(items) => items.iter().any(Value::contains_objects),
            Value::Map(map) => map.values().any(Value::contains_objects),
            _ => false,
        }
    }

    /// Wrap an application object.
    pub fn instance<T: RemoteObject>(object: T) -> Self {
        Value::Object(Object::Instance(Arc::new(object)))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => f.write_str("None"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Bytes(b) => write!(f, "b{:?}", String::from_utf8_lossy(b)),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Map(map) => {
                f.write_str("{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k:?}: {v}")?;
                }
                f.write_str("}")
            }
            Value::Object(obj) => write!(f, "<{}>", obj.type_name()),
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v.into())
            }
        })*
    };
}

value_from! {
    bool => Bool,
    i64 => Int,
    i32 => Int,
    u32 => Int,
    f64 => Float,
    String => Str,
    &str => Str,
    Vec<u8> => Bytes,
    Vec<Value> => List,
    Map => Map,
}

impl From<Exception> for Value {
    fn from(e: Exception) -> Self {
        Value::Object(Object::Exception(e))
    }
}

impl From<Uri> for Value {
    fn from(u: Uri) -> Self {
        Value::Object(Object::Uri(u))
    }
}

impl From<Proxy> for Value {
    fn from(p: Proxy) -> Self {
        Value::Object(Object::Proxy(p))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::None, Into::into)
    }
}

/// A live object carried inside a [`Value`].
#[derive(Clone)]
pub enum Object {
    Uri(Uri),
    Proxy(Proxy),
    Daemon(Daemon),
    Codec(Arc<dyn Codec>),
    Exception(Exception),
    Instance(Arc<dyn RemoteObject>),
}

impl Object {
    /// Fully-qualified type name of the object.
    pub fn type_name(&self) -> String {
        match self {
            Object::Uri(u) => u.type_tag(),
            Object::Proxy(p) => p.type_tag(),
            Object::Daemon(d) => d.type_tag(),
            Object::Codec(c) => c.type_tag(),
            Object::Exception(e) => e.class().to_string(),
            Object::Instance(i) => i.type_tag(),
        }
    }

    /// The object viewed through the flattening hooks, if it has them.
    pub fn as_remote(&self) -> Option<&dyn RemoteObject> {
        match self {
            Object::Uri(u) => Some(u),
            Object::Proxy(p) => Some(p),
            Object::Daemon(d) => Some(d),
            Object::Instance(i) => Some(i.as_ref()),
            Object::Codec(_) | Object::Exception(_) => None,
        }
    }

    /// The concrete object as `Any`; codecs are exposed as `Arc<dyn Codec>`.
    pub fn as_any(&self) -> &dyn Any {
        match self {
            Object::Uri(u) => u,
            Object::Proxy(p) => p,
            Object::Daemon(d) => d,
            Object::Codec(c) => c,
            Object::Exception(e) => e,
            Object::Instance(i) => i.as_any(),
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::Uri(u) => f.debug_tuple("Uri").field(u).finish(),
            Object::Proxy(p) => f.debug_tuple("Proxy").field(p).finish(),
            Object::Daemon(d) => f.debug_tuple("Daemon").field(d).finish(),
            Object::Codec(c) => f.debug_tuple("Codec").field(&c.class_name()).finish(),
            Object::Exception(e) => f.debug_tuple("Exception").field(e).finish(),
            Object::Instance(i) => f.debug_tuple("Instance").field(i).finish(),
        }
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Object::Uri(a), Object::Uri(b)) => a == b,
            (Object::Proxy(a), Object::Proxy(b)) => a == b,
            (Object::Daemon(a), Object::Daemon(b)) => a == b,
            (Object::Codec(a), Object::Codec(b)) => a.class_name() == b.class_name(),
            (Object::Exception(a), Object::Exception(b)) => a == b,
            (Object::Instance(a), Object::Instance(b)) => {
                std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            }
            _ => false,
        }
    }
}

/// Decoded key/value data tagged with a type name, pending reconstruction.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeMapping {
    class: String,
    attributes: Map,
}

impl AttributeMapping {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            attributes: Map::new(),
        }
    }

    /// Builder-style attribute insertion.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(key.into(), value.into());
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn attributes(&self) -> &Map {
        &self.attributes
    }

    /// Split a map carrying a string type tag under [`CLASS_KEY`].
    /// Untagged maps are handed back unchanged.
    pub fn from_map(mut map: Map) -> Result<Self, Map> {
        match map.remove(CLASS_KEY) {
            Some(Value::Str(class)) => Ok(Self {
                class,
                attributes: map,
            }),
            Some(other) => {
                map.insert(CLASS_KEY.to_string(), other);
                Err(map)
            }
            None => Err(map),
        }
    }

    /// The wire form: attributes plus the reserved type-tag key.
    pub fn into_map(self) -> Map {
        let mut map = self.attributes;
        map.insert(CLASS_KEY.to_string(), Value::Str(self.class));
        map
    }
}

impl From<AttributeMapping> for Value {
    fn from(m: AttributeMapping) -> Self {
        Value::Map(m.into_map())
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::None => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Str(s) => serializer.serialize_str(s),
            Value::Bytes(b) => serializer.serialize_bytes(b),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
            Value::Object(obj) => Err(ser::Error::custom(format!(
                "live object {} must be flattened before encoding",
                obj.type_name()
            ))),
        }
    }
}

/// Deserializes a [`Value`] whose container nesting is bounded.
#[derive(Debug, Clone, Copy, Default)]
struct ValueSeed {
    depth: usize,
}

impl ValueSeed {
    fn child(self) -> Self {
        Self {
            depth: self.depth + 1,
        }
    }
}

impl<'de> DeserializeSeed<'de> for ValueSeed {
    type Value = Value;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        check_depth::<D::Error>(self.depth)?;
        deserializer.deserialize_any(ValueVisitor { seed: self })
    }
}

struct ValueVisitor {
    seed: ValueSeed,
}

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a literal value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        i64::try_from(v)
            .map(Value::Int)
            .map_err(|_| E::custom(format!("integer {v} out of range")))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Value::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::Str(v.to_owned()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::Str(v))
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Value, E> {
        Ok(Value::Bytes(v.to_vec()))
    }

    fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<Value, E> {
        Ok(Value::Bytes(v))
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::None)
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::None)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        self.seed.deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let child = self.seed.child();
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0).min(4096));
        while let Some(item) = seq.next_element_seed(child)? {
            items.push(item);
        }
        Ok(Value::List(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Value, A::Error> {
        let child = self.seed.child();
        let mut map = Map::new();
        while let Some(key) = access.next_key::<String>()? {
            let value = access.next_value_seed(child)?;
            map.insert(key, value);
        }
        Ok(Value::Map(map))
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        ValueSeed::default().deserialize(deserializer)
    }
}
