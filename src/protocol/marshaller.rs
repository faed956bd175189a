//! # Marshaller
//!
//! The front end callers use: one codec, the shared [`MarshalRegistry`] and a
//! [`CompressionPolicy`].
//!
//! Encoding flattens live objects first, then hands pure data to the codec.
//! Decoding runs the codec, then passes every tagged mapping through the
//! reconstruction gate. A failure anywhere fails the whole value.
//!
//! ## Example
//! ```rust,no_run
//! use remote_marshal::{Marshaller, MarshalRegistry, Value};
//! use std::sync::Arc;
//!
//! # fn main() -> remote_marshal::Result<()> {
//! let registry = Arc::new(MarshalRegistry::with_available_codecs());
//! let marshaller = Marshaller::for_codec("literal", registry)?;
//! let payload = marshaller.serialize_data(&Value::from("hello"), false)?;
//! let value = marshaller.deserialize_data(&payload.data, payload.compressed)?;
//! assert_eq!(value, Value::from("hello"));
//! # Ok(())
//! # }
//! ```

use super::registry::MarshalRegistry;
use crate::config::MarshalConfig;
use crate::core::call::{CallEnvelope, SerializedPayload};
use crate::core::serialization::Codec;
use crate::core::value::{Map, Value};
use crate::error::Result;
use crate::utils::compression::CompressionPolicy;
use std::borrow::Cow;
use std::sync::Arc;
use tracing::trace;

/// A codec bound to a registry and a compression policy.
#[derive(Debug, Clone)]
pub struct Marshaller {
    codec: Arc<dyn Codec>,
    registry: Arc<MarshalRegistry>,
    policy: CompressionPolicy,
    compress_by_default: bool,
}

impl Marshaller {
    pub fn new(codec: Arc<dyn Codec>, registry: Arc<MarshalRegistry>) -> Self {
        Self {
            codec,
            registry,
            policy: CompressionPolicy::default(),
            compress_by_default: false,
        }
    }

    /// Marshaller for the codec registered as `name`.
    ///
    /// # Errors
    /// `MarshalError::UnknownCodec` if the registry has no such codec.
    pub fn for_codec(name: &str, registry: Arc<MarshalRegistry>) -> Result<Self> {
        let codec = registry.codecs().get(name)?;
        Ok(Self::new(codec, registry))
    }

    /// Marshaller for the configured default codec and compression policy.
    pub fn from_config(config: &MarshalConfig, registry: Arc<MarshalRegistry>) -> Result<Self> {
        let mut marshaller =
            Self::for_codec(&config.marshal.default_codec, registry)?.with_policy(config.policy());
        marshaller.compress_by_default = config.compression.enabled;
        Ok(marshaller)
    }

    pub fn with_policy(mut self, policy: CompressionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn codec(&self) -> &Arc<dyn Codec> {
        &self.codec
    }

    pub fn registry(&self) -> &Arc<MarshalRegistry> {
        &self.registry
    }

    pub fn policy(&self) -> &CompressionPolicy {
        &self.policy
    }

    /// Whether the configuration asks for compression when the caller does
    /// not say otherwise.
    pub fn compress_by_default(&self) -> bool {
        self.compress_by_default
    }

    /// Encode a value.
    ///
    /// # Errors
    /// `MarshalError::Serialization` if a live object inside it has no
    /// flattening path, or the codec cannot represent the result.
    pub fn dumps(&self, value: &Value) -> Result<Vec<u8>> {
        let flat = self.registry.flatten(value)?;
        let data = self.codec.encode(&flat)?;
        trace!(codec = self.codec.name(), len = data.len(), "value encoded");
        Ok(data)
    }

    /// Decode a value and rebuild its tagged mappings.
    pub fn loads(&self, data: &[u8]) -> Result<Value> {
        trace!(codec = self.codec.name(), len = data.len(), "decoding value");
        let value = self.codec.decode(data)?;
        self.registry.recreate(value)
    }

    /// Encode a call envelope in the codec's envelope form.
    pub fn dumps_call(&self, call: &CallEnvelope) -> Result<Vec<u8>> {
        let flat = self.flatten_call(call)?;
        let data = self.codec.encode_call(&flat)?;
        trace!(
            codec = self.codec.name(),
            method = %call.method,
            len = data.len(),
            "call encoded"
        );
        Ok(data)
    }

    /// Decode a call envelope and rebuild the tagged mappings in its target
    /// and arguments.
    pub fn loads_call(&self, data: &[u8]) -> Result<CallEnvelope> {
        let (target, method, args, kwargs) = self.codec.decode_call(data)?.into_parts();
        let target = self.registry.recreate(target)?;
        let args = args
            .into_iter()
            .map(|arg| self.registry.recreate(arg))
            .collect::<Result<Vec<_>>>()?;
        let kwargs = kwargs
            .into_iter()
            .map(|(k, v)| Ok((k, self.registry.recreate(v)?)))
            .collect::<Result<Map>>()?;
        trace!(codec = self.codec.name(), method = %method, "call decoded");
        Ok(CallEnvelope {
            target,
            method,
            args,
            kwargs,
        })
    }

    fn flatten_call<'a>(&self, call: &'a CallEnvelope) -> Result<Cow<'a, CallEnvelope>> {
        let has_objects = call.target.contains_objects()
            || call.args.iter().any(Value::contains_objects)
            || call.kwargs.values().any(Value::contains_objects);
        if !has_objects {
            return Ok(Cow::Borrowed(call));
        }
        let flatten = |v: &Value| self.registry.flatten(v).map(Cow::into_owned);
        Ok(Cow::Owned(CallEnvelope {
            target: flatten(&call.target)?,
            method: call.method.clone(),
            args: call.args.iter().map(&flatten).collect::<Result<Vec<_>>>()?,
            kwargs: call
                .kwargs
                .iter()
                .map(|(k, v)| Ok((k.clone(), flatten(v)?)))
                .collect::<Result<Map>>()?,
        }))
    }

    /// [`Marshaller::dumps`] plus the compression policy.
    pub fn serialize_data(&self, value: &Value, compress: bool) -> Result<SerializedPayload> {
        let (data, compressed) = self.policy.apply(self.dumps(value)?, compress)?;
        Ok(SerializedPayload::new(data, compressed))
    }

    /// [`Marshaller::serialize_data`] with the configured compression switch.
    pub fn serialize_data_default(&self, value: &Value) -> Result<SerializedPayload> {
        self.serialize_data(value, self.compress_by_default)
    }

    /// Decompress if flagged, then [`Marshaller::loads`].
    pub fn deserialize_data(&self, data: &[u8], compressed: bool) -> Result<Value> {
        let data = self.policy.restore(data, compressed)?;
        self.loads(&data)
    }

    pub fn serialize_call(&self, call: &CallEnvelope, compress: bool) -> Result<SerializedPayload> {
        let (data, compressed) = self.policy.apply(self.dumps_call(call)?, compress)?;
        Ok(SerializedPayload::new(data, compressed))
    }

    pub fn serialize_call_default(&self, call: &CallEnvelope) -> Result<SerializedPayload> {
        self.serialize_call(call, self.compress_by_default)
    }

    pub fn deserialize_call(&self, data: &[u8], compressed: bool) -> Result<CallEnvelope> {
        let data = self.policy.restore(data, compressed)?;
        self.loads_call(&data)
    }
}
