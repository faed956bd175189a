//! The shared tables every marshaller reads: converters, codecs and the
//! reconstruction gate's allow-list.

use super::converter::{self, ConverterRegistry};
use super::gate::ReconstructionGate;
use crate::codec::CodecRegistry;
use crate::core::value::{AttributeMapping, Value};
use crate::error::Result;
use std::borrow::Cow;

/// Converter, codec and reconstruction tables in one injectable object.
///
/// Wrap it in an `Arc` and hand it to every
/// [`Marshaller`](super::marshaller::Marshaller) that should share it.
/// Population happens at start-up; the register/unregister calls on the
/// individual tables are safe to use concurrently with marshalling.
#[derive(Debug, Default)]
pub struct MarshalRegistry {
    converters: ConverterRegistry,
    codecs: CodecRegistry,
    gate: ReconstructionGate,
}

impl MarshalRegistry {
    /// A registry with no codecs, converters or allowed classes.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every codec compiled into this build.
    pub fn with_available_codecs() -> Self {
        Self {
            codecs: CodecRegistry::with_available(),
            ..Self::default()
        }
    }

    pub fn converters(&self) -> &ConverterRegistry {
        &self.converters
    }

    pub fn codecs(&self) -> &CodecRegistry {
        &self.codecs
    }

    pub fn gate(&self) -> &ReconstructionGate {
        &self.gate
    }

    /// Flatten every live object inside `value` for encoding.
    pub fn flatten<'a>(&self, value: &'a Value) -> Result<Cow<'a, Value>> {
        converter::flatten(value, &self.converters)
    }

    /// Rebuild every tagged mapping inside a decoded value.
    pub fn recreate(&self, value: Value) -> Result<Value> {
        self.gate.recreate(value, &self.codecs)
    }

    /// Rebuild a single tagged mapping.
    pub fn reconstruct(&self, mapping: &AttributeMapping) -> Result<Value> {
        self.gate.reconstruct(mapping, &self.codecs)
    }
}
