//! Table of available codec instances keyed by name.

use crate::core::serialization::{Codec, SerializationFormat};
use crate::error::{constants, MarshalError, Result};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// Codec instances for every backend compiled into this build.
pub fn available_codecs() -> Vec<Arc<dyn Codec>> {
    let mut codecs: Vec<Arc<dyn Codec>> = Vec::new();
    #[cfg(feature = "binary")]
    codecs.push(Arc::new(super::BinaryCodec));
    #[cfg(feature = "compact")]
    codecs.push(Arc::new(super::CompactCodec));
    #[cfg(feature = "json")]
    codecs.push(Arc::new(super::JsonCodec));
    codecs.push(Arc::new(super::LiteralCodec));
    codecs
}

/// Codec instances keyed by registry name.
///
/// Lookups take the read lock only long enough to clone an `Arc`.
#[derive(Debug, Default)]
pub struct CodecRegistry {
    codecs: RwLock<BTreeMap<String, Arc<dyn Codec>>>,
}

impl CodecRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every backend compiled into this build.
    /// Missing backends are left out silently.
    pub fn with_available() -> Self {
        let codecs: BTreeMap<String, Arc<dyn Codec>> = available_codecs()
            .into_iter()
            .map(|codec| (codec.name().to_string(), codec))
            .collect();
        info!(codecs = ?codecs.keys().collect::<Vec<_>>(), "codec registry populated");
        Self {
            codecs: RwLock::new(codecs),
        }
    }

    /// Register a codec under its own name, returning any codec it replaced.
    pub fn register(&self, codec: Arc<dyn Codec>) -> Result<Option<Arc<dyn Codec>>> {
        let name = codec.name().to_string();
        let mut codecs = self.codecs.write().map_err(|_| poisoned())?;
        let replaced = codecs.insert(name.clone(), codec);
        info!(codec = %name, replaced = replaced.is_some(), "codec registered");
        Ok(replaced)
    }

    pub fn unregister(&self, name: &str) -> Result<Option<Arc<dyn Codec>>> {
        let mut codecs = self.codecs.write().map_err(|_| poisoned())?;
        let removed = codecs.remove(name);
        if removed.is_some() {
            info!(codec = %name, "codec unregistered");
        }
        Ok(removed)
    }

    /// Look up a codec by name.
    ///
    /// # Errors
    /// Returns `MarshalError::UnknownCodec` if no such codec is registered.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Codec>> {
        let codecs = self.codecs.read().map_err(|_| poisoned())?;
        let codec = codecs
            .get(name)
            .cloned()
            .ok_or_else(|| MarshalError::UnknownCodec(name.to_string()))?;
        debug!(codec = %name, "codec selected");
        Ok(codec)
    }

    /// Look up a built-in codec by its numeric format id.
    pub fn get_by_byte(&self, byte: u8) -> Result<Arc<dyn Codec>> {
        let format = SerializationFormat::from_byte(byte)
            .ok_or_else(|| MarshalError::UnknownCodec(format!("format id {byte:#04x}")))?;
        self.get(format.name())
    }

    /// Registered codec whose implementing type is named `class_name`.
    pub fn find_by_class(&self, class_name: &str) -> Result<Option<Arc<dyn Codec>>> {
        let codecs = self.codecs.read().map_err(|_| poisoned())?;
        Ok(codecs
            .values()
            .find(|codec| codec.class_name() == class_name)
            .cloned())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.codecs
            .read()
            .map(|codecs| codecs.contains_key(name))
            .unwrap_or(false)
    }

    pub fn names(&self) -> Result<Vec<String>> {
        let codecs = self.codecs.read().map_err(|_| poisoned())?;
        Ok(codecs.keys().cloned().collect())
    }
}

fn poisoned() -> MarshalError {
    MarshalError::Protocol(constants::ERR_LOCK_POISONED.to_string())
}
