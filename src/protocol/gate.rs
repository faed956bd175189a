//! Class reconstruction gate.
//!
//! Every tagged mapping that comes off the wire passes through here before a
//! caller sees it. The gate is default-deny: a tag is rebuilt only when it
//! names a core protocol type, a codec, an allow-listed exception or a type
//! the application registered explicitly. Anything else is refused, and a tag
//! containing `__` is refused before any lookup happens.

use crate::codec::CodecRegistry;
use crate::core::exception::{is_allowed_exception, Exception};
use crate::core::objects::{Daemon, Proxy, RemoteObject, Uri, DAEMON_TAG, PROXY_TAG, URI_TAG};
use crate::core::serialization::{Codec, SerializationFormat};
use crate::core::value::{AttributeMapping, Map, Object, Value, MAX_NESTING_DEPTH};
use crate::error::{constants, MarshalError, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

/// Maximum nesting followed while recreating objects.
pub const MAX_RECREATE_DEPTH: usize = MAX_NESTING_DEPTH;

type RebuildFn = dyn Fn(&AttributeMapping) -> Result<Value> + Send + Sync;

/// How a given type tag may be rebuilt.
#[derive(Clone)]
pub enum Reconstructible {
    Uri,
    Proxy,
    Daemon,
    /// A registered codec instance, matched by its full type tag or class name.
    Codec(Arc<dyn Codec>),
    /// An allow-listed exception type.
    Exception,
    /// A type the application allowed with its own rebuild function.
    Application(Arc<RebuildFn>),
}

impl fmt::Debug for Reconstructible {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reconstructible::Uri => f.write_str("Uri"),
            Reconstructible::Proxy => f.write_str("Proxy"),
            Reconstructible::Daemon => f.write_str("Daemon"),
            Reconstructible::Codec(codec) => f.debug_tuple("Codec").field(&codec.name()).finish(),
            Reconstructible::Exception => f.write_str("Exception"),
            Reconstructible::Application(_) => f.write_str("Application"),
        }
    }
}

/// Allow-list of application types plus the fixed reconstruction rules.
#[derive(Default)]
pub struct ReconstructionGate {
    rules: RwLock<BTreeMap<String, Arc<RebuildFn>>>,
}

impl fmt::Debug for ReconstructionGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tags: Vec<String> = self
            .rules
            .read()
            .map(|rules| rules.keys().cloned().collect())
            .unwrap_or_default();
        f.debug_struct("ReconstructionGate").field("allowed", &tags).finish()
    }
}

impl ReconstructionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trust `tag` and rebuild it with `rebuild`.
    ///
    /// # Errors
    /// `MarshalError::Security` if the tag contains `__`; such a tag could
    /// never be reconstructed anyway.
    pub fn allow<T, F>(&self, tag: impl Into<String>, rebuild: F) -> Result<()>
    where
        T: RemoteObject,
        F: Fn(&AttributeMapping) -> Result<T> + Send + Sync + 'static,
    {
        let tag = tag.into();
        check_tag(&tag)?;
        let rule: Arc<RebuildFn> =
            Arc::new(move |mapping: &AttributeMapping| rebuild(mapping).map(Value::instance));
        self.rules
            .write()
            .map_err(|_| poisoned())?
            .insert(tag.clone(), rule);
        info!(class = %tag, "class allowed for reconstruction");
        Ok(())
    }

    /// Withdraw trust in `tag`. Returns whether it was allowed.
    pub fn disallow(&self, tag: &str) -> Result<bool> {
        let removed = self
            .rules
            .write()
            .map_err(|_| poisoned())?
            .remove(tag)
            .is_some();
        if removed {
            info!(class = %tag, "class disallowed");
        }
        Ok(removed)
    }

    pub fn is_allowed(&self, tag: &str) -> bool {
        self.rules
            .read()
            .map(|rules| rules.contains_key(tag))
            .unwrap_or(false)
    }

    /// Decide how `tag` may be rebuilt, without rebuilding anything.
    pub fn classify(&self, tag: &str, codecs: &CodecRegistry) -> Result<Reconstructible> {
        check_tag(tag)?;

        match tag {
            URI_TAG => return Ok(Reconstructible::Uri),
            PROXY_TAG => return Ok(Reconstructible::Proxy),
            DAEMON_TAG => return Ok(Reconstructible::Daemon),
            _ => {}
        }

        if let Some(format) = SerializationFormat::from_type_tag(tag) {
            return match codecs.get(format.name()) {
                Ok(codec) => Ok(Reconstructible::Codec(codec)),
                Err(MarshalError::UnknownCodec(_)) => {
                    warn!(class = %tag, "codec not available in this build");
                    Err(MarshalError::Protocol(format!(
                        "{}: {tag} (codec not available)",
                        constants::ERR_UNSUPPORTED_CLASS
                    )))
                }
                Err(other) => Err(other),
            };
        }

        if is_allowed_exception(tag) {
            return Ok(Reconstructible::Exception);
        }

        if let Some(codec) = codecs.find_by_class(tag)? {
            return Ok(Reconstructible::Codec(codec));
        }

        let rule = self.rules.read().map_err(|_| poisoned())?.get(tag).cloned();
        match rule {
            Some(rule) => Ok(Reconstructible::Application(rule)),
            None => {
                warn!(class = %tag, "refused to reconstruct unsupported class");
                Err(MarshalError::Protocol(format!(
                    "{}: {tag}",
                    constants::ERR_UNSUPPORTED_CLASS
                )))
            }
        }
    }

    /// Rebuild a live value from a tagged mapping whose children are already
    /// rebuilt.
    pub fn reconstruct(&self, mapping: &AttributeMapping, codecs: &CodecRegistry) -> Result<Value> {
        let kind = self.classify(mapping.class(), codecs)?;
        debug!(class = %mapping.class(), kind = ?kind, "reconstructing");
        let value = match kind {
            Reconstructible::Uri => {
                Value::Object(Object::Uri(Uri::restore_state(state(mapping)?)?))
            }
            Reconstructible::Proxy => {
                Value::Object(Object::Proxy(Proxy::restore_state(state(mapping)?)?))
            }
            Reconstructible::Daemon => Value::Object(Object::Daemon(Daemon::restore_state())),
            Reconstructible::Codec(codec) => Value::Object(Object::Codec(codec)),
            Reconstructible::Exception => {
                let args = match mapping.get("args") {
                    Some(Value::List(args)) => args.clone(),
                    Some(_) => {
                        return Err(MarshalError::Decode(format!(
                            "exception {} has non-sequence args",
                            mapping.class()
                        )))
                    }
                    None => {
                        return Err(MarshalError::Decode(format!(
                            "exception {} is missing its args",
                            mapping.class()
                        )))
                    }
                };
                Value::Object(Object::Exception(Exception::new(mapping.class(), args)))
            }
            Reconstructible::Application(rebuild) => rebuild(mapping)?,
        };
        Ok(value)
    }

    /// Walk a decoded value and rebuild every tagged mapping, innermost first.
    /// Untagged maps are plain data and only their contents are visited.
    pub fn recreate(&self, value: Value, codecs: &CodecRegistry) -> Result<Value> {
        self.recreate_at(value, codecs, 0)
    }

    fn recreate_at(&self, value: Value, codecs: &CodecRegistry, depth: usize) -> Result<Value> {
        if depth > MAX_RECREATE_DEPTH {
            return Err(MarshalError::Decode(
                constants::ERR_NESTING_TOO_DEEP.to_string(),
            ));
        }
        match value {
            Value::List(items) => items
                .into_iter()
                .map(|item| self.recreate_at(item, codecs, depth + 1))
                .collect::<Result<Vec<_>>>()
                .map(Value::List),
            Value::Map(map) => {
                let map = map
                    .into_iter()
                    .map(|(k, v)| Ok((k, self.recreate_at(v, codecs, depth + 1)?)))
                    .collect::<Result<Map>>()?;
                match AttributeMapping::from_map(map) {
                    Ok(mapping) => self.reconstruct(&mapping, codecs),
                    Err(map) if map.contains_key(crate::core::value::CLASS_KEY) => {
                        warn!("refused class tag that is not a string");
                        Err(MarshalError::Protocol(format!(
                            "{}: non-string class tag",
                            constants::ERR_UNSUPPORTED_CLASS
                        )))
                    }
                    Err(map) => Ok(Value::Map(map)),
                }
            }
            other => Ok(other),
        }
    }
}

fn check_tag(tag: &str) -> Result<()> {
    if tag.contains("__") {
        warn!(class = %tag, "refused class tag containing double underscores");
        return Err(MarshalError::Security(format!(
            "{}: {tag}",
            constants::ERR_DOUBLE_UNDERSCORE
        )));
    }
    Ok(())
}

fn state(mapping: &AttributeMapping) -> Result<&Value> {
    mapping
        .get("state")
        .ok_or_else(|| MarshalError::Decode(format!("{} is missing its state", mapping.class())))
}

fn poisoned() -> MarshalError {
    MarshalError::Protocol(constants::ERR_LOCK_POISONED.to_string())
}
