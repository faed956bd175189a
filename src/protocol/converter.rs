//! Converter registry and the object flattening chain.
//!
//! Flattening turns every live [`Object`] inside a value into a plain map so a
//! codec can encode it. Strategies run in a fixed order and the first that
//! yields a map wins:
//!
//! 1. a registered converter (registration order, first match)
//! 2. clearing the daemon back-reference (never yields a map)
//! 3. the exception form `{"args": [...], "__class__": <type>}`
//! 4. the object's state-export hook
//! 5. the object's public attribute set
//! 6. the object's declared slots
//!
//! Overlapping converters resolve by registration order, not by how specific
//! their match is.

use crate::core::objects::RemoteObject;
use crate::core::value::{Map, Object, Value, CLASS_KEY};
use crate::error::{constants, MarshalError, Result};
use std::any::{Any, TypeId};
use std::borrow::Cow;
use std::sync::{Arc, RwLock};
use tracing::{info, trace};

/// Maximum object nesting followed while flattening.
pub const MAX_FLATTEN_DEPTH: usize = 256;

type MatchFn = dyn Fn(&Object) -> bool + Send + Sync;
type ConvertFn = dyn Fn(&Object) -> Option<Map> + Send + Sync;

#[derive(Debug, Clone, PartialEq, Eq)]
enum ConverterKey {
    Type(TypeId),
    Label(String),
}

struct ConverterEntry {
    key: ConverterKey,
    matches: Box<MatchFn>,
    convert: Box<ConvertFn>,
}

/// Ordered list of application converters.
#[derive(Default)]
pub struct ConverterRegistry {
    entries: RwLock<Vec<Arc<ConverterEntry>>>,
}

impl std::fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys: Vec<_> = self
            .entries
            .read()
            .map(|entries| entries.iter().map(|e| format!("{:?}", e.key)).collect())
            .unwrap_or_default();
        f.debug_struct("ConverterRegistry").field("entries", &keys).finish()
    }
}

impl ConverterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a converter for objects of concrete type `T`.
    ///
    /// Re-registering a type replaces its converter and keeps its position.
    pub fn register<T, F>(&self, converter: F) -> Result<()>
    where
        T: Any,
        F: Fn(&T) -> Map + Send + Sync + 'static,
    {
        let entry = ConverterEntry {
            key: ConverterKey::Type(TypeId::of::<T>()),
            matches: Box::new(|obj: &Object| obj.downcast_ref::<T>().is_some()),
            convert: Box::new(move |obj: &Object| obj.downcast_ref::<T>().map(&converter)),
        };
        self.insert(entry, std::any::type_name::<T>())
    }

    /// Register a converter for every object accepted by `matches`.
    /// Use this for families of types, e.g. all objects with a tag prefix.
    pub fn register_where<M, F>(&self, label: impl Into<String>, matches: M, converter: F) -> Result<()>
    where
        M: Fn(&Object) -> bool + Send + Sync + 'static,
        F: Fn(&Object) -> Map + Send + Sync + 'static,
    {
        let label = label.into();
        let entry = ConverterEntry {
            key: ConverterKey::Label(label.clone()),
            matches: Box::new(matches),
            convert: Box::new(move |obj: &Object| Some(converter(obj))),
        };
        self.insert(entry, &label)
    }

    fn insert(&self, entry: ConverterEntry, name: &str) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        let entry = Arc::new(entry);
        match entries.iter_mut().find(|e| e.key == entry.key) {
            Some(slot) => *slot = entry,
            None => entries.push(entry),
        }
        info!(converter = name, "converter registered");
        Ok(())
    }

    /// Remove the converter for type `T`. Returns whether one was registered.
    pub fn unregister<T: Any>(&self) -> Result<bool> {
        self.remove(&ConverterKey::Type(TypeId::of::<T>()))
    }

    pub fn unregister_label(&self, label: &str) -> Result<bool> {
        self.remove(&ConverterKey::Label(label.to_string()))
    }

    fn remove(&self, key: &ConverterKey) -> Result<bool> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        let before = entries.len();
        entries.retain(|e| &e.key != key);
        Ok(entries.len() != before)
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run the first matching converter, if any.
    pub fn convert(&self, object: &Object) -> Result<Option<Map>> {
        let entry = {
            let entries = self.entries.read().map_err(|_| poisoned())?;
            entries.iter().find(|e| (e.matches)(object)).cloned()
        };
        // Lock released: converters may flatten or register themselves.
        Ok(entry.and_then(|e| (e.convert)(object)))
    }
}

fn poisoned() -> MarshalError {
    MarshalError::Protocol(constants::ERR_LOCK_POISONED.to_string())
}

type Strategy = fn(&Object, &ConverterRegistry) -> Result<Option<Map>>;

const STRATEGIES: &[(&str, Strategy)] = &[
    ("converter", via_converter),
    ("daemon link", detach_daemon_link),
    ("exception", via_exception),
    ("exported state", via_exported_state),
    ("attributes", via_attributes),
    ("slots", via_slots),
];

fn via_converter(object: &Object, converters: &ConverterRegistry) -> Result<Option<Map>> {
    converters.convert(object)
}

fn detach_daemon_link(object: &Object, _: &ConverterRegistry) -> Result<Option<Map>> {
    if let Some(link) = object.as_remote().and_then(RemoteObject::daemon_link) {
        link.detach();
    }
    Ok(None)
}

fn via_exception(object: &Object, _: &ConverterRegistry) -> Result<Option<Map>> {
    let Object::Exception(exc) = object else {
        return Ok(None);
    };
    let mut map = Map::new();
    map.insert("args".to_string(), Value::List(exc.args().to_vec()));
    map.insert(CLASS_KEY.to_string(), Value::Str(exc.class().to_string()));
    Ok(Some(map))
}

fn via_exported_state(object: &Object, _: &ConverterRegistry) -> Result<Option<Map>> {
    if let Object::Codec(codec) = object {
        let mut map = Map::new();
        map.insert(CLASS_KEY.to_string(), Value::Str(codec.type_tag()));
        return Ok(Some(map));
    }
    match object.as_remote().and_then(RemoteObject::export_state) {
        Some(Value::Map(map)) => Ok(Some(map)),
        _ => Ok(None),
    }
}

fn via_attributes(object: &Object, _: &ConverterRegistry) -> Result<Option<Map>> {
    let Some(remote) = object.as_remote() else {
        return Ok(None);
    };
    Ok(remote.attributes().map(|mut map| {
        map.insert(CLASS_KEY.to_string(), Value::Str(remote.type_tag()));
        map
    }))
}

fn via_slots(object: &Object, _: &ConverterRegistry) -> Result<Option<Map>> {
    let Some(remote) = object.as_remote() else {
        return Ok(None);
    };
    let names = remote.slot_names();
    if names.is_empty() {
        return Ok(None);
    }
    let mut map: Map = names
        .iter()
        .map(|name| ((*name).to_string(), remote.slot(name).unwrap_or_default()))
        .collect();
    map.insert(CLASS_KEY.to_string(), Value::Str(remote.type_tag()));
    Ok(Some(map))
}

/// Flatten a single object into a map, without recursing into the result.
pub fn flatten_object(object: &Object, converters: &ConverterRegistry) -> Result<Map> {
    for (name, strategy) in STRATEGIES {
        if let Some(map) = strategy(object, converters)? {
            trace!(object = %object.type_name(), strategy = name, "object flattened");
            return Ok(map);
        }
    }
    Err(MarshalError::Serialization(format!(
        "don't know how to serialize {}: it must expose an exported state or attribute access",
        object.type_name()
    )))
}

/// Replace every live object inside `value` by its flattened map.
///
/// Values without objects are returned borrowed.
pub fn flatten<'a>(value: &'a Value, converters: &ConverterRegistry) -> Result<Cow<'a, Value>> {
    if !value.contains_objects() {
        return Ok(Cow::Borrowed(value));
    }
    flatten_owned(value, converters, 0).map(Cow::Owned)
}

fn flatten_owned(value: &Value, converters: &ConverterRegistry, depth: usize) -> Result<Value> {
    if depth > MAX_FLATTEN_DEPTH {
        return Err(MarshalError::Serialization(
            "object graph too deep to flatten (cyclic reference?)".to_string(),
        ));
    }
    match value {
        Value::List(items) => items
            .iter()
            .map(|item| flatten_owned(item, converters, depth + 1))
            .collect::<Result<Vec<_>>>()
            .map(Value::List),
        Value::Map(map) => flatten_map(map, converters, depth),
        Value::Object(object) => {
            let map = flatten_object(object, converters)?;
            flatten_map(&map, converters, depth)
        }
        plain => Ok(plain.clone()),
    }
}

fn flatten_map(map: &Map, converters: &ConverterRegistry, depth: usize) -> Result<Value> {
    map.iter()
        .map(|(k, v)| Ok((k.clone(), flatten_owned(v, converters, depth + 1)?)))
        .collect::<Result<Map>>()
        .map(Value::Map)
}
