//! # Remote Objects
//!
//! [`RemoteObject`] is the set of hooks the flattening chain uses to turn an
//! application object into an attribute mapping. The core protocol value
//! types ([`Uri`], [`Proxy`], [`Daemon`]) implement it through their exported
//! state.
//!
//! Each core type has two ways in: a public, validating constructor, and a
//! crate-private `restore_state` used only by the reconstruction gate. The
//! gate never runs the constructor on remote data.

use crate::core::value::{Map, Value, CLASS_KEY};
use crate::error::{constants, MarshalError, Result};
use std::any::Any;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, RwLock, Weak};

/// Module path of the core protocol types on the wire.
pub const CORE_MODULE: &str = "remote_marshal.core";
pub const URI_TAG: &str = "remote_marshal.core.Uri";
pub const PROXY_TAG: &str = "remote_marshal.core.Proxy";
pub const DAEMON_TAG: &str = "remote_marshal.core.Daemon";

/// Protocol prefix of a direct object URI.
pub const URI_PROTOCOL: &str = "RMX";
/// Protocol prefix of a name-server lookup URI.
pub const URI_NAME_PROTOCOL: &str = "RMXNAME";

/// Hooks an application object exposes so it can be flattened for the wire.
///
/// Flattening tries, in order: the converter registry, the state-export hook,
/// the public attribute set, then the declared slots. Implement whichever
/// fits; an object exposing none of them cannot be sent.
pub trait RemoteObject: Any + Send + Sync + fmt::Debug {
    /// Fully-qualified type name, e.g. `geometry.Point`.
    fn type_tag(&self) -> String;

    /// State-export hook. Used as-is when it yields a map.
    fn export_state(&self) -> Option<Value> {
        None
    }

    /// Public attribute set.
    fn attributes(&self) -> Option<Map> {
        None
    }

    /// Fixed attribute slots, for objects without an attribute set.
    fn slot_names(&self) -> &'static [&'static str] {
        &[]
    }

    fn slot(&self, _name: &str) -> Option<Value> {
        None
    }

    /// Back-reference to the daemon hosting this object.
    fn daemon_link(&self) -> Option<&DaemonLink> {
        None
    }

    fn as_any(&self) -> &dyn Any;
}

/// Non-owning reference from a hosted object to its daemon.
///
/// Cleared before the object is flattened so daemon internals never reach
/// the wire.
#[derive(Debug, Default)]
pub struct DaemonLink {
    daemon: RwLock<Option<Weak<Daemon>>>,
}

impl DaemonLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, daemon: &Arc<Daemon>) -> Result<()> {
        let mut slot = self
            .daemon
            .write()
            .map_err(|_| MarshalError::Protocol(constants::ERR_LOCK_POISONED.to_string()))?;
        *slot = Some(Arc::downgrade(daemon));
        Ok(())
    }

    pub fn get(&self) -> Option<Arc<Daemon>> {
        self.daemon
            .read()
            .ok()
            .and_then(|slot| slot.as_ref().and_then(Weak::upgrade))
    }

    pub fn detach(&self) {
        if let Ok(mut slot) = self.daemon.write() {
            *slot = None;
        }
    }

    pub fn is_attached(&self) -> bool {
        self.get().is_some()
    }
}

/// Address of a remote object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Uri {
    protocol: String,
    object: String,
    sockname: Option<String>,
    host: Option<String>,
    port: Option<u16>,
}

impl Uri {
    /// Parse and validate a URI string.
    ///
    /// Accepted forms: `RMX:object@host:port`, `RMX:object@./u:socket`,
    /// `RMXNAME:name` and `RMXNAME:name@host:port`.
    pub fn parse(uri: &str) -> Result<Self> {
        let invalid = |why: &str| MarshalError::Protocol(format!("invalid uri '{uri}': {why}"));

        let (protocol, rest) = uri.split_once(':').ok_or_else(|| invalid("missing protocol"))?;
        let protocol = protocol.to_ascii_uppercase();
        if protocol != URI_PROTOCOL && protocol != URI_NAME_PROTOCOL {
            return Err(invalid("unknown protocol"));
        }

        let (object, location) = match rest.split_once('@') {
            Some((object, location)) => (object, Some(location)),
            None if protocol == URI_NAME_PROTOCOL => (rest, None),
            None => return Err(invalid("missing location")),
        };
        if object.is_empty() {
            return Err(invalid("empty object id"));
        }

        let mut parsed = Self {
            protocol,
            object: object.to_string(),
            sockname: None,
            host: None,
            port: None,
        };

        match location {
            None => {}
            Some(loc) if loc.starts_with("./u:") => {
                let sock = &loc[4..];
                if sock.is_empty() {
                    return Err(invalid("empty socket name"));
                }
                parsed.sockname = Some(sock.to_string());
            }
            Some(loc) => {
                let (host, port) = loc.rsplit_once(':').ok_or_else(|| invalid("missing port"))?;
                if host.is_empty() {
                    return Err(invalid("empty host"));
                }
                let port = port.parse::<u16>().map_err(|_| invalid("bad port"))?;
                parsed.host = Some(host.to_string());
                parsed.port = Some(port);
            }
        }
        Ok(parsed)
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn object(&self) -> &str {
        &self.object
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn sockname(&self) -> Option<&str> {
        self.sockname.as_deref()
    }

    /// `host:port`, `./u:socket`, or `None` for a bare name lookup.
    pub fn location(&self) -> Option<String> {
        match (&self.sockname, &self.host, self.port) {
            (Some(sock), _, _) => Some(format!("./u:{sock}")),
            (None, Some(host), Some(port)) => Some(format!("{host}:{port}")),
            _ => None,
        }
    }

    /// Wire state: `[protocol, object, sockname, host, port]`.
    pub fn state(&self) -> Value {
        Value::List(vec![
            Value::Str(self.protocol.clone()),
            Value::Str(self.object.clone()),
            self.sockname.clone().into(),
            self.host.clone().into(),
            self.port.map(u32::from).into(),
        ])
    }

    /// Rebuild from wire state without going through [`Uri::parse`].
    pub(crate) fn restore_state(state: &Value) -> Result<Self> {
        let bad = || MarshalError::Decode("invalid uri state".to_string());
        let [protocol, object, sockname, host, port] = state.as_list().ok_or_else(bad)? else {
            return Err(bad());
        };
        let opt_str = |v: &Value| -> Result<Option<String>> {
            match v {
                Value::None => Ok(None),
                Value::Str(s) => Ok(Some(s.clone())),
                _ => Err(bad()),
            }
        };
        let port = match port {
            Value::None => None,
            Value::Int(p) => Some(u16::try_from(*p).map_err(|_| bad())?),
            _ => return Err(bad()),
        };
        Ok(Self {
            protocol: protocol.as_str().ok_or_else(bad)?.to_string(),
            object: object.as_str().ok_or_else(bad)?.to_string(),
            sockname: opt_str(sockname)?,
            host: opt_str(host)?,
            port,
        })
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.protocol, self.object)?;
        if let Some(location) = self.location() {
            write!(f, "@{location}")?;
        }
        Ok(())
    }
}

impl RemoteObject for Uri {
    fn type_tag(&self) -> String {
        URI_TAG.to_string()
    }

    fn export_state(&self) -> Option<Value> {
        let mut map = Map::new();
        map.insert(CLASS_KEY.to_string(), Value::Str(URI_TAG.to_string()));
        map.insert("state".to_string(), self.state());
        Some(Value::Map(map))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Client-side handle for a remote object. Holds no connection here; the
/// transport owns connection state.
#[derive(Debug, Clone, PartialEq)]
pub struct Proxy {
    uri: Uri,
    oneway: BTreeSet<String>,
    timeout: Option<f64>,
}

impl Proxy {
    pub fn new(uri: Uri) -> Self {
        Self {
            uri,
            oneway: BTreeSet::new(),
            timeout: None,
        }
    }

    pub fn with_oneway<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.oneway.extend(methods.into_iter().map(Into::into));
        self
    }

    pub fn with_timeout(mut self, seconds: f64) -> Self {
        self.timeout = Some(seconds);
        self
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn oneway(&self) -> &BTreeSet<String> {
        &self.oneway
    }

    pub fn timeout(&self) -> Option<f64> {
        self.timeout
    }

    /// Wire state: `[uri string, one-way method names, timeout]`.
    pub fn state(&self) -> Value {
        Value::List(vec![
            Value::Str(self.uri.to_string()),
            Value::List(self.oneway.iter().cloned().map(Value::Str).collect()),
            self.timeout.into(),
        ])
    }

    pub(crate) fn restore_state(state: &Value) -> Result<Self> {
        let bad = || MarshalError::Decode("invalid proxy state".to_string());
        let [uri, oneway, timeout] = state.as_list().ok_or_else(bad)? else {
            return Err(bad());
        };
        let uri = Uri::parse(uri.as_str().ok_or_else(bad)?)?;
        let oneway = oneway
            .as_list()
            .ok_or_else(bad)?
            .iter()
            .map(|m| m.as_str().map(str::to_string).ok_or_else(bad))
            .collect::<Result<BTreeSet<_>>>()?;
        let timeout = match timeout {
            Value::None => None,
            other => Some(other.as_float().ok_or_else(bad)?),
        };
        Ok(Self {
            uri,
            oneway,
            timeout,
        })
    }
}

impl RemoteObject for Proxy {
    fn type_tag(&self) -> String {
        PROXY_TAG.to_string()
    }

    fn export_state(&self) -> Option<Value> {
        let mut map = Map::new();
        map.insert(CLASS_KEY.to_string(), Value::Str(PROXY_TAG.to_string()));
        map.insert("state".to_string(), self.state());
        Some(Value::Map(map))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Handle of a server daemon. Only the type crosses the wire; a rebuilt
/// daemon is an unbound, empty instance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Daemon {
    location: Option<String>,
}

impl Daemon {
    pub fn bound(location: impl Into<String>) -> Self {
        Self {
            location: Some(location.into()),
        }
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub(crate) fn restore_state() -> Self {
        Self::default()
    }
}

impl RemoteObject for Daemon {
    fn type_tag(&self) -> String {
        DAEMON_TAG.to_string()
    }

    fn export_state(&self) -> Option<Value> {
        let mut map = Map::new();
        map.insert(CLASS_KEY.to_string(), Value::Str(DAEMON_TAG.to_string()));
        Some(Value::Map(map))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
