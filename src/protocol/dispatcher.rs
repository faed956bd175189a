use crate::core::call::CallEnvelope;
use crate::core::exception::Exception;
use crate::core::value::{Map, Value};
use crate::error::{constants, MarshalError, Result};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

type HandlerFn =
    dyn Fn(&[Value], &Map) -> std::result::Result<Value, Exception> + Send + Sync + 'static;

/// Check a requested method name and split it into its segments.
///
/// Every segment starting with `_` is refused. Dots are only accepted when
/// `allow_dotted` is set; otherwise the name must be a single segment.
pub fn resolve_dotted_name(name: &str, allow_dotted: bool) -> Result<Vec<&str>> {
    if name.is_empty() {
        return Err(MarshalError::Protocol("empty method name".to_string()));
    }
    let segments: Vec<&str> = if allow_dotted {
        name.split('.').collect()
    } else if name.contains('.') {
        return Err(MarshalError::Protocol(format!(
            "dotted names not allowed: '{name}'"
        )));
    } else {
        vec![name]
    };
    for segment in &segments {
        if segment.is_empty() {
            return Err(MarshalError::Protocol(format!("malformed method name '{name}'")));
        }
        if segment.starts_with('_') {
            warn!(method = %name, "refused access to private attribute");
            return Err(MarshalError::Security(format!(
                "attempt to access private attribute \"{segment}\""
            )));
        }
    }
    Ok(segments)
}

/// Method-name routing for a served object.
///
/// Handlers take the positional and keyword arguments of a call envelope and
/// return either a value or a wire exception.
pub struct MethodTable {
    handlers: Arc<RwLock<HashMap<String, Arc<HandlerFn>>>>,
    allow_dotted: bool,
}

impl Default for MethodTable {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MethodTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodTable")
            .field("methods", &self.names())
            .field("allow_dotted", &self.allow_dotted)
            .finish()
    }
}

impl MethodTable {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(HashMap::new())),
            allow_dotted: false,
        }
    }

    /// Accept dotted method names such as `stats.reset`.
    pub fn with_dotted_names(mut self, allow: bool) -> Self {
        self.allow_dotted = allow;
        self
    }

    pub fn register<F>(&self, name: &str, handler: F) -> Result<()>
    where
        F: Fn(&[Value], &Map) -> std::result::Result<Value, Exception> + Send + Sync + 'static,
    {
        resolve_dotted_name(name, true)?;
        let mut handlers = self
            .handlers
            .write()
            .map_err(|_| MarshalError::Protocol(constants::ERR_LOCK_POISONED.to_string()))?;

        handlers.insert(name.to_string(), Arc::new(handler));
        Ok(())
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .handlers
            .read()
            .map(|h| h.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    fn lookup(&self, method: &str) -> Result<Arc<HandlerFn>> {
        let segments = resolve_dotted_name(method, self.allow_dotted)?;
        let key = segments.join(".");

        let handlers = self
            .handlers
            .read()
            .map_err(|_| MarshalError::Protocol(constants::ERR_LOCK_POISONED.to_string()))?;

        handlers
            .get(key.as_str())
            .cloned()
            .ok_or_else(|| MarshalError::Protocol(format!("unknown method '{method}'")))
    }

    /// Invoke the handler named by the envelope's method.
    ///
    /// Routing failures come back as framework exceptions so they can be
    /// returned to the caller like any other failure.
    pub fn dispatch(&self, call: &CallEnvelope) -> std::result::Result<Value, Exception> {
        let handler = self.lookup(&call.method).map_err(|e| e.to_exception())?;
        debug!(method = %call.method, args = call.args.len(), "dispatching call");
        handler(&call.args, &call.kwargs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> MethodTable {
        let table = MethodTable::new();
        table
            .register("add", |args, _| {
                let sum = args.iter().filter_map(Value::as_int).sum::<i64>();
                Ok(Value::Int(sum))
            })
            .unwrap_or_else(|e| panic!("{e}"));
        table
            .register("stats.reset", |_, _| Ok(Value::None))
            .unwrap_or_else(|e| panic!("{e}"));
        table
    }

    #[test]
    fn test_resolve_dotted_name() {
        assert_eq!(resolve_dotted_name("a.b", true).ok(), Some(vec!["a", "b"]));
        assert!(matches!(
            resolve_dotted_name("a.b", false),
            Err(MarshalError::Protocol(_))
        ));
        assert!(matches!(
            resolve_dotted_name("a._secret", true),
            Err(MarshalError::Security(_))
        ));
        assert!(matches!(
            resolve_dotted_name("__init__", false),
            Err(MarshalError::Security(_))
        ));
        assert!(resolve_dotted_name("a..b", true).is_err());
    }

    #[test]
    fn test_names_sorted_and_replaced_on_reregister() {
        let table = table();
        table
            .register("add", |_, _| Ok(Value::Int(0)))
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(table.names(), vec!["add".to_string(), "stats.reset".to_string()]);
        let call = CallEnvelope::new(Value::None, "add").with_args(vec![2.into()]);
        assert_eq!(table.dispatch(&call), Ok(Value::Int(0)));
    }

    #[test]
    fn test_dispatch_routes_to_handler() {
        let call = CallEnvelope::new(Value::None, "add").with_args(vec![2.into(), 3.into()]);
        assert_eq!(table().dispatch(&call), Ok(Value::Int(5)));
    }

    #[test]
    fn test_dotted_dispatch_requires_opt_in() {
        let call = CallEnvelope::new(Value::None, "stats.reset");
        let exc = table().dispatch(&call).unwrap_err();
        assert_eq!(exc.class(), "remote_marshal.errors.ProtocolError");
        assert_eq!(
            table().with_dotted_names(true).dispatch(&call),
            Ok(Value::None)
        );
    }

    #[test]
    fn test_unknown_and_private_methods() {
        let unknown = CallEnvelope::new(Value::None, "sub");
        assert_eq!(
            table().dispatch(&unknown).unwrap_err().class(),
            "remote_marshal.errors.ProtocolError"
        );
        let private = CallEnvelope::new(Value::None, "_add");
        assert_eq!(
            table().dispatch(&private).unwrap_err().class(),
            "remote_marshal.errors.SecurityError"
        );
        assert!(MethodTable::new().register("_hidden", |_, _| Ok(Value::None)).is_err());
    }
}
