//! Call envelopes and serialized payloads.

use crate::core::value::{Map, Value};
use crate::error::{constants, MarshalError, Result};
use bytes::Bytes;

/// Field names of the named-record envelope form.
pub const FIELD_OBJECT: &str = "object";
pub const FIELD_METHOD: &str = "method";
pub const FIELD_PARAMS: &str = "params";
pub const FIELD_KWARGS: &str = "kwargs";

/// One remote invocation: target, method name, positional and keyword arguments.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CallEnvelope {
    pub target: Value,
    pub method: String,
    pub args: Vec<Value>,
    pub kwargs: Map,
}

impl CallEnvelope {
    pub fn new(target: impl Into<Value>, method: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            method: method.into(),
            args: Vec::new(),
            kwargs: Map::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    pub fn with_kwarg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }

    /// Split into `(target, method, args, kwargs)`.
    pub fn into_parts(self) -> (Value, String, Vec<Value>, Map) {
        (self.target, self.method, self.args, self.kwargs)
    }

    /// Four-element sequence form: `[target, method, args, kwargs]`.
    pub fn to_sequence(&self) -> Value {
        Value::List(vec![
            self.target.clone(),
            Value::Str(self.method.clone()),
            Value::List(self.args.clone()),
            Value::Map(self.kwargs.clone()),
        ])
    }

    pub fn from_sequence(value: Value) -> Result<Self> {
        let Value::List(items) = value else {
            return Err(malformed(format!("expected a sequence, got {}", value.type_name())));
        };
        let Ok([target, method, args, kwargs]) = <[Value; 4]>::try_from(items) else {
            return Err(malformed("expected exactly 4 elements"));
        };
        Self::from_fields(target, method, args, kwargs)
    }

    /// Named-field record form with `object`, `method`, `params`, `kwargs`.
    pub fn to_record(&self) -> Value {
        let mut map = Map::new();
        map.insert(FIELD_OBJECT.to_string(), self.target.clone());
        map.insert(FIELD_METHOD.to_string(), Value::Str(self.method.clone()));
        map.insert(FIELD_PARAMS.to_string(), Value::List(self.args.clone()));
        map.insert(FIELD_KWARGS.to_string(), Value::Map(self.kwargs.clone()));
        Value::Map(map)
    }

    pub fn from_record(value: Value) -> Result<Self> {
        let Value::Map(mut map) = value else {
            return Err(malformed(format!("expected a record, got {}", value.type_name())));
        };
        let mut take = |field: &str| {
            map.remove(field)
                .ok_or_else(|| malformed(format!("missing field '{field}'")))
        };
        let target = take(FIELD_OBJECT)?;
        let method = take(FIELD_METHOD)?;
        let args = take(FIELD_PARAMS)?;
        let kwargs = take(FIELD_KWARGS)?;
        Self::from_fields(target, method, args, kwargs)
    }

    fn from_fields(target: Value, method: Value, args: Value, kwargs: Value) -> Result<Self> {
        let Value::Str(method) = method else {
            return Err(malformed("method name must be a string"));
        };
        let Value::List(args) = args else {
            return Err(malformed("positional arguments must be a sequence"));
        };
        let Value::Map(kwargs) = kwargs else {
            return Err(malformed("keyword arguments must be a mapping"));
        };
        Ok(Self {
            target,
            method,
            args,
            kwargs,
        })
    }
}

fn malformed(why: impl AsRef<str>) -> MarshalError {
    MarshalError::Decode(format!("{}: {}", constants::ERR_MALFORMED_CALL, why.as_ref()))
}

/// Encoded bytes plus whether they were compressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializedPayload {
    pub data: Bytes,
    pub compressed: bool,
}

impl SerializedPayload {
    pub fn new(data: impl Into<Bytes>, compressed: bool) -> Self {
        Self {
            data: data.into(),
            compressed,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_parts(self) -> (Bytes, bool) {
        (self.data, self.compressed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CallEnvelope {
        CallEnvelope::new("calculator", "multiply")
            .with_args(vec![Value::Int(5), Value::Int(11)])
            .with_kwarg("precise", true)
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_sequence_form_roundtrip() {
        let call = sample();
        assert_eq!(CallEnvelope::from_sequence(call.to_sequence()).unwrap(), call);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_record_form_roundtrip() {
        let call = sample();
        assert_eq!(CallEnvelope::from_record(call.to_record()).unwrap(), call);
    }

    #[test]
    fn test_truncated_sequence_rejected() {
        let short = Value::List(vec![Value::Str("obj".into()), Value::Str("m".into())]);
        assert!(matches!(
            CallEnvelope::from_sequence(short),
            Err(MarshalError::Decode(_))
        ));
        assert!(CallEnvelope::from_sequence(Value::Int(1)).is_err());
    }

    #[test]
    fn test_record_missing_field_rejected() {
        let Value::Map(mut map) = sample().to_record() else {
            unreachable!()
        };
        map.remove(FIELD_KWARGS);
        let err = CallEnvelope::from_record(Value::Map(map)).unwrap_err();
        assert!(err.to_string().contains("kwargs"));
    }

    #[test]
    fn test_wrong_field_types_rejected() {
        let bad = Value::List(vec![
            Value::None,
            Value::Int(3),
            Value::List(vec![]),
            Value::Map(Map::new()),
        ]);
        assert!(CallEnvelope::from_sequence(bad).is_err());

        let bad = Value::List(vec![
            Value::None,
            Value::Str("m".into()),
            Value::Map(Map::new()),
            Value::Map(Map::new()),
        ]);
        assert!(CallEnvelope::from_sequence(bad).is_err());
    }
}
