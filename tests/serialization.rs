//! Integration tests for the codecs behind the marshaller
//!
//! Tests value and call round-trips through every registered codec, the
//! envelope shape each codec uses, and the format identifiers.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::uninlined_format_args,
    clippy::expect_fun_call
)]

use remote_marshal::codec::literal;
use remote_marshal::core::objects::URI_TAG;
use remote_marshal::{
    CallEnvelope, Exception, Map, MarshalRegistry, Marshaller, Object, Proxy,
    SerializationFormat, Uri, Value, CLASS_KEY,
};
use std::sync::Arc;

fn registry() -> Arc<MarshalRegistry> {
    Arc::new(MarshalRegistry::with_available_codecs())
}

fn marshallers() -> Vec<Marshaller> {
    let registry = registry();
    registry
        .codecs()
        .names()
        .expect("codec names")
        .iter()
        .map(|name| Marshaller::for_codec(name, registry.clone()).expect("codec"))
        .collect()
}

fn sample_value() -> Value {
    let mut inner = Map::new();
    inner.insert("name".into(), Value::from("widget"));
    inner.insert("ratio".into(), Value::Float(0.75));
    inner.insert("tags".into(), Value::List(vec!["a".into(), "b".into()]));
    Value::List(vec![
        Value::None,
        Value::Bool(true),
        Value::Int(-42),
        Value::Int(i64::MAX),
        Value::Str("üñíçødé".into()),
        Value::Map(inner),
    ])
}

#[test]
fn test_every_codec_roundtrips_plain_data() {
    for marshaller in marshallers() {
        let value = sample_value();
        let bytes = marshaller.dumps(&value).expect("encode");
        let back = marshaller.loads(&bytes).expect("decode");
        assert_eq!(back, value, "codec {}", marshaller.codec().name());
    }
}

#[test]
fn test_every_codec_roundtrips_calls() {
    for marshaller in marshallers() {
        let call = CallEnvelope::new(Value::from("calculator"), "add")
            .with_args(vec![Value::Int(1), Value::Float(2.5)])
            .with_kwarg("round", true);
        let bytes = marshaller.dumps_call(&call).expect("encode call");
        let back = marshaller.loads_call(&bytes).expect("decode call");
        assert_eq!(back, call, "codec {}", marshaller.codec().name());
    }
}

#[test]
fn test_core_types_roundtrip_on_every_codec() {
    let uri = Uri::parse("RMX:printer@./u:/tmp/printer.sock").expect("uri");
    let proxy = Proxy::new(Uri::parse("RMX:printer@host:9000").expect("uri"))
        .with_oneway(["flush"])
        .with_timeout(1.5);
    for marshaller in marshallers() {
        let value = Value::List(vec![Value::from(uri.clone()), Value::from(proxy.clone())]);
        let bytes = marshaller.dumps(&value).expect("encode");
        assert_eq!(
            marshaller.loads(&bytes).expect("decode"),
            value,
            "codec {}",
            marshaller.codec().name()
        );
    }
}

#[test]
fn test_literal_wire_text() {
    let registry = registry();
    let marshaller = Marshaller::for_codec("literal", registry).expect("literal");
    let uri = Uri::parse("RMXNAME:registry").expect("uri");
    let text = String::from_utf8(marshaller.dumps(&Value::from(uri)).expect("encode"))
        .expect("utf-8");
    assert_eq!(
        text,
        format!(
            "{{\"{CLASS_KEY}\":\"{URI_TAG}\",\"state\":[\"RMXNAME\",\"registry\",None,None,None]}}"
        )
    );
}

#[test]
fn test_literal_call_is_four_element_sequence() {
    let call = CallEnvelope::new(Value::None, "ping");
    let registry = registry();
    let marshaller = Marshaller::for_codec("literal", registry).expect("literal");
    let bytes = marshaller.dumps_call(&call).expect("encode");
    let parsed = literal::parse(std::str::from_utf8(&bytes).expect("utf-8")).expect("parse");
    assert_eq!(parsed.as_list().map(<[Value]>::len), Some(4));
}

#[cfg(feature = "json")]
#[test]
fn test_json_call_is_named_record() {
    let registry = registry();
    let marshaller = Marshaller::for_codec("json", registry).expect("json");
    let call = CallEnvelope::new(Value::None, "ping").with_args(vec![Value::Int(1)]);
    let bytes = marshaller.dumps_call(&call).expect("encode");
    let json: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
    for field in ["object", "method", "params", "kwargs"] {
        assert!(json.get(field).is_some(), "missing {field}");
    }
    assert_eq!(json["method"], "ping");
}

#[cfg(feature = "json")]
#[test]
fn test_json_bytes_come_back_as_integers() {
    let registry = registry();
    let marshaller = Marshaller::for_codec("json", registry).expect("json");
    let bytes = marshaller.dumps(&Value::Bytes(vec![1, 2, 255])).expect("encode");
    assert_eq!(
        marshaller.loads(&bytes).expect("decode"),
        Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(255)])
    );
}

#[test]
fn test_bytes_roundtrip_on_binary_capable_codecs() {
    let registry = registry();
    for name in ["binary", "compact", "literal"] {
        let Ok(marshaller) = Marshaller::for_codec(name, registry.clone()) else {
            continue;
        };
        let value = Value::Bytes((0..=255).collect());
        let bytes = marshaller.dumps(&value).expect("encode");
        assert_eq!(marshaller.loads(&bytes).expect("decode"), value, "codec {name}");
    }
}

#[test]
fn test_exception_keeps_type_and_args() {
    let exc = Exception::new(
        "std.io.InvalidData",
        vec![Value::from("bad header"), Value::Int(17)],
    );
    for marshaller in marshallers() {
        let bytes = marshaller.dumps(&Value::from(exc.clone())).expect("encode");
        match marshaller.loads(&bytes).expect("decode") {
            Value::Object(Object::Exception(back)) => assert_eq!(back, exc),
            other => panic!("unexpected {other:?}"),
        }
    }
}

#[test]
fn test_format_identifiers() {
    let registry = registry();
    for format in SerializationFormat::ALL {
        assert_eq!(SerializationFormat::from_byte(format.format_byte()), Some(format));
        assert_eq!(SerializationFormat::from_name(format.name()), Some(format));
        if let Ok(codec) = registry.codecs().get_by_byte(format.format_byte()) {
            assert_eq!(codec.name(), format.name());
            assert_eq!(codec.type_tag(), format.type_tag());
        }
    }
    assert!(registry.codecs().get_by_byte(0x04).is_ok());
}
