// test-only module included via protocol/mod.rs
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use crate::core::call::CallEnvelope;
use crate::core::exception::Exception;
use crate::core::objects::RemoteObject;
use crate::core::value::{AttributeMapping, Map, Object, Value, CLASS_KEY};
use crate::error::MarshalError;
use crate::protocol::dispatcher::MethodTable;
use crate::protocol::marshaller::Marshaller;
use crate::protocol::registry::MarshalRegistry;
use std::any::Any;
use std::sync::Arc;

#[derive(Debug, PartialEq)]
struct Point {
    x: i64,
    y: i64,
}

impl RemoteObject for Point {
    fn type_tag(&self) -> String {
        "geometry.Point".to_string()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn registry() -> Arc<MarshalRegistry> {
    Arc::new(MarshalRegistry::with_available_codecs())
}

fn register_point_converter(registry: &MarshalRegistry) {
    registry
        .converters()
        .register::<Point, _>(|p| {
            let mut map = Map::new();
            map.insert(CLASS_KEY.to_string(), Value::from("geometry.Point"));
            map.insert("x".to_string(), Value::Int(p.x));
            map.insert("y".to_string(), Value::Int(p.y));
            map
        })
        .expect("register converter");
}

#[cfg(feature = "compact")]
#[test]
fn test_multiply_call_over_compact_codec() {
    let marshaller = Marshaller::for_codec("compact", registry()).expect("compact codec");

    let call = CallEnvelope::new(Value::None, "multiply").with_args(vec![5.into(), 11.into()]);
    let payload = marshaller.serialize_call(&call, false).expect("serialize call");
    assert!(!payload.compressed);

    let received = marshaller
        .deserialize_call(&payload.data, payload.compressed)
        .expect("deserialize call");
    assert_eq!(received, call);

    let methods = MethodTable::new();
    methods
        .register("multiply", |args, _| {
            let product = args.iter().filter_map(Value::as_int).product::<i64>();
            Ok(Value::Int(product))
        })
        .expect("register method");
    let result = methods.dispatch(&received).expect("dispatch");
    assert_eq!(result, Value::Int(55));

    let reply = marshaller.serialize_data(&result, false).expect("serialize result");
    assert!(!reply.compressed);
    assert_eq!(
        marshaller.deserialize_data(&reply.data, false).expect("decode reply"),
        Value::Int(55)
    );
}

#[test]
fn test_flattening_does_not_imply_reconstruction() {
    let registry = registry();
    register_point_converter(&registry);
    let marshaller = Marshaller::for_codec("literal", registry.clone()).expect("literal codec");

    let data = marshaller
        .dumps(&Value::instance(Point { x: 1, y: 2 }))
        .expect("flatten and encode");

    match marshaller.loads(&data) {
        Err(MarshalError::Protocol(msg)) => assert!(msg.contains("geometry.Point")),
        other => panic!("expected ProtocolError, got {other:?}"),
    }

    registry
        .gate()
        .allow("geometry.Point", |m: &AttributeMapping| {
            Ok(Point {
                x: m.get("x").and_then(Value::as_int).unwrap_or_default(),
                y: m.get("y").and_then(Value::as_int).unwrap_or_default(),
            })
        })
        .expect("allow point");

    let value = marshaller.loads(&data).expect("reconstruct");
    let point = value.as_object().and_then(Object::downcast_ref::<Point>);
    assert_eq!(point, Some(&Point { x: 1, y: 2 }));
}

#[test]
fn test_exception_roundtrip_on_every_codec() {
    let registry = registry();
    let exc = Exception::with_message("core.arith.DivideByZero", "division by zero");
    for name in registry.codecs().names().expect("codec names") {
        let marshaller = Marshaller::for_codec(&name, registry.clone()).expect("codec");
        let data = marshaller.dumps(&Value::from(exc.clone())).expect("encode");
        match marshaller.loads(&data).expect("decode") {
            Value::Object(Object::Exception(back)) => {
                assert_eq!(back.class(), exc.class(), "codec {name}");
                assert_eq!(back.args(), exc.args(), "codec {name}");
            }
            other => panic!("codec {name} returned {other:?}"),
        }
    }
}

#[test]
fn test_framework_errors_cross_the_boundary() {
    let marshaller = Marshaller::for_codec("literal", registry()).expect("literal codec");
    let err = MarshalError::Security("refused".to_string());
    let data = marshaller.dumps(&Value::from(err.to_exception())).expect("encode");
    match marshaller.loads(&data).expect("decode") {
        Value::Object(Object::Exception(back)) => {
            assert_eq!(back.class(), "remote_marshal.errors.SecurityError");
            assert_eq!(back.message(), "refused");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_codec_objects_travel_as_registry_singletons() {
    let registry = registry();
    let marshaller = Marshaller::for_codec("literal", registry.clone()).expect("literal codec");
    let codec = registry.codecs().get("literal").expect("literal");
    let data = marshaller
        .dumps(&Value::Object(Object::Codec(codec.clone())))
        .expect("encode");
    match marshaller.loads(&data).expect("decode") {
        Value::Object(Object::Codec(back)) => assert!(Arc::ptr_eq(&back, &codec)),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_security_refusal_reaches_caller() {
    let marshaller = Marshaller::for_codec("literal", registry()).expect("literal codec");
    let data = br#"{"__class__": "os__system", "cmd": "rm -rf /"}"#;
    assert!(matches!(
        marshaller.loads(data),
        Err(MarshalError::Security(_))
    ));
}
