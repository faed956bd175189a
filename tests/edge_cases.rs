#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! Edge-case tests for the marshalling boundary
//! Tests hostile type tags, malformed envelopes, resource limits and missing backends

use remote_marshal::config::MAX_PAYLOAD_SIZE;
use remote_marshal::utils::compression::{compress, CompressionKind};
use remote_marshal::{
    AttributeMapping, CallEnvelope, Codec, CodecRegistry, MarshalError, MarshalRegistry,
    Marshaller, RemoteObject, Value, CLASS_KEY,
};
use std::any::Any;
use std::sync::Arc;

fn literal() -> Marshaller {
    let registry = Arc::new(MarshalRegistry::with_available_codecs());
    Marshaller::for_codec("literal", registry).unwrap()
}

#[derive(Debug)]
struct Opaque;

impl RemoteObject for Opaque {
    fn type_tag(&self) -> String {
        "app.Opaque".to_string()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug)]
struct EncodeOnly;

impl Codec for EncodeOnly {
    fn name(&self) -> &str {
        "encode-only"
    }

    fn class_name(&self) -> &str {
        "EncodeOnlyCodec"
    }

    fn encode(&self, value: &Value) -> remote_marshal::Result<Vec<u8>> {
        Ok(value.to_string().into_bytes())
    }
}

// ============================================================================
// TYPE TAG POLICY
// ============================================================================

#[test]
fn test_double_underscore_tag_is_security_error() {
    let m = literal();
    let result = m.loads(br#"{"__class__": "os__system", "cmd": "rm"}"#);
    assert!(matches!(result, Err(MarshalError::Security(_))));
}

#[test]
fn test_nested_double_underscore_tag_is_security_error() {
    let m = literal();
    let result = m.loads(br#"[1, {"inner": [{"__class__": "builtins.__import__"}]}]"#);
    assert!(matches!(result, Err(MarshalError::Security(_))));
}

#[test]
fn test_double_underscore_tag_in_call_args() {
    let m = literal();
    let call = CallEnvelope::new(Value::None, "run")
        .with_args(vec![AttributeMapping::new("evil.__reduce__").into()]);
    let bytes = m.dumps_call(&call).expect("plain mappings encode");
    assert!(matches!(m.loads_call(&bytes), Err(MarshalError::Security(_))));
}

#[test]
fn test_double_underscore_tag_cannot_be_allowed() {
    let m = literal();
    let result = m
        .registry()
        .gate()
        .allow("app.__Secret", |_: &AttributeMapping| Ok(Opaque));
    assert!(matches!(result, Err(MarshalError::Security(_))));
    assert!(!m.registry().gate().is_allowed("app.__Secret"));
}

#[test]
fn test_unknown_tag_is_protocol_error() {
    let m = literal();
    let result = m.loads(br#"{"__class__": "app.Unknown", "x": 1}"#);
    assert!(matches!(result, Err(MarshalError::Protocol(_))));
}

#[test]
fn test_non_string_class_tag_is_protocol_error() {
    let m = literal();
    let result = m.loads(br#"{"__class__": 17}"#);
    assert!(matches!(result, Err(MarshalError::Protocol(_))));
}

#[test]
fn test_exception_without_sequence_args_is_decode_error() {
    let m = literal();
    let missing = format!(r#"{{"{CLASS_KEY}": "std.io.TimedOut"}}"#);
    let scalar = format!(r#"{{"{CLASS_KEY}": "std.io.TimedOut", "args": 5}}"#);
    assert!(matches!(
        m.loads(missing.as_bytes()),
        Err(MarshalError::Decode(_))
    ));
    assert!(matches!(
        m.loads(scalar.as_bytes()),
        Err(MarshalError::Decode(_))
    ));
}

#[test]
fn test_codec_tag_without_backend_is_protocol_error() {
    let registry = MarshalRegistry::new();
    registry
        .codecs()
        .register(Arc::new(remote_marshal::codec::LiteralCodec))
        .unwrap();
    let m = Marshaller::for_codec("literal", Arc::new(registry)).unwrap();

    let result = m.loads(br#"{"__class__": "remote_marshal.codec.JsonCodec"}"#);
    assert!(matches!(result, Err(MarshalError::Protocol(_))));

    let own = m.loads(br#"{"__class__": "remote_marshal.codec.LiteralCodec"}"#);
    assert!(own.is_ok());
}

// ============================================================================
// MALFORMED ENVELOPES
// ============================================================================

#[test]
fn test_literal_call_with_three_elements() {
    let m = literal();
    let result = m.loads_call(br#"[None, "ping", []]"#);
    assert!(matches!(result, Err(MarshalError::Decode(_))));
}

#[test]
fn test_call_with_wrong_field_types() {
    let m = literal();
    for bad in [
        r#"[None, 5, [], {}]"#,
        r#"[None, "ping", {}, {}]"#,
        r#"[None, "ping", [], []]"#,
        r#"{"object": None}"#,
    ] {
        assert!(
            matches!(m.loads_call(bad.as_bytes()), Err(MarshalError::Decode(_))),
            "accepted {bad}"
        );
    }
}

#[cfg(feature = "json")]
#[test]
fn test_json_call_missing_kwargs() {
    let registry = Arc::new(MarshalRegistry::with_available_codecs());
    let m = Marshaller::for_codec("json", registry).unwrap();
    let result = m.loads_call(br#"{"object": null, "method": "ping", "params": []}"#);
    assert!(matches!(result, Err(MarshalError::Decode(_))));
}

// ============================================================================
// LITERAL PARSER LIMITS
// ============================================================================

#[test]
fn test_literal_rejects_expressions() {
    let m = literal();
    for bad in [
        "__import__('os')",
        "os.system(\"ls\")",
        "1 + 1",
        "[1, 2",
        "None None",
        "{1: 2}",
    ] {
        assert!(
            matches!(m.loads(bad.as_bytes()), Err(MarshalError::Decode(_))),
            "accepted {bad}"
        );
    }
}

#[test]
fn test_literal_nesting_limit() {
    let m = literal();
    let deep = format!("{}{}", "[".repeat(300), "]".repeat(300));
    assert!(matches!(
        m.loads(deep.as_bytes()),
        Err(MarshalError::Decode(_))
    ));

    let shallow = format!("{}{}", "[".repeat(10), "]".repeat(10));
    assert!(m.loads(shallow.as_bytes()).is_ok());
}

fn deeply_nested(codec: &str, depth: usize) -> Vec<u8> {
    match codec {
        "literal" | "json" => "[".repeat(depth).into_bytes(),
        // MessagePack fixarray of one element, closed by nil
        "compact" => {
            let mut data = vec![0x91; depth];
            data.push(0xc0);
            data
        }
        // Tagged List variant with one element, closed by the None variant
        "binary" => {
            let mut data = [6u8, 1].repeat(depth);
            data.push(0);
            data
        }
        other => panic!("no nesting payload for {other}"),
    }
}

#[test]
fn test_deep_nesting_rejected_by_every_codec() {
    let registry = Arc::new(MarshalRegistry::with_available_codecs());
    for name in registry.codecs().names().unwrap() {
        let m = Marshaller::for_codec(&name, registry.clone()).unwrap();
        for depth in [300, 200_000] {
            let data = deeply_nested(&name, depth);
            assert!(
                matches!(m.loads(&data), Err(MarshalError::Decode(_))),
                "{name} accepted nesting depth {depth}"
            );
            assert!(
                matches!(m.loads_call(&data), Err(MarshalError::Decode(_))),
                "{name} accepted nesting depth {depth} as a call"
            );
        }
    }
}

#[test]
fn test_literal_rejects_invalid_utf8() {
    let m = literal();
    assert!(matches!(
        m.loads(&[0x22, 0xFF, 0xFE, 0x22]),
        Err(MarshalError::Decode(_))
    ));
}

// ============================================================================
// COMPRESSION LIMITS
// ============================================================================

#[test]
fn test_decompression_bomb_rejected() {
    let m = literal();
    let bomb = compress(&vec![0u8; MAX_PAYLOAD_SIZE + 1024], CompressionKind::Zstd, 3).unwrap();
    assert!(bomb.len() < 64 * 1024);
    assert!(matches!(
        m.deserialize_data(&bomb, true),
        Err(MarshalError::Decode(_))
    ));
}

#[test]
fn test_garbage_flagged_as_compressed() {
    let m = literal();
    assert!(matches!(
        m.deserialize_data(b"definitely not zstd", true),
        Err(MarshalError::Decode(_))
    ));
}

#[test]
fn test_compression_flag_ignored_below_threshold() {
    let m = literal();
    let payload = m.serialize_data(&Value::Int(1), true).unwrap();
    assert!(!payload.compressed);
    assert_eq!(
        m.deserialize_data(&payload.data, payload.compressed).unwrap(),
        Value::Int(1)
    );
}

// ============================================================================
// ENCODING FAILURES
// ============================================================================

#[test]
fn test_unflattenable_object_is_serialization_error() {
    let m = literal();
    let value = Value::List(vec![Value::Int(1), Value::instance(Opaque)]);
    assert!(matches!(
        m.dumps(&value),
        Err(MarshalError::Serialization(_))
    ));
}

#[test]
fn test_unknown_codec() {
    let registry = Arc::new(MarshalRegistry::with_available_codecs());
    assert!(matches!(
        Marshaller::for_codec("xml", registry.clone()),
        Err(MarshalError::UnknownCodec(_))
    ));
    assert!(matches!(
        registry.codecs().get_by_byte(0x7f),
        Err(MarshalError::UnknownCodec(_))
    ));
}

#[test]
fn test_partial_codec_reports_unimplemented() {
    let codecs = CodecRegistry::new();
    codecs.register(Arc::new(EncodeOnly)).unwrap();
    let codec = codecs.get("encode-only").unwrap();

    let m = Marshaller::new(codec, Arc::new(MarshalRegistry::new()));
    assert!(m.dumps(&Value::Int(3)).is_ok());
    assert!(matches!(
        m.loads(b"3"),
        Err(MarshalError::Unimplemented("decode"))
    ));
    assert!(matches!(
        m.dumps_call(&CallEnvelope::new(Value::None, "m")),
        Err(MarshalError::Unimplemented("encode_call"))
    ));
}

#[test]
fn test_empty_input() {
    let m = literal();
    assert!(matches!(m.loads(b""), Err(MarshalError::Decode(_))));
    assert!(matches!(m.loads_call(b""), Err(MarshalError::Decode(_))));
}
