//! Safe-literal codec.
//!
//! A small text format made of literal data forms only:
//!
//! ```text
//! value := None | True | False | int | float | string | bytes | list | map
//! int   := -?[0-9]+
//! float := Rust shortest round-trip float text, or inf / -inf / NaN
//! str   := "..."  with \\ \" \n \r \t \0 \u{hex} escapes
//! bytes := b"..." with \\ \" \n \r \t \0 \xNN escapes
//! list  := [ value, ... ]          (trailing comma allowed)
//! map   := { "key": value, ... }   (string keys only)
//! ```
//!
//! The parser accepts nothing but these forms, bounds nesting depth, and
//! rejects trailing input. There are no names, calls or expressions.

use crate::core::call::CallEnvelope;
use crate::core::serialization::{Codec, SerializationFormat};
use crate::core::value::{Map, Value, MAX_NESTING_DEPTH};
use crate::error::{constants, MarshalError, Result};
use std::fmt::Write;

/// Maximum nesting of lists and maps accepted by the parser.
pub const MAX_DEPTH: usize = MAX_NESTING_DEPTH;

/// Literal text codec.
#[derive(Debug, Default, Clone, Copy)]
pub struct LiteralCodec;

impl LiteralCodec {
    fn to_bytes(value: &Value) -> Result<Vec<u8>> {
        to_literal(value).map(String::into_bytes)
    }

    fn from_bytes(data: &[u8]) -> Result<Value> {
        let text = std::str::from_utf8(data)
            .map_err(|e| MarshalError::Decode(format!("literal payload is not UTF-8: {e}")))?;
        parse(text)
    }
}

impl Codec for LiteralCodec {
    fn name(&self) -> &str {
        SerializationFormat::Literal.name()
    }

    fn class_name(&self) -> &str {
        SerializationFormat::Literal.class_name()
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        Self::to_bytes(value)
    }

    fn decode(&self, data: &[u8]) -> Result<Value> {
        Self::from_bytes(data)
    }

    fn encode_call(&self, call: &CallEnvelope) -> Result<Vec<u8>> {
        Self::to_bytes(&call.to_sequence())
    }

    fn decode_call(&self, data: &[u8]) -> Result<CallEnvelope> {
        CallEnvelope::from_sequence(Self::from_bytes(data)?)
    }
}

/// Render a value as literal text.
pub fn to_literal(value: &Value) -> Result<String> {
    let mut out = String::new();
    write_value(&mut out, value)?;
    Ok(out)
}

fn write_value(out: &mut String, value: &Value) -> Result<()> {
    match value {
        Value::None => out.push_str("None"),
        Value::Bool(true) => out.push_str("True"),
        Value::Bool(false) => out.push_str("False"),
        Value::Int(i) => {
            let _ = write!(out, "{i}");
        }
        Value::Float(f) => write_float(out, *f),
        Value::Str(s) => write_str(out, s),
        Value::Bytes(b) => write_bytes(out, b),
        Value::List(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item)?;
            }
            out.push(']');
        }
        Value::Map(map) => {
            out.push('{');
            for (i, (k, v)) in map.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_str(out, k);
                out.push(':');
                write_value(out, v)?;
            }
            out.push('}');
        }
        Value::Object(obj) => {
            return Err(MarshalError::Serialization(format!(
                "live object {} must be flattened before encoding",
                obj.type_name()
            )))
        }
    }
    Ok(())
}

fn write_float(out: &mut String, f: f64) {
    if f.is_nan() {
        out.push_str("NaN");
    } else if f.is_infinite() {
        out.push_str(if f > 0.0 { "inf" } else { "-inf" });
    } else {
        // Debug output is the shortest text that parses back to the same f64
        // and always carries a '.' or an exponent.
        let _ = write!(out, "{f:?}");
    }
}

fn write_str(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\0' => out.push_str("\\0"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{{{:x}}}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

fn write_bytes(out: &mut String, bytes: &[u8]) {
    out.push_str("b\"");
    for &b in bytes {
        match b {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            0x20..=0x7e => out.push(b as char),
            _ => {
                let _ = write!(out, "\\x{b:02x}");
            }
        }
    }
    out.push('"');
}

/// Parse literal text into a value.
pub fn parse(text: &str) -> Result<Value> {
    let mut parser = Parser { src: text, pos: 0 };
    let value = parser.value(0)?;
    parser.skip_ws();
    if parser.pos != text.len() {
        return Err(parser.error("trailing characters"));
    }
    Ok(value)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn error(&self, why: &str) -> MarshalError {
        MarshalError::Decode(format!("invalid literal at offset {}: {why}", self.pos))
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> Result<()> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{expected}'")))
        }
    }

    fn skip_ws(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.src.len() - trimmed.len();
    }

    fn keyword(&mut self, word: &str) -> bool {
        let rest = self.rest();
        if !rest.starts_with(word) {
            return false;
        }
        let boundary = rest[word.len()..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric() && c != '_');
        if boundary {
            self.pos += word.len();
        }
        boundary
    }

    fn value(&mut self, depth: usize) -> Result<Value> {
        if depth > MAX_DEPTH {
            return Err(self.error(constants::ERR_NESTING_TOO_DEEP));
        }
        self.skip_ws();
        match self.peek() {
            None => Err(self.error("unexpected end of input")),
            Some('[') => self.list(depth),
            Some('{') => self.map(depth),
            Some('"') => self.string().map(Value::Str),
            Some('b') if self.rest().starts_with("b\"") => {
                self.pos += 1;
                self.bytes().map(Value::Bytes)
            }
            Some(c) if c == '-' || c.is_ascii_digit() => self.number(),
            Some(_) => {
                if self.keyword("None") {
                    Ok(Value::None)
                } else if self.keyword("True") {
                    Ok(Value::Bool(true))
                } else if self.keyword("False") {
                    Ok(Value::Bool(false))
                } else if self.keyword("inf") {
                    Ok(Value::Float(f64::INFINITY))
                } else if self.keyword("NaN") {
                    Ok(Value::Float(f64::NAN))
                } else {
                    Err(self.error("not a literal"))
                }
            }
        }
    }

    fn list(&mut self, depth: usize) -> Result<Value> {
        self.expect('[')?;
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.eat(']') {
                return Ok(Value::List(items));
            }
            items.push(self.value(depth + 1)?);
            self.skip_ws();
            if self.eat(']') {
                return Ok(Value::List(items));
            }
            self.expect(',')?;
        }
    }

    fn map(&mut self, depth: usize) -> Result<Value> {
        self.expect('{')?;
        let mut map = Map::new();
        loop {
            self.skip_ws();
            if self.eat('}') {
                return Ok(Value::Map(map));
            }
            if self.peek() != Some('"') {
                return Err(self.error("map keys must be strings"));
            }
            let key = self.string()?;
            self.skip_ws();
            self.expect(':')?;
            let value = self.value(depth + 1)?;
            map.insert(key, value);
            self.skip_ws();
            if self.eat('}') {
                return Ok(Value::Map(map));
            }
            self.expect(',')?;
        }
    }

    fn number(&mut self) -> Result<Value> {
        let start = self.pos;
        if self.rest().starts_with("-inf") {
            self.pos += 4;
            return Ok(Value::Float(f64::NEG_INFINITY));
        }
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E') {
                self.pos += 1;
            } else {
                break;
            }
        }
        let token = &self.src[start..self.pos];
        if token.contains(['.', 'e', 'E']) {
            token
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| self.error("bad float"))
        } else {
            token
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| self.error("bad integer"))
        }
    }

    fn escape(&mut self) -> Result<Option<char>> {
        Ok(match self.bump() {
            Some('"') => Some('"'),
            Some('\\') => Some('\\'),
            Some('n') => Some('\n'),
            Some('r') => Some('\r'),
            Some('t') => Some('\t'),
            Some('0') => Some('\0'),
            _ => None,
        })
    }

    fn string(&mut self) -> Result<String> {
        self.expect('"')?;
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string")),
                Some('"') => return Ok(out),
                Some('\\') => {
                    if self.peek() == Some('u') {
                        self.pos += 1;
                        out.push(self.unicode_escape()?);
                    } else {
                        let c = self.escape()?.ok_or_else(|| self.error("bad escape"))?;
                        out.push(c);
                    }
                }
                Some(c) => out.push(c),
            }
        }
    }

    fn unicode_escape(&mut self) -> Result<char> {
        self.expect('{')?;
        let end = self
            .rest()
            .find('}')
            .ok_or_else(|| self.error("unterminated unicode escape"))?;
        let hex = &self.rest()[..end];
        let code = u32::from_str_radix(hex, 16).map_err(|_| self.error("bad unicode escape"))?;
        self.pos += end + 1;
        char::from_u32(code).ok_or_else(|| self.error("invalid code point"))
    }

    fn bytes(&mut self) -> Result<Vec<u8>> {
        self.expect('"')?;
        let mut out = Vec::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated bytes")),
                Some('"') => return Ok(out),
                Some('\\') => {
                    if self.peek() == Some('x') {
                        self.pos += 1;
                        let hex = self
                            .rest()
                            .get(..2)
                            .ok_or_else(|| self.error("short hex escape"))?;
                        let b = u8::from_str_radix(hex, 16)
                            .map_err(|_| self.error("bad hex escape"))?;
                        self.pos += 2;
                        out.push(b);
                    } else {
                        let c = self.escape()?.ok_or_else(|| self.error("bad escape"))?;
                        out.push(c as u8);
                    }
                }
                Some(c) if c.is_ascii() && !c.is_ascii_control() => out.push(c as u8),
                Some(_) => return Err(self.error("non-ASCII character in bytes")),
            }
        }
    }
}
