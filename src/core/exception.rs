//! # Exceptions
//!
//! An [`Exception`] is a failure that can cross the remote boundary: a
//! fully-qualified type tag plus the constructor arguments it was raised with.
//! On the receiving side the transport attaches the pre-formatted traceback of
//! the remote process, which the traceback formatter merges into the local
//! report.
//!
//! Only allow-listed exception types can be rebuilt from the wire: the
//! standard library's error hierarchy and the framework's own error types.

use crate::core::value::Value;
use crate::error::ERRORS_MODULE;
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::fmt;

/// Error types of the standard library, by wire tag.
pub const BUILTIN_EXCEPTIONS: &[&str] = &[
    "std.io.NotFound",
    "std.io.PermissionDenied",
    "std.io.ConnectionRefused",
    "std.io.ConnectionReset",
    "std.io.ConnectionAborted",
    "std.io.NotConnected",
    "std.io.AddrInUse",
    "std.io.AddrNotAvailable",
    "std.io.BrokenPipe",
    "std.io.AlreadyExists",
    "std.io.WouldBlock",
    "std.io.InvalidInput",
    "std.io.InvalidData",
    "std.io.TimedOut",
    "std.io.WriteZero",
    "std.io.Interrupted",
    "std.io.Unsupported",
    "std.io.UnexpectedEof",
    "std.io.OutOfMemory",
    "std.io.Other",
    "core.num.ParseIntError",
    "core.num.ParseFloatError",
    "core.num.TryFromIntError",
    "core.str.Utf8Error",
    "alloc.string.FromUtf8Error",
    "core.fmt.Error",
    "core.char.CharTryFromError",
    "core.arith.DivideByZero",
    "core.arith.Overflow",
    "core.ops.IndexOutOfBounds",
    "std.panic.Panic",
];

/// Framework error type names, tagged under `remote_marshal.errors`.
pub const FRAMEWORK_ERRORS: &[&str] = &[
    "MarshalError",
    "SerializationError",
    "DecodeError",
    "SecurityError",
    "ProtocolError",
    "UnknownCodecError",
    "UnimplementedError",
    "CommunicationError",
    "ConnectionClosedError",
    "TimeoutError",
    "NamingError",
    "DaemonError",
];

static ALLOWED_EXCEPTIONS: Lazy<HashSet<String>> = Lazy::new(|| {
    BUILTIN_EXCEPTIONS
        .iter()
        .map(|name| (*name).to_string())
        .chain(
            FRAMEWORK_ERRORS
                .iter()
                .map(|name| format!("{ERRORS_MODULE}.{name}")),
        )
        .collect()
});

/// True if `tag` names an exception type that may be rebuilt from the wire.
pub fn is_allowed_exception(tag: &str) -> bool {
    ALLOWED_EXCEPTIONS.contains(tag)
}

/// Wire tag for an I/O error kind, if the kind is on the allow-list.
pub fn io_error_tag(kind: std::io::ErrorKind) -> String {
    let tag = format!("std.io.{kind:?}");
    if is_allowed_exception(&tag) {
        tag
    } else {
        "std.io.Other".to_string()
    }
}

/// A failure that can travel between processes.
#[derive(Debug, Clone, PartialEq)]
pub struct Exception {
    class: String,
    args: Vec<Value>,
    remote_traceback: Option<Vec<String>>,
}

impl Exception {
    pub fn new(class: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            class: class.into(),
            args,
            remote_traceback: None,
        }
    }

    /// Exception whose only argument is a message.
    pub fn with_message(class: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(class, vec![Value::Str(message.into())])
    }

    /// Capture a local error under the given wire tag.
    pub fn from_error<E: std::error::Error + ?Sized>(class: impl Into<String>, err: &E) -> Self {
        Self::with_message(class, err.to_string())
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    /// Type name without its module path.
    pub fn short_name(&self) -> &str {
        self.class.rsplit('.').next().unwrap_or(&self.class)
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Human-readable message built from the arguments.
    pub fn message(&self) -> String {
        match self.args.as_slice() {
            [] => String::new(),
            [Value::Str(s)] => s.clone(),
            [single] => single.to_string(),
            many => Value::List(many.to_vec()).to_string(),
        }
    }

    pub fn remote_traceback(&self) -> Option<&[String]> {
        self.remote_traceback.as_deref()
    }

    /// Attach the traceback lines reported by the remote side of a failed call.
    pub fn attach_remote_traceback(&mut self, lines: Vec<String>) {
        self.remote_traceback = Some(lines);
    }

    pub fn with_remote_traceback(mut self, lines: Vec<String>) -> Self {
        self.attach_remote_traceback(lines);
        self
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = self.message();
        if message.is_empty() {
            f.write_str(&self.class)
        } else {
            write!(f, "{}: {}", self.class, message)
        }
    }
}

impl std::error::Error for Exception {}

impl From<std::io::Error> for Exception {
    fn from(err: std::io::Error) -> Self {
        Exception::from_error(io_error_tag(err.kind()), &err)
    }
}
