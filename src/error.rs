//! # Error Types
//!
//! Error handling for the marshalling core.
//!
//! Every failure a codec, the flattening chain or the reconstruction gate can
//! produce is one variant of [`MarshalError`]. None of them are retried here;
//! they propagate to the transport, which decides whether to turn them into a
//! remote-fault reply, log them, or drop the connection.
//!
//! ## Error Categories
//! - **Serialization**: a value has no encoding and no flattening path
//! - **Decode**: malformed bytes, truncated call envelopes, failed decompression
//! - **Security**: a type tag violates the double-underscore naming policy
//! - **Protocol**: a type tag is not allow-listed, or a registry lock is poisoned
//! - **Unknown codec**: a codec identifier that is not registered
//! - **Unimplemented**: a codec omits one of its core operations
//!
//! Framework errors cross the remote boundary as [`Exception`] values tagged
//! `remote_marshal.errors.<Name>`; see [`MarshalError::to_exception`].
//!
//! ## Example Usage
//! ```rust
//! use remote_marshal::error::{MarshalError, Result};
//! use tracing::{error, info};
//!
//! fn pick(name: &str) -> Result<&'static str> {
//!     match name {
//!         "json" => Ok("json"),
//!         other => Err(MarshalError::UnknownCodec(other.to_string())),
//!     }
//! }
//!
//! match pick("xml") {
//!     Ok(name) => info!(name, "codec selected"),
//!     Err(e) => error!(error = %e, "codec lookup failed"),
//! }
//! ```

use crate::core::exception::Exception;
use crate::core::value::Value;
use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Registry lock errors
    pub const ERR_LOCK_POISONED: &str = "Synchronization primitive poisoned";

    /// Compression errors
    pub const ERR_COMPRESSION_FAILED: &str = "Compression failed";
    pub const ERR_DECOMPRESSION_FAILED: &str = "Decompression failed";

    /// Reconstruction errors
    pub const ERR_DOUBLE_UNDERSCORE: &str =
        "refuse to deserialize types with double underscores in their name";
    pub const ERR_UNSUPPORTED_CLASS: &str = "unsupported serialized class";

    /// Call envelope errors
    pub const ERR_MALFORMED_CALL: &str = "malformed call envelope";

    /// Decoder nesting limit
    pub const ERR_NESTING_TOO_DEEP: &str = "nesting too deep";
}

/// Type-tag prefix under which framework errors travel.
pub const ERRORS_MODULE: &str = "remote_marshal.errors";

/// MarshalError is the primary error type for all marshalling operations
#[derive(Error, Debug)]
pub enum MarshalError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Security error: {0}")]
    Security(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Unknown codec: {0}")]
    UnknownCodec(String),

    #[error("Codec does not implement {0}")]
    Unimplemented(&'static str),

    #[error("Compression failed")]
    CompressionFailure,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl MarshalError {
    /// Short type name used in the wire tag, e.g. `SecurityError`.
    pub fn kind_name(&self) -> &'static str {
        match self {
            MarshalError::Io(_) => "CommunicationError",
            MarshalError::Serialization(_) => "SerializationError",
            MarshalError::Decode(_) => "DecodeError",
            MarshalError::Security(_) => "SecurityError",
            MarshalError::Protocol(_) => "ProtocolError",
            MarshalError::UnknownCodec(_) => "UnknownCodecError",
            MarshalError::Unimplemented(_) => "UnimplementedError",
            MarshalError::CompressionFailure => "SerializationError",
            MarshalError::Config(_) => "MarshalError",
        }
    }

    /// Fully-qualified type tag of this error on the wire.
    pub fn type_tag(&self) -> String {
        format!("{ERRORS_MODULE}.{}", self.kind_name())
    }

    /// Convert into a wire exception carrying the message as its only argument.
    pub fn to_exception(&self) -> Exception {
        let message = match self {
            MarshalError::Io(e) => e.to_string(),
            MarshalError::Serialization(m)
            | MarshalError::Decode(m)
            | MarshalError::Security(m)
            | MarshalError::Protocol(m)
            | MarshalError::UnknownCodec(m)
            | MarshalError::Config(m) => m.clone(),
            MarshalError::Unimplemented(op) => (*op).to_string(),
            MarshalError::CompressionFailure => constants::ERR_COMPRESSION_FAILED.to_string(),
        };
        Exception::new(self.type_tag(), vec![Value::Str(message)])
    }
}

impl From<&MarshalError> for Exception {
    fn from(err: &MarshalError) -> Self {
        err.to_exception()
    }
}

/// Type alias for Results using MarshalError
pub type Result<T> = std::result::Result<T, MarshalError>;
