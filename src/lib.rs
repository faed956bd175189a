//! # remote-marshal
//!
//! Data-marshalling core for remote object calls.
//!
//! Turns in-memory values, call envelopes and exceptions into bytes and back
//! through interchangeable codecs, while refusing to rebuild anything the
//! receiving side has not explicitly trusted.
//!
//! ## Layout
//! - [`core`]: value model, call envelopes, exceptions, core protocol types
//!   and the codec contract
//! - [`codec`]: the concrete codecs and their registry
//! - [`protocol`]: flattening, the reconstruction gate, the marshaller and
//!   method dispatch
//! - [`utils`]: compression, logging and traceback reports
//! - [`config`]: TOML/env configuration
//!
//! ## Quick Start
//! ```rust
//! use remote_marshal::{CallEnvelope, Marshaller, MarshalRegistry, Value};
//! use std::sync::Arc;
//!
//! # fn main() -> remote_marshal::Result<()> {
//! let registry = Arc::new(MarshalRegistry::with_available_codecs());
//! let marshaller = Marshaller::for_codec("literal", registry)?;
//!
//! let call = CallEnvelope::new(Value::None, "multiply").with_args(vec![5.into(), 11.into()]);
//! let payload = marshaller.serialize_call(&call, false)?;
//! let received = marshaller.deserialize_call(&payload.data, payload.compressed)?;
//! assert_eq!(received.method, "multiply");
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod utils;

pub use crate::codec::CodecRegistry;
pub use crate::config::MarshalConfig;
pub use crate::core::call::{CallEnvelope, SerializedPayload};
pub use crate::core::exception::Exception;
pub use crate::core::objects::{Daemon, DaemonLink, Proxy, RemoteObject, Uri};
pub use crate::core::serialization::{Codec, SerializationFormat};
pub use crate::core::value::{AttributeMapping, Map, Object, Value, CLASS_KEY};
pub use crate::error::{MarshalError, Result};
pub use crate::protocol::converter::ConverterRegistry;
pub use crate::protocol::dispatcher::MethodTable;
pub use crate::protocol::gate::{ReconstructionGate, Reconstructible};
pub use crate::protocol::marshaller::Marshaller;
pub use crate::protocol::registry::MarshalRegistry;
pub use crate::utils::compression::{CompressionKind, CompressionPolicy};
