//! # Codecs
//!
//! Concrete wire formats behind the [`Codec`](crate::core::serialization::Codec)
//! contract, and the registry that lists the ones compiled in.
//!
//! ## Backends
//! - **BinaryCodec** (`binary` feature): bincode, full fidelity
//! - **CompactCodec** (`compact` feature): MessagePack
//! - **JsonCodec** (`json` feature): UTF-8 JSON
//! - **LiteralCodec** (always present): literal-only text, no names or
//!   expressions
//!
//! Every decoder refuses nesting deeper than
//! [`MAX_NESTING_DEPTH`](crate::core::value::MAX_NESTING_DEPTH).
//!
//! ## Performance Characteristics
//! - **Binary**: fastest, compact, not self-describing
//! - **Compact**: close to binary, self-describing
//! - **Json / Literal**: text, several times larger on numeric data

#[cfg(feature = "binary")]
pub mod binary;
#[cfg(feature = "compact")]
pub mod compact;
#[cfg(feature = "json")]
pub mod json;
pub mod literal;
pub mod registry;

#[cfg(feature = "binary")]
pub use binary::BinaryCodec;
#[cfg(feature = "compact")]
pub use compact::CompactCodec;
#[cfg(feature = "json")]
pub use json::JsonCodec;
pub use literal::LiteralCodec;
pub use registry::CodecRegistry;
