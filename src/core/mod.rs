//! # Core Marshalling Types
//!
//! The data model shared by every codec and by the reconstruction gate.
//!
//! ## Components
//! - **Value**: dynamic value model, attribute mappings, the reserved type-tag key
//! - **Call**: call envelopes and serialized payloads
//! - **Objects**: flattening hooks and the core protocol types (URI, proxy, daemon)
//! - **Exception**: failures that cross the remote boundary, and their allow-list
//! - **Serialization**: the codec contract and format identifiers
//!
//! ## Wire Shapes
//! ```text
//! AttributeMapping: { "__class__": "<module>.<Type>", <attr>: <value>, ... }
//! CallEnvelope:     [target, method, args, kwargs]            (sequence codecs)
//!                   {object, method, params, kwargs}          (json)
//! ```

pub mod call;
pub mod exception;
pub mod objects;
pub mod serialization;
pub mod value;
