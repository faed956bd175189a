//! # Protocol Layer
//!
//! Everything between a live value and a codec.
//!
//! ## Components
//! - **Converter**: application converters and the object flattening chain
//! - **Gate**: the default-deny class reconstruction allow-list
//! - **Registry**: converters, codecs and gate bundled for injection
//! - **Marshaller**: codec front end with compression
//! - **Dispatcher**: method-name routing for served objects
//!
//! ## Security
//! - Type tags containing `__` are refused before any lookup
//! - Unknown type tags are refused; nothing is rebuilt implicitly
//! - A refusal anywhere in a value fails the whole value

pub mod converter;
pub mod dispatcher;
pub mod gate;
pub mod marshaller;
pub mod registry;

#[cfg(test)]
mod tests;
