//! # Utility Modules
//!
//! Supporting utilities for compression, logging, and traceback reports.
//!
//! ## Components
//! - **Compression**: LZ4 and Zstd with size limits and thresholds
//! - **Logging**: Structured logging configuration
//! - **Traceback**: Local and remote traceback formatting
//!
//! ## Security
//! - Decompression bomb protection (16MB limit)

pub mod compression;
pub mod logging;
pub mod traceback;
