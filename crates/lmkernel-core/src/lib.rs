//! `lmkernel` Core Library
//!
//! Shared functionality for `lmkernel` components:
//! - Configuration resolution and hierarchy
//! - Stream convention selection shared by relay and config
//! - Common error types
//! - Tracing initialisation

pub mod config;
pub mod error;
pub mod tracing_init;

pub use config::{Config, StreamConvention};
pub use error::{Error, Result};
