//! lmkernel Session Relay
//!
//! Owns a lazily provisioned handle to an on-device language model and
//! exposes one operation: send a prompt, stream the reply.
//! - Capability contract the model backend implements
//! - Delta normalisation across cumulative and incremental streams
//! - Ollama HTTP backend (feature `ollama`)
//! - Scripted fake backend for tests (feature `test-utils`)

pub mod capability;
pub mod delta;
mod error;
#[cfg(feature = "ollama")]
pub mod ollama;
mod relay;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use capability::{
    Availability, Capability, CapabilityError, ModelSession, ProgressEvent, ProgressObserver,
};
pub use delta::DeltaNormalizer;
pub use error::RelayError;
pub use lmkernel_core::StreamConvention;
pub use relay::SessionRelay;
