//! lmkernel Protocol Adapter
//!
//! Implements the fixed handler surface a notebook host expects from an
//! execution kernel and maps Session Relay outcomes onto its reply shapes:
//! - Request and reply types for every handler
//! - IOPub output publishing
//! - `ProtocolAdapter`, the handler implementation over a relay
//! - Kernel spec metadata and explicit registration

pub mod adapter;
pub mod handlers;
pub mod iopub;
pub mod protocol;
pub mod registry;
pub mod spec;

pub use adapter::ProtocolAdapter;
pub use handlers::KernelHandlers;
pub use iopub::{ChannelSink, IoPubMessage, IoPubSink};
pub use registry::{KernelRegistry, RegistryError};
pub use spec::KernelSpec;
