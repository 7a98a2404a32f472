//! Relay error types.

/// Errors from relay operations.
///
/// The display text is what the kernel reports to the notebook user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    /// The environment has no usable on-device model capability.
    #[error("On-device language model is not available: {0}")]
    CapabilityUnavailable(String),

    /// The capability exists but could not provision a model session.
    #[error("Language model session could not be created: {0}")]
    ModelUnavailable(String),

    /// The prompt could not be submitted or the reply stream failed.
    #[error("Language model stream failed: {0}")]
    Stream(String),
}
