//! Contract between the relay and an on-device generative text capability.
//!
//! A capability answers three questions: is a model usable here, give me a
//! session (optionally reporting download progress), and stream a reply to
//! one prompt.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio_stream::Stream;

use lmkernel_core::StreamConvention;

/// What the capability reports about its model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    /// No model can be provided in this environment.
    Unavailable,
    /// A model can be provided once its assets are downloaded.
    NeedsDownload,
    /// The model assets are being downloaded.
    Downloading,
    /// A session can be created immediately.
    Ready,
}

impl Availability {
    /// Whether creating a session will first fetch model assets.
    pub const fn requires_download(self) -> bool {
        matches!(self, Self::NeedsDownload | Self::Downloading)
    }
}

/// A download progress notification.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    /// Completion in `0.0..=1.0`.
    pub fraction: f64,
    /// Optional human-readable status.
    pub text: Option<String>,
}

impl ProgressEvent {
    /// Create an event, clamping `fraction` into `0.0..=1.0` (NaN becomes 0).
    pub fn new(fraction: f64, text: Option<String>) -> Self {
        let fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        Self { fraction, text }
    }
}

/// Typed observer for download progress.
#[derive(Clone)]
pub struct ProgressObserver(Arc<dyn Fn(ProgressEvent) + Send + Sync>);

impl ProgressObserver {
    pub fn new(f: impl Fn(ProgressEvent) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn notify(&self, event: ProgressEvent) {
        (self.0)(event);
    }
}

impl fmt::Debug for ProgressObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ProgressObserver")
    }
}

/// Errors raised by a capability backend.
#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    #[error("capability unreachable: {0}")]
    Unreachable(String),

    #[error("model error: {0}")]
    Model(String),

    #[error("stream error: {0}")]
    Stream(String),

    #[cfg(feature = "ollama")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// An on-device generative text capability.
pub trait Capability: Send + Sync {
    type Session: ModelSession;

    /// Report whether a model can be provided.
    fn availability(&self) -> impl Future<Output = Result<Availability, CapabilityError>> + Send;

    /// Create a session. `monitor` is present when the model must be
    /// downloaded first and receives progress while that happens.
    fn create_session(
        &self,
        monitor: Option<ProgressObserver>,
    ) -> impl Future<Output = Result<Self::Session, CapabilityError>> + Send;
}

/// A provisioned model session.
pub trait ModelSession: Send + Sync {
    /// Reply increments. Dropping the stream releases the reader.
    type Stream: Stream<Item = Result<String, CapabilityError>> + Send + Unpin;

    /// Submit one prompt and return its reply stream.
    fn prompt_streaming(
        &self,
        prompt: &str,
    ) -> impl Future<Output = Result<Self::Stream, CapabilityError>> + Send;

    /// The streaming convention this session is known to use, if any.
    fn convention(&self) -> StreamConvention {
        StreamConvention::Auto
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn progress_fraction_is_clamped() {
        assert!((ProgressEvent::new(1.7, None).fraction - 1.0).abs() < f64::EPSILON);
        assert!(ProgressEvent::new(-0.2, None).fraction.abs() < f64::EPSILON);
        assert!(ProgressEvent::new(f64::NAN, None).fraction.abs() < f64::EPSILON);
        assert!((ProgressEvent::new(0.25, None).fraction - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn download_states() {
        assert!(Availability::NeedsDownload.requires_download());
        assert!(Availability::Downloading.requires_download());
        assert!(!Availability::Ready.requires_download());
        assert!(!Availability::Unavailable.requires_download());
    }

    #[test]
    fn observer_clones_share_callback() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let observer = ProgressObserver::new(move |e| {
            if let Ok(mut v) = sink.lock() {
                v.push(e.fraction);
            }
        });
        observer.clone().notify(ProgressEvent::new(0.5, None));
        observer.notify(ProgressEvent::new(1.0, Some("done".into())));
        assert_eq!(seen.lock().map(|v| v.len()).unwrap_or(0), 2);
    }
}
