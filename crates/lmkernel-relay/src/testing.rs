//! Scripted capability for tests.
//!
//! `FakeCapability` is cheap to clone; clones share state so a test can keep
//! one handle for assertions while the relay owns another.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use tokio_stream::Stream;

use lmkernel_core::StreamConvention;

use crate::capability::{
    Availability, Capability, CapabilityError, ModelSession, ProgressEvent, ProgressObserver,
};

#[derive(Debug)]
struct FakeState {
    availability: Mutex<Result<Availability, String>>,
    chunks: Mutex<Vec<String>>,
    progress: Mutex<Vec<ProgressEvent>>,
    create_error: Mutex<Option<String>>,
    stream_failure: Mutex<Option<(usize, String)>>,
    convention: Mutex<StreamConvention>,
    prompts: Mutex<Vec<String>>,
    creations: AtomicUsize,
    released: AtomicUsize,
    monitor_passed: AtomicBool,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A capability whose behaviour is scripted up front.
#[derive(Debug, Clone)]
pub struct FakeCapability {
    state: Arc<FakeState>,
}

impl FakeCapability {
    fn with_availability(availability: Result<Availability, String>) -> Self {
        Self {
            state: Arc::new(FakeState {
                availability: Mutex::new(availability),
                chunks: Mutex::new(Vec::new()),
                progress: Mutex::new(Vec::new()),
                create_error: Mutex::new(None),
                stream_failure: Mutex::new(None),
                convention: Mutex::new(StreamConvention::Auto),
                prompts: Mutex::new(Vec::new()),
                creations: AtomicUsize::new(0),
                released: AtomicUsize::new(0),
                monitor_passed: AtomicBool::new(false),
            }),
        }
    }

    /// Model ready, no download needed.
    pub fn ready() -> Self {
        Self::with_availability(Ok(Availability::Ready))
    }

    /// Capability reports no model can be provided.
    pub fn unavailable() -> Self {
        Self::with_availability(Ok(Availability::Unavailable))
    }

    /// Availability query itself fails, as when no capability exists.
    pub fn missing(message: &str) -> Self {
        Self::with_availability(Err(message.to_string()))
    }

    /// Model must be downloaded; `progress` is reported during creation.
    pub fn needs_download(progress: impl IntoIterator<Item = ProgressEvent>) -> Self {
        Self::with_availability(Ok(Availability::NeedsDownload)).with_progress(progress)
    }

    /// Chunks every prompt stream yields, in order.
    #[must_use]
    pub fn with_chunks<S: Into<String>>(self, chunks: impl IntoIterator<Item = S>) -> Self {
        *lock(&self.state.chunks) = chunks.into_iter().map(Into::into).collect();
        self
    }

    /// Progress events emitted when a monitor is passed to creation.
    #[must_use]
    pub fn with_progress(self, progress: impl IntoIterator<Item = ProgressEvent>) -> Self {
        *lock(&self.state.progress) = progress.into_iter().collect();
        self
    }

    /// Convention the session declares.
    #[must_use]
    pub fn with_convention(self, convention: StreamConvention) -> Self {
        *lock(&self.state.convention) = convention;
        self
    }

    /// Session creation fails with `message`.
    #[must_use]
    pub fn failing_creation(self, message: &str) -> Self {
        *lock(&self.state.create_error) = Some(message.to_string());
        self
    }

    /// Streams fail with `message` after yielding `after` chunks.
    #[must_use]
    pub fn failing_stream_after(self, after: usize, message: &str) -> Self {
        *lock(&self.state.stream_failure) = Some((after, message.to_string()));
        self
    }

    pub fn set_availability(&self, availability: Availability) {
        *lock(&self.state.availability) = Ok(availability);
    }

    /// Number of `create_session` calls.
    pub fn creations(&self) -> usize {
        self.state.creations.load(Ordering::SeqCst)
    }

    /// Prompts submitted, in order.
    pub fn prompts(&self) -> Vec<String> {
        lock(&self.state.prompts).clone()
    }

    /// Number of reply streams that have been dropped.
    pub fn streams_released(&self) -> usize {
        self.state.released.load(Ordering::SeqCst)
    }

    pub fn monitor_was_passed(&self) -> bool {
        self.state.monitor_passed.load(Ordering::SeqCst)
    }
}

impl Capability for FakeCapability {
    type Session = FakeSession;

    async fn availability(&self) -> Result<Availability, CapabilityError> {
        lock(&self.state.availability)
            .clone()
            .map_err(CapabilityError::Unreachable)
    }

    async fn create_session(
        &self,
        monitor: Option<ProgressObserver>,
    ) -> Result<FakeSession, CapabilityError> {
        self.state.creations.fetch_add(1, Ordering::SeqCst);
        if let Some(monitor) = monitor {
            self.state.monitor_passed.store(true, Ordering::SeqCst);
            let progress = lock(&self.state.progress).clone();
            for event in progress {
                monitor.notify(event);
            }
        }
        if let Some(message) = lock(&self.state.create_error).clone() {
            return Err(CapabilityError::Model(message));
        }
        Ok(FakeSession {
            state: Arc::clone(&self.state),
        })
    }
}

/// Session handed out by [`FakeCapability`].
#[derive(Debug)]
pub struct FakeSession {
    state: Arc<FakeState>,
}

impl ModelSession for FakeSession {
    type Stream = FakeStream;

    async fn prompt_streaming(&self, prompt: &str) -> Result<FakeStream, CapabilityError> {
        lock(&self.state.prompts).push(prompt.to_string());

        let chunks = lock(&self.state.chunks).clone();
        let failure = lock(&self.state.stream_failure).clone();
        let items = match failure {
            Some((after, message)) => chunks
                .into_iter()
                .take(after)
                .map(Ok)
                .chain(std::iter::once(Err(CapabilityError::Stream(message))))
                .collect(),
            None => chunks.into_iter().map(Ok).collect(),
        };

        Ok(FakeStream {
            items,
            state: Arc::clone(&self.state),
        })
    }

    fn convention(&self) -> StreamConvention {
        *lock(&self.state.convention)
    }
}

/// Reply stream that records its release on drop.
#[derive(Debug)]
pub struct FakeStream {
    items: VecDeque<Result<String, CapabilityError>>,
    state: Arc<FakeState>,
}

impl Stream for FakeStream {
    type Item = Result<String, CapabilityError>;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Poll::Ready(self.items.pop_front())
    }
}

impl Drop for FakeStream {
    fn drop(&mut self) {
        self.state.released.fetch_add(1, Ordering::SeqCst);
    }
}
