//! Session relay: prompt in, streamed deltas out.
//!
//! Data flow:
//! ```text
//! availability → (first use) create_session → prompt_streaming
//!   → DeltaNormalizer → on_delta callback → accumulated reply
//! ```

use tokio::sync::OnceCell;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

use lmkernel_core::StreamConvention;

use crate::capability::{Availability, Capability, ModelSession, ProgressObserver};
use crate::delta::DeltaNormalizer;
use crate::error::RelayError;

/// Lazily provisions one model session and relays prompts to it.
///
/// The host serialises requests, so a relay never has two prompts in
/// flight. The session handle is written once, on the first successful
/// provisioning, and reused for every later prompt.
pub struct SessionRelay<C: Capability> {
    capability: C,
    session: OnceCell<C::Session>,
    observer: Option<ProgressObserver>,
    convention: StreamConvention,
}

impl<C: Capability> SessionRelay<C> {
    /// Create a relay over `capability`. No session is created yet.
    pub fn new(capability: C) -> Self {
        Self {
            capability,
            session: OnceCell::new(),
            observer: None,
            convention: StreamConvention::Auto,
        }
    }

    /// Receive download progress while the session is provisioned.
    #[must_use]
    pub fn with_progress_observer(mut self, observer: ProgressObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Force a stream convention instead of the session's own or detection.
    #[must_use]
    pub const fn with_convention(mut self, convention: StreamConvention) -> Self {
        self.convention = convention;
        self
    }

    /// Whether a session has been provisioned.
    pub fn has_session(&self) -> bool {
        self.session.initialized()
    }

    /// Send `prompt` and return the full reply without observing deltas.
    pub async fn prompt(&self, prompt: &str) -> Result<String, RelayError> {
        self.send(prompt, |_| {}).await
    }

    /// Send `prompt`, calling `on_delta` with each non-empty piece of new
    /// text, and return the full reply.
    ///
    /// The reply stream is dropped before this returns, on success and on
    /// failure alike.
    pub async fn send<F>(&self, prompt: &str, mut on_delta: F) -> Result<String, RelayError>
    where
        F: FnMut(&str) + Send,
    {
        let availability = self.capability.availability().await.map_err(|e| {
            warn!(error = %e, "Capability availability query failed");
            RelayError::CapabilityUnavailable(e.to_string())
        })?;
        if availability == Availability::Unavailable {
            warn!("Capability reports no model available");
            return Err(RelayError::CapabilityUnavailable(
                "the capability reports no model can be provided".to_string(),
            ));
        }

        let session = self
            .session
            .get_or_try_init(|| self.provision(availability))
            .await?;

        let convention = match self.convention {
            StreamConvention::Auto => session.convention(),
            forced => forced,
        };

        let mut stream = session.prompt_streaming(prompt).await.map_err(|e| {
            warn!(error = %e, "Failed to submit prompt");
            RelayError::Stream(e.to_string())
        })?;
        debug!(prompt_len = prompt.len(), ?convention, "Prompt submitted");

        let mut normalizer = DeltaNormalizer::new(convention);
        let mut increments = 0usize;
        while let Some(item) = stream.next().await {
            let chunk = match item {
                Ok(chunk) => chunk,
                Err(e) => {
                    drop(stream);
                    warn!(error = %e, increments, "Reply stream failed");
                    return Err(RelayError::Stream(e.to_string()));
                }
            };
            increments += 1;
            let delta = normalizer.push(&chunk);
            if !delta.is_empty() {
                on_delta(delta);
            }
        }
        drop(stream);

        let reply = normalizer.into_text();
        debug!(increments, reply_len = reply.len(), "Reply stream finished");
        Ok(reply)
    }

    async fn provision(&self, availability: Availability) -> Result<C::Session, RelayError> {
        let monitor = availability
            .requires_download()
            .then(|| self.download_monitor());
        info!(?availability, "Provisioning model session");

        let session = self
            .capability
            .create_session(monitor)
            .await
            .map_err(|e| {
                warn!(error = %e, "Model session creation failed");
                RelayError::ModelUnavailable(e.to_string())
            })?;

        info!("Model session ready");
        Ok(session)
    }

    /// Observer that logs progress and forwards it to the caller's observer.
    fn download_monitor(&self) -> ProgressObserver {
        let forward = self.observer.clone();
        ProgressObserver::new(move |event| {
            info!(
                progress = event.fraction,
                status = event.text.as_deref().unwrap_or_default(),
                "Model download progress"
            );
            if let Some(observer) = &forward {
                observer.notify(event);
            }
        })
    }
}
