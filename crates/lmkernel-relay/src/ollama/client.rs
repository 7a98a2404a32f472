//! HTTP client side of the Ollama capability.

use std::pin::Pin;

use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info};

use lmkernel_core::StreamConvention;
use lmkernel_core::config::ModelConfig;

use super::ndjson::ndjson_stream;
use super::types::{
    GenerateChunk, GenerateRequest, PullProgress, PullRequest, TagsResponse, same_model,
};
use crate::capability::{
    Availability, Capability, CapabilityError, ModelSession, ProgressEvent, ProgressObserver,
};

/// Capability backed by a local Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaCapability {
    client: reqwest::Client,
    base_url: String,
    model: String,
    pull_if_missing: bool,
}

impl OllamaCapability {
    pub fn new(config: &ModelConfig) -> Result<Self, CapabilityError> {
        // reqwest is built without a bundled crypto provider; an Err here only
        // means one is already installed.
        let _ = rustls::crypto::ring::default_provider().install_default();

        // The server is local; environment proxies would only get in the way.
        let client = reqwest::Client::builder().no_proxy().build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            pull_if_missing: config.pull_if_missing,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn pull(&self, monitor: &ProgressObserver) -> Result<(), CapabilityError> {
        info!(model = %self.model, "Pulling model");
        let response = self
            .client
            .post(self.url("/api/pull"))
            .json(&PullRequest {
                model: &self.model,
                stream: true,
            })
            .send()
            .await?
            .error_for_status()?;

        let lines = ndjson_stream::<PullProgress>(response);
        tokio::pin!(lines);
        let mut finished = false;
        while let Some(line) = lines.next().await {
            let line = line?;
            if let Some(error) = line.error {
                return Err(CapabilityError::Model(error));
            }
            if line.status == "success" {
                finished = true;
                monitor.notify(ProgressEvent::new(1.0, Some(line.status)));
                continue;
            }
            if let Some(fraction) = line.fraction() {
                monitor.notify(ProgressEvent::new(fraction, Some(line.status)));
            } else {
                debug!(status = %line.status, "Pull status");
            }
        }

        if finished {
            Ok(())
        } else {
            Err(CapabilityError::Model(format!(
                "pull of {} ended without success",
                self.model
            )))
        }
    }
}

impl Capability for OllamaCapability {
    type Session = OllamaSession;

    async fn availability(&self) -> Result<Availability, CapabilityError> {
        let response = self
            .client
            .get(self.url("/api/tags"))
            .send()
            .await
            .map_err(|e| CapabilityError::Unreachable(format!("{}: {e}", self.base_url)))?
            .error_for_status()?;
        let tags: TagsResponse = response.json().await?;

        let installed = tags.models.iter().any(|m| same_model(&m.name, &self.model));
        let availability = if installed {
            Availability::Ready
        } else if self.pull_if_missing {
            Availability::NeedsDownload
        } else {
            Availability::Unavailable
        };
        debug!(model = %self.model, ?availability, "Queried availability");
        Ok(availability)
    }

    async fn create_session(
        &self,
        monitor: Option<ProgressObserver>,
    ) -> Result<OllamaSession, CapabilityError> {
        if let Some(monitor) = monitor {
            self.pull(&monitor).await?;
        }
        Ok(OllamaSession {
            client: self.client.clone(),
            url: self.url("/api/generate"),
            model: self.model.clone(),
        })
    }
}

/// Boxed reply stream returned by [`OllamaSession`].
pub type OllamaStream = Pin<Box<dyn Stream<Item = Result<String, CapabilityError>> + Send>>;

/// One provisioned Ollama model. Each prompt is independent; no context is
/// carried between calls.
#[derive(Debug, Clone)]
pub struct OllamaSession {
    client: reqwest::Client,
    url: String,
    model: String,
}

impl ModelSession for OllamaSession {
    type Stream = OllamaStream;

    async fn prompt_streaming(&self, prompt: &str) -> Result<OllamaStream, CapabilityError> {
        let response = self
            .client
            .post(&self.url)
            .json(&GenerateRequest {
                model: &self.model,
                prompt,
                stream: true,
            })
            .send()
            .await?
            .error_for_status()?;

        let lines = ndjson_stream::<GenerateChunk>(response);
        let stream = async_stream::stream! {
            tokio::pin!(lines);
            while let Some(line) = lines.next().await {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                };
                if let Some(error) = line.error {
                    yield Err(CapabilityError::Stream(error));
                    return;
                }
                if !line.response.is_empty() {
                    yield Ok(line.response);
                }
                if line.done {
                    break;
                }
            }
        };
        Ok(Box::pin(stream))
    }

    fn convention(&self) -> StreamConvention {
        StreamConvention::Incremental
    }
}
