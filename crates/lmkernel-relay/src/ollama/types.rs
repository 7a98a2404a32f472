//! Wire types for the Ollama HTTP API.
//!
//! Tolerant reader: unknown fields are ignored, missing ones default.

use serde::{Deserialize, Serialize};

/// `GET /api/tags` response.
#[derive(Debug, Deserialize)]
pub(super) struct TagsResponse {
    #[serde(default)]
    pub models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ModelTag {
    pub name: String,
}

/// `POST /api/pull` request body.
#[derive(Debug, Serialize)]
pub(super) struct PullRequest<'a> {
    pub model: &'a str,
    pub stream: bool,
}

/// One line of `/api/pull` progress.
#[derive(Debug, Deserialize)]
pub(super) struct PullProgress {
    #[serde(default)]
    pub status: String,
    pub total: Option<u64>,
    pub completed: Option<u64>,
    pub error: Option<String>,
}

impl PullProgress {
    /// Fraction complete, when the line carries byte counts.
    #[allow(clippy::cast_precision_loss)]
    pub fn fraction(&self) -> Option<f64> {
        match (self.completed, self.total) {
            (Some(completed), Some(total)) if total > 0 => {
                Some(completed as f64 / total as f64)
            }
            _ => None,
        }
    }
}

/// `POST /api/generate` request body.
#[derive(Debug, Serialize)]
pub(super) struct GenerateRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    pub stream: bool,
}

/// One line of `/api/generate` output.
#[derive(Debug, Deserialize)]
pub(super) struct GenerateChunk {
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub done: bool,
    pub error: Option<String>,
}

/// Ollama reports `name` as `model:tag`; a bare name means `:latest`.
pub(super) fn same_model(installed: &str, wanted: &str) -> bool {
    fn canonical(name: &str) -> String {
        if name.contains(':') {
            name.to_string()
        } else {
            format!("{name}:latest")
        }
    }
    canonical(installed) == canonical(wanted)
}
