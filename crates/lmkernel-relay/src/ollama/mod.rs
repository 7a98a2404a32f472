//! Ollama-backed capability.
//!
//! Talks to a local Ollama server over HTTP. Availability comes from the
//! installed model list, downloads stream progress from `/api/pull`, and
//! prompts stream newline-delimited JSON from `/api/generate`.

mod client;
mod ndjson;
mod types;

pub use client::{OllamaCapability, OllamaSession};
