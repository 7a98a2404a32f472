//! Normalise streamed reply increments into deltas.
//!
//! Some backends yield the full reply so far on every increment, others only
//! the new text. `DeltaNormalizer` turns either into plain deltas.
//!
//! In `Auto` mode every increment is checked against the previous one. While
//! each increment extends the previous one the stream is read as cumulative.
//! The first increment that does not is proof of an incremental stream: the
//! normaliser switches for good and appends that increment whole. Text that
//! repeated tokens hid during the cumulative reading is restored on the
//! switch when it can be recovered.
//!
//! The concatenation of every delta returned by [`DeltaNormalizer::push`]
//! is always exactly [`DeltaNormalizer::text`].

use tracing::debug;

use lmkernel_core::StreamConvention;

#[derive(Debug)]
pub struct DeltaNormalizer {
    /// Convention asked for; `Auto` keeps checking every increment.
    requested: StreamConvention,
    /// Convention currently applied.
    current: StreamConvention,
    /// Accumulated reply.
    text: String,
    /// Last raw increment, compared against in cumulative mode.
    previous: String,
    /// Raw increments joined end to end, kept while an `Auto` stream read as
    /// cumulative could still be incremental with `text` as a prefix.
    joined: Option<String>,
}

impl DeltaNormalizer {
    pub const fn new(convention: StreamConvention) -> Self {
        Self {
            requested: convention,
            current: convention,
            text: String::new(),
            previous: String::new(),
            joined: None,
        }
    }

    /// The convention in effect. For `Auto` this is `Auto` until a second
    /// increment arrives, then the current reading of the stream.
    pub const fn convention(&self) -> StreamConvention {
        self.current
    }

    /// Feed one increment and return the newly produced text.
    ///
    /// Empty increments carry no information under either convention and
    /// are ignored.
    pub fn push(&mut self, chunk: &str) -> &str {
        let start = self.text.len();
        if chunk.is_empty() {
            return "";
        }

        match (self.requested, self.current) {
            (_, StreamConvention::Incremental) => self.text.push_str(chunk),
            (StreamConvention::Cumulative, _) => self.push_snapshot(chunk),
            (_, StreamConvention::Auto) if self.previous.is_empty() => {
                // First increment: a snapshot and a delta are the same thing.
                self.text.push_str(chunk);
                self.previous.push_str(chunk);
                self.joined = Some(chunk.to_string());
            }
            _ => self.push_detected(chunk),
        }

        &self.text[start..]
    }

    /// Forced cumulative: an increment that rewrites earlier text emits only
    /// its part past the common prefix.
    fn push_snapshot(&mut self, chunk: &str) {
        let common = common_prefix_len(&self.previous, chunk);
        if common < self.previous.len() {
            debug!(
                previous_len = self.previous.len(),
                common, "Cumulative increment rewrote earlier text"
            );
        }
        self.text.push_str(&chunk[common..]);
        self.previous.clear();
        self.previous.push_str(chunk);
    }

    /// `Auto` after the first increment.
    fn push_detected(&mut self, chunk: &str) {
        if let Some(suffix) = chunk.strip_prefix(self.previous.as_str()) {
            if self.current == StreamConvention::Auto {
                debug!("Stream reads as cumulative");
            }
            self.current = StreamConvention::Cumulative;
            self.text.push_str(suffix);
            self.previous.clear();
            self.previous.push_str(chunk);

            if let Some(joined) = &mut self.joined {
                joined.push_str(chunk);
            }
            if self
                .joined
                .as_deref()
                .is_some_and(|joined| !joined.starts_with(self.text.as_str()))
            {
                self.joined = None;
            }
            return;
        }

        debug!(
            previous_len = self.previous.len(),
            "Increment does not extend the previous one; stream is incremental"
        );
        self.current = StreamConvention::Incremental;
        if let Some(joined) = self.joined.take() {
            self.text.push_str(&joined[self.text.len()..]);
        }
        self.text.push_str(chunk);
        self.previous.clear();
    }

    /// Full reply accumulated so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

/// Byte length of the longest common prefix, on a char boundary of both.
fn common_prefix_len(a: &str, b: &str) -> usize {
    a.char_indices()
        .zip(b.chars())
        .find(|((_, ca), cb)| ca != cb)
        .map_or_else(|| a.len().min(b.len()), |((i, _), _)| i)
}
