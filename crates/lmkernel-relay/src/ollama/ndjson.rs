//! Newline-delimited JSON over a streaming HTTP body.

use std::io;

use serde::de::DeserializeOwned;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::{Stream, StreamExt};
use tokio_util::io::StreamReader;

use crate::capability::CapabilityError;

/// Decode each non-blank line of `response` as `T`.
///
/// Lines may be split across body chunks; a trailing line without a newline
/// is decoded when the body ends. The stream stops after the first error.
pub(super) fn ndjson_stream<T>(
    response: reqwest::Response,
) -> impl Stream<Item = Result<T, CapabilityError>> + Send
where
    T: DeserializeOwned + Send + 'static,
{
    let body = response
        .bytes_stream()
        .map(|chunk| chunk.map_err(io::Error::other));
    let mut lines = BufReader::new(StreamReader::new(Box::pin(body))).lines();

    async_stream::stream! {
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => return,
                Err(e) => {
                    yield Err(CapabilityError::Stream(format!("reading response body: {e}")));
                    return;
                }
            };
            match parse_line::<T>(&line) {
                Ok(Some(value)) => {
                    yield Ok(value);
                }
                Ok(None) => {}
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }
    }
}

fn parse_line<T: DeserializeOwned>(line: &str) -> Result<Option<T>, CapabilityError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(trimmed)?))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn blank_lines_are_skipped() {
        assert!(parse_line::<serde_json::Value>("  \r").unwrap().is_none());
    }

    #[test]
    fn line_is_decoded() {
        let v: serde_json::Value = parse_line("{\"a\":1}").unwrap().unwrap();
        assert_eq!(v["a"], 1);
    }

    #[test]
    fn malformed_line_is_an_error() {
        let err = parse_line::<serde_json::Value>("{oops").unwrap_err();
        assert!(matches!(err, CapabilityError::Json(_)));
    }
}
