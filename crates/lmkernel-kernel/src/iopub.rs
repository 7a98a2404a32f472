//! Output published on the host's IOPub channel.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;

use crate::protocol::ErrorContent;

/// Which standard stream a `stream` message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamName {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamContent {
    pub name: StreamName,
    pub text: String,
}

/// One IOPub message, tagged with its message type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "msg_type", content = "content", rename_all = "snake_case")]
pub enum IoPubMessage {
    Stream(StreamContent),
    Error(ErrorContent),
}

impl IoPubMessage {
    pub fn stdout(text: impl Into<String>) -> Self {
        Self::Stream(StreamContent {
            name: StreamName::Stdout,
            text: text.into(),
        })
    }
}

/// The host's output channel.
pub trait IoPubSink: Send + Sync {
    fn publish(&self, message: IoPubMessage);
}

impl<T: IoPubSink + ?Sized> IoPubSink for Arc<T> {
    fn publish(&self, message: IoPubMessage) {
        (**self).publish(message);
    }
}

/// Sink that forwards messages into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<IoPubMessage>,
}

impl ChannelSink {
    /// Create a sink and the receiver the host drains.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<IoPubMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl IoPubSink for ChannelSink {
    fn publish(&self, message: IoPubMessage) {
        if self.tx.send(message).is_err() {
            warn!("IOPub receiver dropped; discarding message");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stream_message_shape() {
        assert_eq!(
            serde_json::to_value(IoPubMessage::stdout("hi")).unwrap(),
            json!({"msg_type": "stream", "content": {"name": "stdout", "text": "hi"}})
        );
    }

    #[test]
    fn error_message_shape() {
        let msg = IoPubMessage::Error(ErrorContent::generic("nope"));
        assert_eq!(
            serde_json::to_value(msg).unwrap(),
            json!({
                "msg_type": "error",
                "content": {"ename": "Error", "evalue": "nope", "traceback": []}
            })
        );
    }

    #[tokio::test]
    async fn channel_sink_delivers_in_order() {
        let (sink, mut rx) = ChannelSink::new();
        sink.publish(IoPubMessage::stdout("a"));
        sink.publish(IoPubMessage::stdout("b"));
        assert_eq!(rx.recv().await.unwrap(), IoPubMessage::stdout("a"));
        assert_eq!(rx.recv().await.unwrap(), IoPubMessage::stdout("b"));
    }

    #[test]
    fn closed_channel_is_not_fatal() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.publish(IoPubMessage::stdout("lost"));
    }
}
