//! Outbound half of a client connection.
//!
//! Sessions only ever push two things: response frames and heartbeat pings.
//! [`FrameSink`] captures exactly that, so session logic can be driven by an
//! in-memory sink in tests and by [`WsFrameSink`] in production.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Sink, SinkExt};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use topica_types::TopicaError;

#[async_trait]
pub trait FrameSink: Send + Sync {
    /// Deliver one binary frame.
    async fn send_frame(&self, frame: Bytes) -> Result<(), TopicaError>;

    /// Deliver one heartbeat ping.
    async fn send_ping(&self, payload: Bytes) -> Result<(), TopicaError>;
}

/// [`FrameSink`] over the write half of a WebSocket.
///
/// Sends from the heartbeat, subscriptions and request handling are
/// serialised through one async mutex; each send is bounded by a timeout.
pub struct WsFrameSink<S> {
    inner: Mutex<S>,
    timeout: Duration,
}

impl<S> WsFrameSink<S> {
    pub fn new(inner: S, timeout: Duration) -> Self {
        Self {
            inner: Mutex::new(inner),
            timeout,
        }
    }
}

impl<S, E> WsFrameSink<S>
where
    S: Sink<Message, Error = E> + Unpin + Send,
    E: std::fmt::Display,
{
    async fn send(&self, message: Message) -> Result<(), TopicaError> {
        let mut inner = self.inner.lock().await;
        match tokio::time::timeout(self.timeout, inner.send(message)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(TopicaError::Transport(e.to_string())),
            Err(_) => Err(TopicaError::Transport(format!(
                "send timed out after {} ms",
                self.timeout.as_millis()
            ))),
        }
    }
}

#[async_trait]
impl<S, E> FrameSink for WsFrameSink<S>
where
    S: Sink<Message, Error = E> + Unpin + Send,
    E: std::fmt::Display,
{
    async fn send_frame(&self, frame: Bytes) -> Result<(), TopicaError> {
        self.send(Message::Binary(frame)).await
    }

    async fn send_ping(&self, payload: Bytes) -> Result<(), TopicaError> {
        self.send(Message::Ping(payload)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use tokio_util::sync::PollSender;

    #[tokio::test]
    async fn frames_become_binary_messages() -> Result<(), Box<dyn std::error::Error>> {
        let (tx, mut rx) = mpsc::channel::<Message>(8);
        let sink = WsFrameSink::new(PollSender::new(tx), Duration::from_millis(100));
        sink.send_frame(Bytes::from_static(&[0x81, 0x02])).await?;
        sink.send_ping(Bytes::from_static(&[0x00])).await?;

        assert_eq!(rx.recv().await, Some(Message::Binary(Bytes::from_static(&[0x81, 0x02]))));
        assert_eq!(rx.recv().await, Some(Message::Ping(Bytes::from_static(&[0x00]))));
        Ok(())
    }

    #[tokio::test]
    async fn closed_transport_is_a_transport_error() {
        let (tx, rx) = mpsc::channel::<Message>(8);
        drop(rx);
        let sink = WsFrameSink::new(PollSender::new(tx), Duration::from_millis(100));
        let err = sink.send_frame(Bytes::new()).await.unwrap_err();
        assert!(matches!(err, TopicaError::Transport(_)));
    }
}
