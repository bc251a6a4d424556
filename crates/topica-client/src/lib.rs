//! `topica-client` – async client for a Topica broker.
//!
//! ```rust,no_run
//! use topica_client::TopicaClient;
//! use topica_types::TopicValue;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), topica_types::TopicaError> {
//!     let mut client = TopicaClient::connect("ws://robot.local:5443").await?;
//!     client.set("/drive/speed", &TopicValue::Float64(0.4)).await?;
//!     client.subscribe("/lidar/distance", 50).await?;
//!     while let Some(update) = client.next_response().await? {
//!         println!("{} = {:?}", update.path, update.value());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! The broker never answers a request it cannot serve, so [`TopicaClient::get`]
//! takes a timeout.

use std::collections::HashMap;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use topica_types::{TopicValue, TopicaError};
use topica_wire::{Request, Response, decode_response, encode_request};
use tracing::{debug, trace};

pub struct TopicaClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    // Latest value seen per path.
    state: HashMap<String, TopicValue>,
}

impl TopicaClient {
    /// Connect to a broker, e.g. `ws://127.0.0.1:5443`.
    pub async fn connect(url: &str) -> Result<Self, TopicaError> {
        let (ws, _) = connect_async(url).await.map_err(transport)?;
        debug!(url, "connected to topica");
        Ok(Self {
            ws,
            state: HashMap::new(),
        })
    }

    /// Ask for the current value of `path` and wait up to `timeout` for it.
    ///
    /// Pushes for other paths that arrive meanwhile are recorded in the
    /// cache ([`latest`][Self::latest]) and skipped.
    ///
    /// # Errors
    ///
    /// [`TopicaError::UnknownTopic`] when nothing arrives in time, which is
    /// how an unknown path looks from the client side.
    pub async fn get(&mut self, path: &str, timeout: Duration) -> Result<TopicValue, TopicaError> {
        self.send(&Request::Get { path: path.to_string() }).await?;
        tokio::time::timeout(timeout, self.response_for(path))
            .await
            .map_err(|_| TopicaError::UnknownTopic(path.to_string()))?
    }

    async fn response_for(&mut self, path: &str) -> Result<TopicValue, TopicaError> {
        loop {
            match self.next_response().await? {
                Some(response) if response.path == path => return Ok(response.value()?),
                Some(_) => continue,
                None => return Err(TopicaError::Transport("connection closed".into())),
            }
        }
    }

    /// Write `value` to `path`, creating the topic unless the broker is strict.
    pub async fn set(&mut self, path: &str, value: &TopicValue) -> Result<(), TopicaError> {
        let request = Request::Set {
            path: path.to_string(),
            ty: value.topic_type(),
            data: value.encode().into(),
        };
        self.send(&request).await
    }

    /// Ask for `path` to be pushed every `interval_ms` milliseconds.
    pub async fn subscribe(&mut self, path: &str, interval_ms: i32) -> Result<(), TopicaError> {
        let request = Request::Subscribe {
            path: path.to_string(),
            interval_ms,
        };
        self.send(&request).await
    }

    /// Wait for the next response frame. `None` once the broker closes the
    /// connection. Pings are answered and skipped.
    pub async fn next_response(&mut self) -> Result<Option<Response>, TopicaError> {
        while let Some(message) = self.ws.next().await {
            match message.map_err(transport)? {
                Message::Binary(frame) => {
                    let response = decode_response(&frame)?;
                    if let Ok(value) = response.value() {
                        self.state.insert(response.path.clone(), value);
                    }
                    trace!(path = %response.path, "response");
                    return Ok(Some(response));
                }
                Message::Close(_) => return Ok(None),
                _ => {}
            }
        }
        Ok(None)
    }

    /// Most recent value received for `path`, if any.
    pub fn latest(&self, path: &str) -> Option<&TopicValue> {
        self.state.get(path)
    }

    pub async fn close(mut self) -> Result<(), TopicaError> {
        self.ws.close(None).await.map_err(transport)
    }

    async fn send(&mut self, request: &Request) -> Result<(), TopicaError> {
        let frame = encode_request(request)?;
        self.ws.send(Message::Binary(frame)).await.map_err(transport)
    }
}

fn transport(e: tokio_tungstenite::tungstenite::Error) -> TopicaError {
    TopicaError::Transport(e.to_string())
}
