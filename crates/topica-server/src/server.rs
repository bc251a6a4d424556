//! [`TopicaServer`] – WebSocket listener.
//!
//! One tokio task per connection. Each task upgrades the socket, opens a
//! [`Session`] and feeds it every binary message until the client goes away
//! or the session is cancelled.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use topica_types::TopicaError;
use tracing::{Instrument, Span, debug, error, field, info, info_span, warn};

use crate::context::ServerContext;
use crate::session::Session;
use crate::transport::WsFrameSink;

pub struct TopicaServer {
    ctx: Arc<ServerContext>,
    listener: TcpListener,
}

impl TopicaServer {
    /// Bind the listener on `ctx.config().bind_addr`.
    ///
    /// # Errors
    ///
    /// [`TopicaError::Io`] when the address cannot be bound.
    pub async fn bind(ctx: Arc<ServerContext>) -> Result<Self, TopicaError> {
        let addr = ctx.config().bind_addr;
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "topica listening");
        Ok(Self { ctx, listener })
    }

    /// The bound address (useful when binding port 0).
    pub fn local_addr(&self) -> Result<SocketAddr, TopicaError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn context(&self) -> &Arc<ServerContext> {
        &self.ctx
    }

    /// Accept connections forever.
    pub async fn serve(self) -> Result<(), TopicaError> {
        self.run_until(CancellationToken::new()).await
    }

    /// Accept connections until `shutdown` is cancelled, then close every
    /// live session and wait for the connection tasks to finish.
    pub async fn run_until(self, shutdown: CancellationToken) -> Result<(), TopicaError> {
        let mut connections = JoinSet::new();
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let ctx = Arc::clone(&self.ctx);
                        let cancel = shutdown.child_token();
                        let span = info_span!(
                            "connection",
                            peer = %peer,
                            session = field::Empty,
                            nickname = field::Empty
                        );
                        connections.spawn(
                            async move {
                                if let Err(e) = handle_connection(stream, peer, ctx, cancel).await {
                                    warn!(peer = %peer, error = %e, "connection ended with error");
                                }
                            }
                            .instrument(span),
                        );
                    }
                    Err(e) => error!(error = %e, "accept error"),
                },
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }

        info!(live = connections.len(), "shutting down, closing sessions");
        while connections.join_next().await.is_some() {}
        Ok(())
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    ctx: Arc<ServerContext>,
    cancel: CancellationToken,
) -> Result<(), TopicaError> {
    let timeout = ctx.config().send_timeout;
    // The handshake gets the same bound as a send, and gives up on shutdown.
    let ws = tokio::select! {
        _ = cancel.cancelled() => {
            debug!(peer = %peer, "shutdown during handshake");
            return Ok(());
        }
        upgraded = tokio::time::timeout(timeout, accept_async(stream)) => match upgraded {
            Ok(Ok(ws)) => ws,
            Ok(Err(e)) => return Err(TopicaError::Transport(format!("handshake from {peer}: {e}"))),
            Err(_) => {
                return Err(TopicaError::Transport(format!(
                    "handshake from {peer} timed out after {timeout:?}"
                )));
            }
        },
    };
    let (ws_tx, mut ws_rx) = ws.split();

    let sink = Arc::new(WsFrameSink::new(ws_tx, timeout));
    let session = Session::open(ctx, sink, &cancel);
    let span = Span::current();
    span.record("session", field::display(session.id()));
    span.record("nickname", session.nickname());
    debug!(peer = %peer, session = %session.id(), nickname = session.nickname(), "client connected");

    loop {
        tokio::select! {
            _ = session.cancelled() => break,
            msg = ws_rx.next() => match msg {
                Some(Ok(Message::Binary(frame))) => session.handle_frame(&frame).await,
                Some(Ok(Message::Text(_))) => debug!(session = %session.id(), "ignoring text message"),
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    debug!(session = %session.id(), error = %e, "websocket error");
                    break;
                }
                Some(Ok(_)) => {}
            },
        }
    }

    session.close().await;
    Ok(())
}
