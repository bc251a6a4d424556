//! [`Session`] – one connected client.
//!
//! ```text
//!  open() ──▶ OPEN ──(handle_frame)*──▶ close() ──▶ CLOSED
//! ```
//!
//! While open a session owns a heartbeat job and any number of subscription
//! jobs, all on its own [`Scheduler`]. [`Session::close`] cancels them and
//! waits for every one to finish, so nothing is written to the transport
//! once it returns.
//!
//! Requests that cannot be served (unknown topic, strict-mode rejection,
//! interval below the minimum, malformed frame) are logged and dropped; no
//! error frame is sent. A failed send cancels the whole session.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use topica_registry::{SetOutcome, Topic};
use topica_types::{TopicType, TopicaError};
use topica_wire::{Request, decode_request, encode_response};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::context::ServerContext;
use crate::scheduler::{Scheduler, Tick};
use crate::transport::FrameSink;
use crate::virtual_path::{self, Identity};

/// Payload of every heartbeat ping.
pub const HEARTBEAT_PAYLOAD: [u8; 1] = [0x00];

type PushFuture = Pin<Box<dyn Future<Output = Tick> + Send>>;

struct Subscription {
    path: String,
    interval_ms: i32,
    token: CancellationToken,
}

pub struct Session {
    ctx: Arc<ServerContext>,
    sink: Arc<dyn FrameSink>,
    identity: Identity,
    cancel: CancellationToken,
    scheduler: Scheduler,
    subscriptions: Mutex<Vec<Subscription>>,
    released: AtomicBool,
}

impl Session {
    /// Open a session: assign an id and nickname and start the heartbeat.
    ///
    /// The session is cancelled together with `parent`.
    pub fn open(ctx: Arc<ServerContext>, sink: Arc<dyn FrameSink>, parent: &CancellationToken) -> Self {
        let identity = Identity {
            id: Uuid::new_v4(),
            nickname: ctx.nicknames().acquire(),
        };
        let cancel = parent.child_token();
        let scheduler = Scheduler::new(cancel.child_token());
        let session = Self {
            ctx,
            sink,
            identity,
            cancel,
            scheduler,
            subscriptions: Mutex::new(Vec::new()),
            released: AtomicBool::new(false),
        };
        session.start_heartbeat();
        session.lifecycle("session opened");
        session
    }

    pub fn id(&self) -> Uuid {
        self.identity.id
    }

    pub fn nickname(&self) -> &str {
        &self.identity.nickname
    }

    /// `true` once the session has been cancelled, by a failed send, by its
    /// parent token or by [`close`][Self::close].
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves when the session is cancelled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// Decode and serve one inbound binary frame. Never fails: problems are
    /// logged and the frame is dropped.
    pub async fn handle_frame(&self, frame: &[u8]) {
        match decode_request(frame) {
            Ok(request) => {
                if let Err(e) = self.handle_request(request).await {
                    self.report(&e);
                }
            }
            Err(e) => self.report(&TopicaError::from(e)),
        }
    }

    /// Serve one decoded request.
    ///
    /// # Errors
    ///
    /// The reason the request was not served. The caller decides whether to
    /// tell anyone; [`handle_frame`][Self::handle_frame] only logs it.
    pub async fn handle_request(&self, request: Request) -> Result<(), TopicaError> {
        match request {
            Request::Get { path } => self.get(&path).await,
            Request::Set { path, ty, data } => self.set(&path, ty, data),
            Request::Subscribe { path, interval_ms } => self.subscribe(&path, interval_ms),
        }
    }

    async fn get(&self, path: &str) -> Result<(), TopicaError> {
        let (ty, value) = if virtual_path::is_virtual(path) {
            virtual_path::resolve(path, &self.identity)
                .ok_or_else(|| TopicaError::UnknownTopic(path.to_string()))?
        } else {
            let topic = self.topic(path)?;
            (topic.topic_type(), topic.value())
        };
        let frame = encode_response(path, ty, &value)?;
        if let Err(e) = self.sink.send_frame(frame).await {
            self.cancel.cancel();
            return Err(e);
        }
        trace!(session = %self.identity.id, path, "served GET");
        Ok(())
    }

    fn set(&self, path: &str, ty: TopicType, data: Bytes) -> Result<(), TopicaError> {
        if virtual_path::is_virtual(path) {
            return Err(TopicaError::ReservedPath(path.to_string()));
        }
        match self.ctx.registry().set(path, ty, data)? {
            SetOutcome::Created => debug!(session = %self.identity.id, path, ty = %ty, "SET created topic"),
            SetOutcome::Updated => trace!(session = %self.identity.id, path, "SET updated topic"),
        }
        Ok(())
    }

    fn subscribe(&self, path: &str, interval_ms: i32) -> Result<(), TopicaError> {
        if interval_ms < self.ctx.config().min_interval_ms {
            return Err(TopicaError::InvalidInterval(interval_ms));
        }
        let topic = self.topic(path)?;

        let mut subscriptions = self.subscriptions.lock();
        subscriptions.retain(|s| !s.token.is_cancelled());
        if subscriptions
            .iter()
            .any(|s| s.path == path && s.interval_ms == interval_ms)
        {
            debug!(session = %self.identity.id, path, interval_ms, "already subscribed");
            return Ok(());
        }
        let limit = self.ctx.config().max_subscriptions;
        if subscriptions.len() >= limit {
            return Err(TopicaError::SubscriptionLimit(limit));
        }

        let period = Duration::from_millis(u64::from(interval_ms.unsigned_abs()).max(1));
        let token = self.scheduler.every(period, self.push_job(topic, path.to_string()));
        subscriptions.push(Subscription {
            path: path.to_string(),
            interval_ms,
            token,
        });
        debug!(session = %self.identity.id, path, interval_ms, "subscribed");
        Ok(())
    }

    /// Cancel every subscription to `path`. Returns how many were active.
    pub fn unsubscribe(&self, path: &str) -> usize {
        let mut subscriptions = self.subscriptions.lock();
        let mut removed = 0;
        subscriptions.retain(|s| {
            if s.path == path {
                if !s.token.is_cancelled() {
                    removed += 1;
                }
                s.token.cancel();
                false
            } else {
                !s.token.is_cancelled()
            }
        });
        if removed > 0 {
            debug!(session = %self.identity.id, path, "unsubscribed");
        }
        removed
    }

    /// Subscriptions still running.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions
            .lock()
            .iter()
            .filter(|s| !s.token.is_cancelled())
            .count()
    }

    /// Stop the heartbeat and every subscription, wait for them to finish,
    /// and release the nickname.
    pub async fn close(self) {
        self.cancel.cancel();
        self.scheduler.shutdown().await;
        self.release_nickname();
        self.lifecycle("session closed");
    }

    fn topic(&self, path: &str) -> Result<Arc<Topic>, TopicaError> {
        self.ctx
            .registry()
            .get(path)
            .ok_or_else(|| TopicaError::UnknownTopic(path.to_string()))
    }

    fn start_heartbeat(&self) {
        let sink = Arc::clone(&self.sink);
        let cancel = self.cancel.clone();
        let session = self.identity.id;
        self.scheduler.every(self.ctx.config().heartbeat, move || {
            let sink = Arc::clone(&sink);
            let cancel = cancel.clone();
            async move {
                match sink.send_ping(Bytes::from_static(&HEARTBEAT_PAYLOAD)).await {
                    Ok(()) => Tick::Continue,
                    Err(e) => {
                        warn!(session = %session, error = %e, "heartbeat failed, closing session");
                        cancel.cancel();
                        Tick::Stop
                    }
                }
            }
        });
    }

    /// Job that pushes the topic's value as it is at each firing.
    fn push_job(
        &self,
        topic: Arc<Topic>,
        path: String,
    ) -> impl FnMut() -> PushFuture + Send + 'static {
        let sink = Arc::clone(&self.sink);
        let cancel = self.cancel.clone();
        let session = self.identity.id;
        move || {
            let frame = encode_response(&path, topic.topic_type(), &topic.value());
            let sink = Arc::clone(&sink);
            let cancel = cancel.clone();
            let path = path.clone();
            let push: PushFuture = Box::pin(async move {
                let frame = match frame {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!(session = %session, path = %path, error = %e, "cannot encode subscription push");
                        return Tick::Stop;
                    }
                };
                match sink.send_frame(frame).await {
                    Ok(()) => Tick::Continue,
                    Err(e) => {
                        warn!(session = %session, path = %path, error = %e, "subscription push failed, closing session");
                        cancel.cancel();
                        Tick::Stop
                    }
                }
            });
            push
        }
    }

    fn report(&self, error: &TopicaError) {
        let session = self.identity.id;
        match error {
            TopicaError::UnknownTopic(path) => debug!(session = %session, path = %path, "dropping request for unknown topic"),
            TopicaError::InvalidInterval(ms) if *ms < 0 => warn!(
                session = %session,
                interval_ms = *ms,
                "dropping SUBSCRIBE with negative interval (client may be sending little-endian)"
            ),
            TopicaError::Transport(_) => debug!(session = %session, error = %error, "request abandoned, transport gone"),
            _ => warn!(session = %session, error = %error, "dropping request"),
        }
    }

    fn release_nickname(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            self.ctx.nicknames().release(&self.identity.nickname);
        }
    }

    fn lifecycle(&self, event: &str) {
        let (session, nickname) = (self.identity.id, self.identity.nickname.as_str());
        if self.ctx.registry().is_verbose() {
            info!(session = %session, nickname, "{event}");
        } else {
            debug!(session = %session, nickname, "{event}");
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.release_nickname();
    }
}
