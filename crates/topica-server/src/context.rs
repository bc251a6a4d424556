//! [`ServerContext`] – everything one broker instance owns.
//!
//! There are no process-wide statics: the registry, the nickname pool and
//! the tunables live here and every session holds an `Arc` to its context.
//! Two contexts never see each other's topics or nicknames.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use topica_registry::TopicRegistry;

use crate::nickname::NicknamePool;

/// Default WebSocket listen port.
pub const DEFAULT_PORT: u16 = 5443;

/// Broker tunables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Period of the per-session WebSocket ping.
    pub heartbeat: Duration,
    /// Smallest SUBSCRIBE interval accepted, in milliseconds.
    pub min_interval_ms: i32,
    /// Upper bound on a single send before the session is torn down.
    pub send_timeout: Duration,
    /// Most subscriptions one session may hold at once.
    pub max_subscriptions: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            heartbeat: Duration::from_millis(500),
            min_interval_ms: 10,
            send_timeout: Duration::from_millis(1000),
            max_subscriptions: 64,
        }
    }
}

impl ServerConfig {
    /// Override the listen address (builder-style).
    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }
}

pub struct ServerContext {
    registry: Arc<TopicRegistry>,
    nicknames: NicknamePool,
    config: ServerConfig,
}

impl ServerContext {
    pub fn new(registry: Arc<TopicRegistry>, config: ServerConfig) -> Self {
        Self {
            registry,
            nicknames: NicknamePool::new(),
            config,
        }
    }

    pub fn registry(&self) -> &Arc<TopicRegistry> {
        &self.registry
    }

    pub fn nicknames(&self) -> &NicknamePool {
        &self.nicknames
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
