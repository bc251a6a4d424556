//! `topica-server` – the Topica broker over WebSocket.
//!
//! Clients exchange binary frames (see `topica-wire`) with the broker to GET,
//! SET and SUBSCRIBE to topics in a shared [`TopicRegistry`].
//!
//! # Modules
//!
//! - [`context`] – [`ServerContext`] and [`ServerConfig`]: the per-instance
//!   state every session shares.
//! - [`nickname`] – [`NicknamePool`]: unique, human-friendly session names.
//! - [`transport`] – [`FrameSink`], the outbound seam, and [`WsFrameSink`].
//! - [`scheduler`] – [`Scheduler`]: cancellable periodic jobs.
//! - [`virtual_path`] – the per-session `/me/...` paths.
//! - [`session`] – [`Session`]: request dispatch, subscriptions, heartbeat.
//! - [`server`] – [`TopicaServer`]: the accept loop.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use topica_registry::TopicRegistry;
//! use topica_server::{ServerConfig, ServerContext, TopicaServer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), topica_types::TopicaError> {
//!     let registry = Arc::new(TopicRegistry::with_settings(false, true));
//!     let ctx = Arc::new(ServerContext::new(registry, ServerConfig::default()));
//!     TopicaServer::bind(ctx).await?.serve().await
//! }
//! ```
//!
//! [`TopicRegistry`]: topica_registry::TopicRegistry

pub mod context;
pub mod nickname;
pub mod scheduler;
pub mod server;
pub mod session;
pub mod transport;
pub mod virtual_path;

pub use context::{DEFAULT_PORT, ServerConfig, ServerContext};
pub use nickname::NicknamePool;
pub use scheduler::{Scheduler, Tick};
pub use server::TopicaServer;
pub use session::{HEARTBEAT_PAYLOAD, Session};
pub use transport::{FrameSink, WsFrameSink};
pub use virtual_path::{ID_PATH, Identity, NICKNAME_PATH};
