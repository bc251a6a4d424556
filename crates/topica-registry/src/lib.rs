//! `topica-registry` – the shared table of named, typed values.
//!
//! Producers (serial links, control loops) and client sessions all read and
//! write through one [`TopicRegistry`]. Value mutation takes a per-topic lock;
//! the registry-wide lock is only held while a brand-new path is inserted.
//!
//! # Modules
//!
//! - [`topic`] – [`Topic`]: one value cell with ordered update callbacks.
//! - [`registry`] – [`TopicRegistry`]: creation, lookup, enumeration and the
//!   strict-mode gate.
//! - [`settings`] – the `/topica/verbose` and `/topica/strict` settings topics
//!   that drive the registry flags at runtime.

pub mod registry;
pub mod settings;
pub mod topic;

pub use registry::{SetOutcome, TopicRegistry};
pub use settings::{STRICT_PATH, VERBOSE_PATH};
pub use topic::{CallbackId, Topic, UpdateCallback};
