//! [`TopicRegistry`] – path → [`Topic`] table shared by every producer and
//! session.
//!
//! # Locking
//!
//! | Operation | Lock |
//! |---|---|
//! | [`get`][TopicRegistry::get], [`list`][TopicRegistry::list] | registry read lock |
//! | [`update`][TopicRegistry::update] | registry read lock for the lookup, then the topic's value lock |
//! | insertion of a new path | registry write lock |
//!
//! # Strict mode
//!
//! Client-driven creation goes through [`get_or_create`][TopicRegistry::get_or_create]
//! and [`set`][TopicRegistry::set], which refuse unknown paths while strict
//! mode is on. In-process producers use [`register`][TopicRegistry::register],
//! which always creates.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use parking_lot::RwLock;
use topica_types::{TopicType, TopicaError, is_virtual};
use tracing::{debug, info};

use crate::settings;
use crate::topic::Topic;

/// What a client SET did to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    Created,
    Updated,
}

#[derive(Default)]
struct Index {
    by_path: HashMap<String, Arc<Topic>>,
    // Insertion order for `list`.
    order: Vec<String>,
}

/// Shared topic table. Wrap it in an [`Arc`] to share it between tasks.
#[derive(Default)]
pub struct TopicRegistry {
    index: RwLock<Index>,
    strict: Arc<AtomicBool>,
    verbose: Arc<AtomicBool>,
}

impl TopicRegistry {
    /// Create an empty, non-strict, quiet registry with no settings topics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry seeded with the `/topica/verbose` and
    /// `/topica/strict` settings topics.
    pub fn with_settings(strict: bool, verbose: bool) -> Self {
        let registry = Self::new();
        registry.strict.store(strict, Ordering::SeqCst);
        registry.verbose.store(verbose, Ordering::SeqCst);
        settings::install(&registry);
        registry
    }

    pub fn is_strict(&self) -> bool {
        self.strict.load(Ordering::SeqCst)
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose.load(Ordering::SeqCst)
    }

    /// Toggle strict mode, keeping the settings topic (if any) in sync.
    pub fn set_strict(&self, on: bool) {
        settings::write_flag(self, settings::STRICT_PATH, &self.strict, on);
    }

    /// Toggle verbose logging, keeping the settings topic (if any) in sync.
    pub fn set_verbose(&self, on: bool) {
        settings::write_flag(self, settings::VERBOSE_PATH, &self.verbose, on);
    }

    pub(crate) fn strict_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.strict)
    }

    pub(crate) fn verbose_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.verbose)
    }

    /// Look up a topic by path.
    pub fn get(&self, path: &str) -> Option<Arc<Topic>> {
        self.index.read().by_path.get(path).cloned()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.index.read().by_path.contains_key(path)
    }

    /// Every stored path, in insertion order. Virtual paths never appear.
    pub fn list(&self) -> Vec<String> {
        self.index.read().order.clone()
    }

    pub fn len(&self) -> usize {
        self.index.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Create `path` for an in-process producer, ignoring strict mode.
    ///
    /// Returns the existing topic when `path` is already registered with
    /// the same type.
    ///
    /// # Errors
    ///
    /// [`TopicaError::TypeMismatch`] when `path` exists with another type,
    /// [`TopicaError::ReservedPath`] for virtual paths, and
    /// [`TopicaError::InvalidValue`] when `initial` does not fit `ty`.
    pub fn register(&self, path: &str, ty: TopicType, initial: impl Into<Bytes>) -> Result<Arc<Topic>, TopicaError> {
        self.insert(path, ty, initial.into(), false).map(|(topic, _)| topic)
    }

    /// Return the topic at `path`, creating it unless strict mode is on.
    ///
    /// # Errors
    ///
    /// As [`register`][Self::register], plus [`TopicaError::StrictRejected`]
    /// when the path is unknown and strict mode is enabled.
    pub fn get_or_create(
        &self,
        path: &str,
        ty: TopicType,
        initial: impl Into<Bytes>,
    ) -> Result<Arc<Topic>, TopicaError> {
        self.insert(path, ty, initial.into(), true).map(|(topic, _)| topic)
    }

    /// Overwrite the value of an existing topic and run its callbacks.
    ///
    /// # Errors
    ///
    /// [`TopicaError::UnknownTopic`] when nothing is stored at `path`, or
    /// [`TopicaError::InvalidValue`] when `data` does not fit the topic type.
    pub fn update(&self, path: &str, data: impl Into<Bytes>) -> Result<Arc<Topic>, TopicaError> {
        let topic = self
            .get(path)
            .ok_or_else(|| TopicaError::UnknownTopic(path.to_string()))?;
        topic.update(data)?;
        Ok(topic)
    }

    /// Client SET: update `path` if it exists, otherwise create it with
    /// `data` as its initial value (subject to strict mode).
    ///
    /// Creation does not run callbacks; there are none yet.
    pub fn set(&self, path: &str, ty: TopicType, data: Bytes) -> Result<SetOutcome, TopicaError> {
        if let Some(topic) = self.get(path) {
            check_type(&topic, ty)?;
            topic.update(data)?;
            return Ok(SetOutcome::Updated);
        }
        let (topic, created) = self.insert(path, ty, data.clone(), true)?;
        if created {
            Ok(SetOutcome::Created)
        } else {
            // Lost an insertion race: somebody created it between our read
            // and write lock, so this SET is an update after all.
            topic.update(data)?;
            Ok(SetOutcome::Updated)
        }
    }

    fn insert(
        &self,
        path: &str,
        ty: TopicType,
        initial: Bytes,
        honour_strict: bool,
    ) -> Result<(Arc<Topic>, bool), TopicaError> {
        if let Some(existing) = self.get(path) {
            check_type(&existing, ty)?;
            return Ok((existing, false));
        }
        if is_virtual(path) {
            return Err(TopicaError::ReservedPath(path.to_string()));
        }
        if honour_strict && self.is_strict() {
            return Err(TopicaError::StrictRejected(path.to_string()));
        }
        ty.validate(&initial)?;

        let (topic, created) = {
            let mut guard = self.index.write();
            let index = &mut *guard;
            match index.by_path.entry(path.to_string()) {
                Entry::Occupied(slot) => (Arc::clone(slot.get()), false),
                Entry::Vacant(slot) => {
                    let topic = Arc::new(Topic::new(path.to_string(), ty, initial));
                    slot.insert(Arc::clone(&topic));
                    index.order.push(path.to_string());
                    (topic, true)
                }
            }
        };
        if !created {
            check_type(&topic, ty)?;
            return Ok((topic, false));
        }

        if self.is_verbose() {
            info!(path, ty = %ty, "added new topic");
        } else {
            debug!(path, ty = %ty, "added new topic");
        }
        Ok((topic, true))
    }
}

fn check_type(topic: &Topic, requested: TopicType) -> Result<(), TopicaError> {
    if topic.topic_type() == requested {
        Ok(())
    } else {
        Err(TopicaError::TypeMismatch {
            path: topic.path().to_string(),
            stored: topic.topic_type(),
            requested,
        })
    }
}
