//! [`Topic`] – a named, typed value cell.
//!
//! The path and type are fixed at construction; only the value changes.
//! Update callbacks run synchronously, in registration order, after the value
//! lock has been released so a callback may freely read the topic.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;
use topica_types::{TopicType, TopicValue, TopicaError, ValueError};

/// Callback invoked with the topic after every update.
pub type UpdateCallback = Arc<dyn Fn(&Topic) + Send + Sync>;

/// Handle returned by [`Topic::on_update`], used to remove the callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

pub struct Topic {
    path: String,
    ty: TopicType,
    value: Mutex<Bytes>,
    callbacks: Mutex<Vec<(CallbackId, UpdateCallback)>>,
    next_callback: AtomicU64,
}

impl Topic {
    /// Build a detached topic. `initial` must already be valid for `ty`.
    pub(crate) fn new(path: String, ty: TopicType, initial: Bytes) -> Self {
        Self {
            path,
            ty,
            value: Mutex::new(initial),
            callbacks: Mutex::new(Vec::new()),
            next_callback: AtomicU64::new(0),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn topic_type(&self) -> TopicType {
        self.ty
    }

    /// Current raw value. Cheap: the bytes are reference counted.
    pub fn value(&self) -> Bytes {
        self.value.lock().clone()
    }

    /// Current value decoded according to the topic type.
    pub fn typed(&self) -> Result<TopicValue, ValueError> {
        TopicValue::decode(self.ty, &self.value())
    }

    /// Overwrite the value and notify every callback.
    ///
    /// # Errors
    ///
    /// Returns [`TopicaError::InvalidValue`] when `data` is not a valid
    /// encoding of the topic type; the stored value is left untouched.
    pub fn update(&self, data: impl Into<Bytes>) -> Result<(), TopicaError> {
        let data = data.into();
        self.ty.validate(&data)?;
        *self.value.lock() = data;
        self.run_callbacks();
        Ok(())
    }

    /// Typed convenience over [`Topic::update`].
    pub fn update_value(&self, value: &TopicValue) -> Result<(), TopicaError> {
        if value.topic_type() != self.ty {
            return Err(TopicaError::TypeMismatch {
                path: self.path.clone(),
                stored: self.ty,
                requested: value.topic_type(),
            });
        }
        self.update(value.encode())
    }

    /// Register a callback run after every update.
    pub fn on_update<F>(&self, callback: F) -> CallbackId
    where
        F: Fn(&Topic) + Send + Sync + 'static,
    {
        let id = CallbackId(self.next_callback.fetch_add(1, Ordering::Relaxed));
        self.callbacks.lock().push((id, Arc::new(callback)));
        id
    }

    /// Remove a callback. Returns `false` when `id` was not registered.
    pub fn remove_callback(&self, id: CallbackId) -> bool {
        let mut callbacks = self.callbacks.lock();
        let before = callbacks.len();
        callbacks.retain(|(existing, _)| *existing != id);
        callbacks.len() != before
    }

    fn run_callbacks(&self) {
        // Snapshot so callbacks can register or remove callbacks themselves.
        let callbacks: Vec<UpdateCallback> = self.callbacks.lock().iter().map(|(_, cb)| Arc::clone(cb)).collect();
        for callback in callbacks {
            callback(self);
        }
    }
}

impl fmt::Debug for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Topic")
            .field("path", &self.path)
            .field("type", &self.ty)
            .field("len", &self.value.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn float_topic() -> Topic {
        Topic::new(
            "/drive/speed".to_string(),
            TopicType::Float64,
            Bytes::from(TopicValue::Float64(0.0).encode()),
        )
    }

    #[test]
    fn update_replaces_value() -> Result<(), Box<dyn std::error::Error>> {
        let topic = float_topic();
        topic.update_value(&TopicValue::Float64(1.25))?;
        assert_eq!(topic.typed()?, TopicValue::Float64(1.25));
        Ok(())
    }

    #[test]
    fn invalid_update_keeps_old_value() {
        let topic = float_topic();
        assert!(topic.update(vec![1, 2, 3]).is_err());
        assert_eq!(topic.typed().unwrap(), TopicValue::Float64(0.0));
    }

    #[test]
    fn typed_update_rejects_other_type() {
        let topic = float_topic();
        let err = topic.update_value(&TopicValue::Int32(1)).unwrap_err();
        assert!(matches!(err, TopicaError::TypeMismatch { .. }));
    }

    #[test]
    fn callbacks_run_in_registration_order() {
        let topic = float_topic();
        let order = Arc::new(Mutex::new(Vec::new()));
        for n in 0..3 {
            let order = Arc::clone(&order);
            topic.on_update(move |_| order.lock().push(n));
        }
        topic.update_value(&TopicValue::Float64(2.0)).unwrap();
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn callback_sees_updated_value() {
        let topic = float_topic();
        let seen = Arc::new(Mutex::new(None));
        let seen_cb = Arc::clone(&seen);
        topic.on_update(move |t| *seen_cb.lock() = Some(t.typed().unwrap()));
        topic.update_value(&TopicValue::Float64(9.5)).unwrap();
        assert_eq!(*seen.lock(), Some(TopicValue::Float64(9.5)));
    }

    #[test]
    fn removed_callback_is_not_called() {
        let topic = float_topic();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_cb = Arc::clone(&calls);
        let id = topic.on_update(move |_| {
            calls_cb.fetch_add(1, Ordering::SeqCst);
        });
        topic.update_value(&TopicValue::Float64(1.0)).unwrap();
        assert!(topic.remove_callback(id));
        assert!(!topic.remove_callback(id));
        topic.update_value(&TopicValue::Float64(2.0)).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
