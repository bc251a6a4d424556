//! Settings topics.
//!
//! Two Boolean topics expose the registry flags to every client:
//!
//! | Path | Effect |
//! |---|---|
//! | `/topica/verbose` | Topic creation and session lifecycle are logged at `info` instead of `debug` |
//! | `/topica/strict` | Clients may no longer create topics with SET |
//!
//! Writing either topic, over the wire or in-process, updates the flag
//! through an update callback.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use topica_types::{TopicType, TopicValue};
use tracing::{info, warn};

use crate::registry::TopicRegistry;

pub const VERBOSE_PATH: &str = "/topica/verbose";
pub const STRICT_PATH: &str = "/topica/strict";

pub(crate) fn install(registry: &TopicRegistry) {
    bind_flag(registry, VERBOSE_PATH, registry.verbose_flag());
    bind_flag(registry, STRICT_PATH, registry.strict_flag());
}

fn bind_flag(registry: &TopicRegistry, path: &'static str, flag: Arc<AtomicBool>) {
    let initial = TopicValue::Boolean(flag.load(Ordering::SeqCst)).encode();
    match registry.register(path, TopicType::Boolean, initial) {
        Ok(topic) => {
            topic.on_update(move |topic| {
                if let Ok(TopicValue::Boolean(on)) = topic.typed() {
                    let was = flag.swap(on, Ordering::SeqCst);
                    if was != on {
                        info!(setting = path, enabled = on, "registry setting changed");
                    }
                }
            });
        }
        Err(e) => warn!(setting = path, error = %e, "could not install settings topic"),
    }
}

/// Set a flag through its settings topic when present so subscribers see the
/// change, or directly otherwise.
pub(crate) fn write_flag(registry: &TopicRegistry, path: &str, flag: &AtomicBool, on: bool) {
    match registry.get(path) {
        Some(topic) => {
            if let Err(e) = topic.update_value(&TopicValue::Boolean(on)) {
                warn!(setting = path, error = %e, "could not write settings topic");
            }
        }
        None => flag.store(on, Ordering::SeqCst),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use topica_types::TopicaError;

    #[test]
    fn settings_topics_are_listed() {
        let registry = TopicRegistry::with_settings(false, true);
        assert_eq!(registry.list(), vec![VERBOSE_PATH, STRICT_PATH]);
        assert_eq!(
            registry.get(STRICT_PATH).unwrap().typed().unwrap(),
            TopicValue::Boolean(false)
        );
    }

    #[test]
    fn writing_strict_topic_enables_strict_mode() {
        let registry = TopicRegistry::with_settings(false, false);
        registry
            .set(STRICT_PATH, TopicType::Boolean, Bytes::from_static(&[1]))
            .unwrap();
        assert!(registry.is_strict());
        let err = registry
            .set("/new", TopicType::Int16, Bytes::from_static(&[0, 1]))
            .unwrap_err();
        assert!(matches!(err, TopicaError::StrictRejected(_)));
    }

    #[test]
    fn set_strict_updates_the_topic() {
        let registry = TopicRegistry::with_settings(false, false);
        registry.set_strict(true);
        assert!(registry.is_strict());
        assert_eq!(
            registry.get(STRICT_PATH).unwrap().typed().unwrap(),
            TopicValue::Boolean(true)
        );
    }

    #[test]
    fn strict_mode_can_be_lifted_over_the_settings_topic() {
        let registry = TopicRegistry::with_settings(true, false);
        // The settings topic exists, so strict mode does not block the write.
        registry
            .set(STRICT_PATH, TopicType::Boolean, Bytes::from_static(&[0]))
            .unwrap();
        assert!(!registry.is_strict());
    }

    #[test]
    fn verbose_flag_follows_topic() {
        let registry = TopicRegistry::with_settings(false, false);
        registry.update(VERBOSE_PATH, vec![1]).unwrap();
        assert!(registry.is_verbose());
    }
}
