//! Downstream side of a serial link.

use std::sync::Arc;

use topica_registry::{Topic, TopicRegistry};
use topica_types::TopicaError;
use tracing::warn;

use crate::layout::{Record, RecordLayout};

/// Receives every decoded record, in stream order, on the link task.
pub trait RecordSink: Send {
    fn on_record(&mut self, record: &Record);
}

impl<F> RecordSink for F
where
    F: FnMut(&Record) + Send,
{
    fn on_record(&mut self, record: &Record) {
        self(record)
    }
}

/// Publishes each record field to its own topic, `{prefix}/{field}`.
///
/// With the LiDAR layout and the default prefix this yields
/// `/lidar/distance` and `/lidar/rotation`.
pub struct RegistrySink {
    topics: Vec<Arc<Topic>>,
}

impl RegistrySink {
    pub const DEFAULT_PREFIX: &'static str = "/lidar";

    /// Register one zero-valued topic per layout field. Registration ignores
    /// strict mode, since the link is an in-process producer.
    pub fn new(
        registry: Arc<TopicRegistry>,
        prefix: &str,
        layout: &RecordLayout,
    ) -> Result<Self, TopicaError> {
        let prefix = prefix.trim_end_matches('/');
        let topics = layout
            .fields()
            .iter()
            .map(|field| {
                let zero = vec![0u8; field.ty.fixed_width().unwrap_or(0)];
                registry.register(&format!("{prefix}/{}", field.name), field.ty, zero)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { topics })
    }

    pub fn paths(&self) -> Vec<String> {
        self.topics.iter().map(|t| t.path().to_string()).collect()
    }
}

impl RecordSink for RegistrySink {
    fn on_record(&mut self, record: &Record) {
        for (topic, value) in self.topics.iter().zip(&record.values) {
            if let Err(e) = topic.update_value(value) {
                warn!(path = topic.path(), error = %e, "dropping serial value");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use topica_types::{TopicType, TopicValue};

    use crate::layout::FieldSpec;

    #[test]
    fn registers_one_topic_per_field() -> Result<(), Box<dyn std::error::Error>> {
        let registry = Arc::new(TopicRegistry::new());
        let sink = RegistrySink::new(Arc::clone(&registry), RegistrySink::DEFAULT_PREFIX, &RecordLayout::lidar())?;
        assert_eq!(sink.paths(), vec!["/lidar/distance", "/lidar/rotation"]);
        assert_eq!(registry.get("/lidar/distance").unwrap().typed()?, TopicValue::Float32(0.0));
        Ok(())
    }

    #[test]
    fn records_update_topics() -> Result<(), Box<dyn std::error::Error>> {
        let registry = Arc::new(TopicRegistry::new());
        let layout = RecordLayout::new(vec![
            FieldSpec::new("left", TopicType::Int16),
            FieldSpec::new("bumper", TopicType::Boolean),
        ])?;
        let mut sink = RegistrySink::new(Arc::clone(&registry), "/base/", &layout)?;
        sink.on_record(&Record {
            values: vec![TopicValue::Int16(-7), TopicValue::Boolean(true)],
        });
        assert_eq!(registry.get("/base/left").unwrap().typed()?, TopicValue::Int16(-7));
        assert_eq!(registry.get("/base/bumper").unwrap().typed()?, TopicValue::Boolean(true));
        Ok(())
    }

    #[test]
    fn registration_works_in_strict_mode() {
        let registry = Arc::new(TopicRegistry::new());
        registry.set_strict(true);
        assert!(RegistrySink::new(registry, "/lidar", &RecordLayout::lidar()).is_ok());
    }

    #[test]
    fn closures_are_sinks() {
        let mut count = 0;
        {
            let mut sink = |_: &Record| count += 1;
            sink.on_record(&Record { values: Vec::new() });
            sink.on_record(&Record { values: Vec::new() });
        }
        assert_eq!(count, 2);
    }
}
