//! Fixed-width record layouts.

use topica_types::{TopicType, TopicValue, ValueError};

use crate::LayoutError;

/// One named field of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub ty: TopicType,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, ty: TopicType) -> Self {
        Self { name: name.into(), ty }
    }
}

/// Ordered fields, read positionally. The record width is the sum of the
/// field widths, so every field must have a fixed-width type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordLayout {
    fields: Vec<FieldSpec>,
    width: usize,
}

impl RecordLayout {
    pub fn new(fields: Vec<FieldSpec>) -> Result<Self, LayoutError> {
        if fields.is_empty() {
            return Err(LayoutError::NoFields);
        }
        let mut width = 0;
        for field in &fields {
            match field.ty.fixed_width() {
                Some(w) => width += w,
                None => {
                    return Err(LayoutError::VariableWidth {
                        name: field.name.clone(),
                        ty: field.ty,
                    });
                }
            }
        }
        Ok(Self { fields, width })
    }

    /// LiDAR hub layout: big-endian `f32` distance then `f32` rotation.
    pub fn lidar() -> Self {
        Self {
            fields: vec![
                FieldSpec::new("distance", TopicType::Float32),
                FieldSpec::new("rotation", TopicType::Float32),
            ],
            width: 8,
        }
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Decode exactly one record-width chunk.
    pub fn decode(&self, chunk: &[u8]) -> Result<Record, ValueError> {
        let mut offset = 0;
        let mut values = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            let w = field.ty.fixed_width().unwrap_or(0);
            let end = (offset + w).min(chunk.len());
            values.push(TopicValue::decode(field.ty, &chunk[offset.min(end)..end])?);
            offset += w;
        }
        Ok(Record { values })
    }
}

/// One decoded record; values are in layout order.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub values: Vec<TopicValue>,
}

/// Typed view of a [`RecordLayout::lidar`] record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LidarSample {
    /// Centimetres to the nearest obstacle.
    pub distance: f32,
    /// Degrees.
    pub rotation: f32,
}

impl TryFrom<&Record> for LidarSample {
    type Error = LayoutError;

    fn try_from(record: &Record) -> Result<Self, Self::Error> {
        match record.values.as_slice() {
            [TopicValue::Float32(distance), TopicValue::Float32(rotation)] => Ok(Self {
                distance: *distance,
                rotation: *rotation,
            }),
            values => Err(LayoutError::FieldMismatch {
                expected: "lidar",
                fields: values.len(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lidar_layout_is_two_floats() {
        let layout = RecordLayout::lidar();
        assert_eq!(layout.width(), 8);
        let same = RecordLayout::new(vec![
            FieldSpec::new("distance", TopicType::Float32),
            FieldSpec::new("rotation", TopicType::Float32),
        ])
        .unwrap();
        assert_eq!(layout, same);
    }

    #[test]
    fn width_sums_field_widths() {
        let layout = RecordLayout::new(vec![
            FieldSpec::new("left", TopicType::Int16),
            FieldSpec::new("right", TopicType::Int16),
            FieldSpec::new("stamp", TopicType::Int64),
            FieldSpec::new("bumper", TopicType::Boolean),
        ])
        .unwrap();
        assert_eq!(layout.width(), 13);
    }

    #[test]
    fn variable_width_field_is_rejected() {
        let err = RecordLayout::new(vec![FieldSpec::new("name", TopicType::String)]).unwrap_err();
        assert!(matches!(err, LayoutError::VariableWidth { .. }));
        assert_eq!(RecordLayout::new(Vec::new()).unwrap_err(), LayoutError::NoFields);
    }

    #[test]
    fn decode_reads_fields_positionally() {
        let mut chunk = 12.5f32.to_be_bytes().to_vec();
        chunk.extend_from_slice(&270.0f32.to_be_bytes());
        let record = RecordLayout::lidar().decode(&chunk).unwrap();
        let sample = LidarSample::try_from(&record).unwrap();
        assert_eq!(sample, LidarSample { distance: 12.5, rotation: 270.0 });
    }

    #[test]
    fn non_lidar_record_is_a_field_mismatch() {
        let record = Record {
            values: vec![TopicValue::Int16(3), TopicValue::Float32(1.0)],
        };
        assert_eq!(
            LidarSample::try_from(&record),
            Err(LayoutError::FieldMismatch { expected: "lidar", fields: 2 })
        );
        let short = Record {
            values: vec![TopicValue::Float32(1.0)],
        };
        let err = LidarSample::try_from(&short).unwrap_err();
        assert_eq!(err.to_string(), "record does not match the lidar layout (1 fields)");
    }

    #[test]
    fn short_chunk_is_an_error() {
        assert!(RecordLayout::lidar().decode(&[0; 5]).is_err());
    }
}
