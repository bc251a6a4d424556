//! `topica-serial` – recover fixed-width records from an unframed serial
//! byte stream and feed them into the topic registry.
//!
//! # Modules
//!
//! - [`layout`] – [`RecordLayout`]: the ordered, fixed-width fields of one
//!   record and their decoding.
//! - [`aligner`] – [`StreamAligner`]: the two-state (unaligned → aligned)
//!   synchroniser that locates the alignment marker and slices records.
//! - [`link`] – [`SerialLink`]: the single reader task that owns an aligner
//!   for one physical link and acknowledges alignment to the hardware.
//! - [`sink`] – [`RecordSink`] and [`RegistrySink`], the downstream side.

pub mod aligner;
pub mod layout;
pub mod link;
pub mod sink;

use thiserror::Error;

pub use aligner::{AlignState, DEFAULT_BUFFER_CAP, FeedOutcome, LIDAR_MARKER, StreamAligner};
pub use layout::{FieldSpec, LidarSample, Record, RecordLayout};
pub use link::{FINISHED_ALIGNMENT, LinkStats, ResetHandle, START_ALIGNMENT, SerialLink};
pub use sink::{RecordSink, RegistrySink};

/// Configuration mistakes in a record layout or alignment marker.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    #[error("record layout has no fields")]
    NoFields,

    #[error("field {name} has variable-width type {ty}")]
    VariableWidth {
        name: String,
        ty: topica_types::TopicType,
    },

    #[error("alignment marker is empty")]
    EmptyMarker,

    #[error("record does not match the {expected} layout ({fields} fields)")]
    FieldMismatch { expected: &'static str, fields: usize },
}
