//! Label set codecs.
//!
//! A label set is a header (namespace + version) followed by a stream of
//! [`LabelRecord`]s. Ingestion only depends on the [`LabelSetSource`]
//! trait, so another wire format can be plugged in next to the binary
//! rainbow format in [`rainbow`].

pub mod rainbow;

use crate::error::CodecError;
use crate::labelhash::LabelHash;

pub use rainbow::{RainbowReader, RainbowWriter};

/// Identity of a label set: which corpus it belongs to and its position in
/// that corpus's sequence of updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSetHeader {
    pub namespace: String,
    pub label_set_version: u32,
}

impl LabelSetHeader {
    pub fn new(namespace: impl Into<String>, label_set_version: u32) -> Self {
        Self {
            namespace: namespace.into(),
            label_set_version,
        }
    }
}

/// A labelhash and the label it was computed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelRecord {
    pub hash: LabelHash,
    pub label: String,
}

impl LabelRecord {
    pub fn new(hash: LabelHash, label: impl Into<String>) -> Self {
        Self {
            hash,
            label: label.into(),
        }
    }

    /// Build a record whose hash is computed from `label`.
    pub fn from_label(label: impl Into<String>) -> Self {
        let label = label.into();
        Self {
            hash: LabelHash::of(&label),
            label,
        }
    }

    pub fn is_consistent(&self) -> bool {
        LabelHash::of(&self.label) == self.hash
    }
}

/// Streaming reader side of a label set codec.
pub trait LabelSetSource {
    fn header(&self) -> &LabelSetHeader;

    /// Next record, or `None` at a clean end of stream.
    fn next_record(&mut self) -> Result<Option<LabelRecord>, CodecError>;
}

/// Streaming writer side of a label set codec.
pub trait LabelSetSink {
    fn write_record(&mut self, record: &LabelRecord) -> Result<(), CodecError>;

    /// Flush buffered output. Must be called once all records are written.
    fn finish(&mut self) -> Result<(), CodecError>;
}
