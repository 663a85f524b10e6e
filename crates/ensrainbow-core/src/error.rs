use std::path::PathBuf;

use crate::labelhash::LabelHash;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("label store directory already exists and is not empty: {0}")]
    AlreadyExists(PathBuf),

    #[error("no label store found at {0}")]
    NotFound(PathBuf),

    #[error("label store at {0} is locked by another process")]
    Locked(PathBuf),

    #[error("schema version mismatch: expected {expected}, found {actual}")]
    SchemaMismatch { expected: u32, actual: u32 },

    #[error("corrupt value for reserved key {key}: {reason}")]
    Corrupt { key: &'static str, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Backend(#[from] redb::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("unexpected end of file while reading {0}")]
    UnexpectedEof(&'static str),

    #[error("not a rainbow file (bad magic)")]
    BadMagic,

    #[error("unsupported rainbow file format version {0}")]
    UnsupportedFormatVersion(u32),

    #[error("namespace must not be empty")]
    EmptyNamespace,

    #[error("{field} of {len} bytes exceeds the {max} byte limit")]
    TooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("{0} is not valid UTF-8")]
    InvalidUtf8(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("namespace mismatch: store holds `{expected}`, file declares `{actual}`")]
    NamespaceMismatch { expected: String, actual: String },

    #[error(
        "label set out of order: highest applied is {}, file is {file_version}",
        display_highest(.current_highest)
    )]
    LabelSetOutOfOrder {
        current_highest: Option<u32>,
        file_version: u32,
    },

    #[error("schema version mismatch: expected {expected}, found {actual}")]
    SchemaMismatch { expected: u32, actual: u32 },

    #[error("a previous ingestion did not finish; purge the store and re-ingest from label set 0")]
    UnfinishedIngestion,

    #[error("record label does not hash to its labelhash {hash}")]
    HashMismatch { hash: LabelHash },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for IngestError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::SchemaMismatch { expected, actual } => {
                Self::SchemaMismatch { expected, actual }
            }
            StoreError::Io(io) => Self::Io(io),
            other => Self::Store(other),
        }
    }
}

fn display_highest(highest: &Option<u32>) -> String {
    match highest {
        Some(version) => version.to_string(),
        None => "none (empty store)".to_string(),
    }
}
