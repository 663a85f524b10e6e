//! Shared test helpers for `ensrainbow-core` unit tests.

use tempfile::TempDir;

use crate::codec::{LabelRecord, LabelSetHeader, LabelSetSink, RainbowWriter};
use crate::store::LabelDb;

/// A fresh store in its own temporary directory. Keep the `TempDir` alive
/// for as long as the store is used.
pub fn temp_store() -> (TempDir, LabelDb) {
    let tmp = tempfile::tempdir().expect("create temp dir");
    let db = LabelDb::create(tmp.path().join("db")).expect("create label store");
    (tmp, db)
}

/// Encode a rainbow file whose records are computed from `labels`.
pub fn rainbow_bytes(namespace: &str, version: u32, labels: &[&str]) -> Vec<u8> {
    let records: Vec<_> = labels
        .iter()
        .map(|label| LabelRecord::from_label(*label))
        .collect();
    rainbow_bytes_from_records(namespace, version, &records)
}

pub fn rainbow_bytes_from_records(
    namespace: &str,
    version: u32,
    records: &[LabelRecord],
) -> Vec<u8> {
    let header = LabelSetHeader::new(namespace, version);
    let mut writer = RainbowWriter::new(Vec::new(), &header).expect("write header");
    for record in records {
        writer.write_record(record).expect("write record");
    }
    writer.finish().expect("flush");
    writer.into_inner()
}
