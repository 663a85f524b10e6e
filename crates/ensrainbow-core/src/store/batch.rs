use crate::codec::LabelRecord;
use crate::error::StoreError;

use super::{BackendResultExt, LabelDb, LABELS};

enum BatchOp {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

/// What a committed batch changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitStats {
    /// Puts whose key did not exist before.
    pub created: u64,
    /// Puts that replaced an existing value.
    pub overwritten: u64,
    /// Deletes that removed an existing key.
    pub deleted: u64,
}

/// Buffered writes applied in a single redb write transaction on
/// [`commit`](WriteBatch::commit). Nothing is visible to readers until
/// then, and a batch dropped without committing writes nothing.
pub struct WriteBatch<'db> {
    db: &'db LabelDb,
    ops: Vec<BatchOp>,
}

impl<'db> WriteBatch<'db> {
    pub(super) fn new(db: &'db LabelDb) -> Self {
        Self {
            db,
            ops: Vec::new(),
        }
    }

    pub fn put(&mut self, key: &[u8], value: &[u8]) {
        self.ops.push(BatchOp::Put {
            key: key.to_vec(),
            value: value.to_vec(),
        });
    }

    pub fn put_record(&mut self, record: &LabelRecord) {
        self.put(record.hash.as_bytes(), record.label.as_bytes());
    }

    pub fn delete(&mut self, key: &[u8]) {
        self.ops.push(BatchOp::Delete { key: key.to_vec() });
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Apply every buffered operation atomically, in insertion order.
    pub fn commit(self) -> Result<CommitStats, StoreError> {
        let mut stats = CommitStats::default();
        let txn = self.db.db.begin_write().backend()?;
        {
            let mut table = txn.open_table(LABELS).backend()?;
            for op in &self.ops {
                match op {
                    BatchOp::Put { key, value } => {
                        let existed = table
                            .insert(key.as_slice(), value.as_slice())
                            .backend()?
                            .is_some();
                        if existed {
                            stats.overwritten += 1;
                        } else {
                            stats.created += 1;
                        }
                    }
                    BatchOp::Delete { key } => {
                        if table.remove(key.as_slice()).backend()?.is_some() {
                            stats.deleted += 1;
                        }
                    }
                }
            }
        }
        txn.commit().backend()?;
        Ok(stats)
    }
}
