//! Label set ingestion.
//!
//! Label sets are applied in strict order: the first one into an empty
//! store must be version 0 and pins the store's namespace, and every later
//! one must carry the same namespace and exactly the next version. All of
//! that is checked before anything is written.
//!
//! Once the checks pass, `IngestionUnfinished` is set, records are written
//! in bounded batches, and the bookkeeping keys are updated. The flag is
//! cleared last, so a store whose ingestion died partway stays flagged
//! until it is purged and rebuilt from label set 0.
//!
//! Ingestion is single-writer. The version check reads persisted state and
//! later writes it back; only the store's exclusive file lock keeps two
//! ingesters from interleaving.

use crate::codec::{LabelSetHeader, LabelSetSource};
use crate::error::{IngestError, StoreError};
use crate::store::{keys, LabelDb, SCHEMA_VERSION};

pub const DEFAULT_BATCH_SIZE: usize = 10_000;

const PROGRESS_LOG_INTERVAL: u64 = 1_000_000;

#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Records buffered per committed write transaction.
    pub batch_size: usize,
    /// Reject records whose label does not hash to their key.
    pub verify_hashes: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            verify_hashes: true,
        }
    }
}

impl IngestOptions {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestSummary {
    pub label_set: LabelSetHeader,
    /// Records decoded from the source.
    pub records_read: u64,
    /// Records whose labelhash was not already in the store.
    pub records_added: u64,
    /// `RecordCount` after the ingestion.
    pub total_records: u64,
}

/// Apply one label set with default options.
pub fn ingest<S: LabelSetSource>(
    db: &LabelDb,
    source: &mut S,
) -> Result<IngestSummary, IngestError> {
    ingest_with(db, source, &IngestOptions::default())
}

pub fn ingest_with<S: LabelSetSource>(
    db: &LabelDb,
    source: &mut S,
    options: &IngestOptions,
) -> Result<IngestSummary, IngestError> {
    let label_set = source.header().clone();
    let first_label_set = check_label_set_order(db, &label_set)?;
    let prior_count = db.record_count()?.unwrap_or(0);

    db.mark_ingestion_unfinished()?;
    tracing::info!(
        namespace = %label_set.namespace,
        label_set_version = label_set.label_set_version,
        prior_count,
        "starting ingestion"
    );

    let batch_size = options.batch_size.max(1);
    let mut records_read = 0u64;
    let mut records_added = 0u64;
    let mut batch = db.batch();

    while let Some(record) = source.next_record()? {
        if options.verify_hashes && !record.is_consistent() {
            return Err(IngestError::HashMismatch { hash: record.hash });
        }

        batch.put_record(&record);
        records_read += 1;

        if batch.len() >= batch_size {
            records_added += batch.commit()?.created;
            batch = db.batch();
        }
        if records_read % PROGRESS_LOG_INTERVAL == 0 {
            tracing::info!(records_read, records_added, "ingestion progress");
        }
    }
    records_added += batch.commit()?.created;

    let total_records = prior_count + records_added;
    let mut bookkeeping = db.batch();
    bookkeeping.put(
        keys::RECORD_COUNT.as_bytes(),
        &keys::encode_uint(total_records),
    );
    bookkeeping.put(
        keys::HIGHEST_LABEL_SET_VERSION.as_bytes(),
        &keys::encode_uint(label_set.label_set_version.into()),
    );
    if first_label_set {
        bookkeeping.put(keys::NAMESPACE.as_bytes(), label_set.namespace.as_bytes());
    }
    bookkeeping.commit()?;

    db.clear_ingestion_unfinished()?;

    tracing::info!(
        namespace = %label_set.namespace,
        label_set_version = label_set.label_set_version,
        records_read,
        records_added,
        total_records,
        "ingestion complete"
    );

    Ok(IngestSummary {
        label_set,
        records_read,
        records_added,
        total_records,
    })
}

/// Check that `incoming` may be applied next. Returns `true` when it is the
/// store's first label set.
fn check_label_set_order(db: &LabelDb, incoming: &LabelSetHeader) -> Result<bool, IngestError> {
    match db.schema_version()? {
        Some(SCHEMA_VERSION) => {}
        Some(actual) => {
            return Err(IngestError::SchemaMismatch {
                expected: SCHEMA_VERSION,
                actual,
            })
        }
        None => {
            return Err(StoreError::Corrupt {
                key: keys::SCHEMA_VERSION.name,
                reason: "missing".to_string(),
            }
            .into())
        }
    }

    if db.is_ingestion_unfinished()? {
        return Err(IngestError::UnfinishedIngestion);
    }

    let Some(applied) = db.applied_label_set()? else {
        if incoming.label_set_version != 0 {
            return Err(IngestError::LabelSetOutOfOrder {
                current_highest: None,
                file_version: incoming.label_set_version,
            });
        }
        return Ok(true);
    };

    if applied.namespace != incoming.namespace {
        return Err(IngestError::NamespaceMismatch {
            expected: applied.namespace,
            actual: incoming.namespace.clone(),
        });
    }

    if applied.label_set_version.checked_add(1) != Some(incoming.label_set_version) {
        return Err(IngestError::LabelSetOutOfOrder {
            current_highest: Some(applied.label_set_version),
            file_version: incoming.label_set_version,
        });
    }

    Ok(false)
}
