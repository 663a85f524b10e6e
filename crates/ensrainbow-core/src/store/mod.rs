//! `LabelDb`: the persistent labelhash → label store.
//!
//! A store is a directory holding a single redb database file with one
//! byte-keyed table. Label records live under their 32-byte labelhash;
//! bookkeeping lives under the 4-byte reserved keys in [`keys`].
//!
//! A `LabelDb` holds redb's exclusive lock on the database file for its
//! lifetime. Opening the same store again while it is held fails with
//! [`StoreError::Locked`]. Dropping the handle, or calling
//! [`LabelDb::close`], releases the lock.

mod batch;
pub mod keys;

use std::path::{Path, PathBuf};

use redb::{Database, DatabaseError, ReadableTable, StorageError, TableDefinition};

use crate::codec::LabelSetHeader;
use crate::error::StoreError;
use crate::labelhash::LabelHash;

pub use batch::{CommitStats, WriteBatch};
pub use keys::ReservedKey;

/// On-disk layout version. Bump whenever key or value encodings change.
pub const SCHEMA_VERSION: u32 = 3;

/// Name of the database file inside a store directory.
pub const DB_FILE_NAME: &str = "labels.redb";

const LABELS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("labels");

/// Value stored under `IngestionUnfinished`. Only presence is meaningful.
const FLAG_SET: &[u8] = b"1";

pub struct LabelDb {
    db: Database,
    dir: PathBuf,
}

impl LabelDb {
    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Create a new, empty store in `dir` and stamp the current schema
    /// version. Fails if `dir` exists and is not an empty directory.
    pub fn create(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref();
        if dir.exists() && (!dir.is_dir() || std::fs::read_dir(dir)?.next().is_some()) {
            return Err(StoreError::AlreadyExists(dir.to_path_buf()));
        }
        std::fs::create_dir_all(dir)?;

        let db = Database::create(dir.join(DB_FILE_NAME)).map_err(|e| open_error(dir, e))?;
        let store = Self {
            db,
            dir: dir.to_path_buf(),
        };

        let mut batch = store.batch();
        batch.put(
            keys::SCHEMA_VERSION.as_bytes(),
            &keys::encode_uint(SCHEMA_VERSION.into()),
        );
        batch.commit()?;

        tracing::info!(path = %dir.display(), schema_version = SCHEMA_VERSION, "created label store");
        Ok(store)
    }

    /// Open an existing store. Fails if there is none, if another handle
    /// holds the lock, or if its schema version is not [`SCHEMA_VERSION`].
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref();
        let file = dir.join(DB_FILE_NAME);
        if !file.is_file() {
            return Err(StoreError::NotFound(dir.to_path_buf()));
        }

        let db = Database::open(&file).map_err(|e| open_error(dir, e))?;
        let store = Self {
            db,
            dir: dir.to_path_buf(),
        };

        let actual = store.schema_version()?.ok_or_else(|| StoreError::Corrupt {
            key: keys::SCHEMA_VERSION.name,
            reason: "missing".to_string(),
        })?;
        if actual != SCHEMA_VERSION {
            return Err(StoreError::SchemaMismatch {
                expected: SCHEMA_VERSION,
                actual,
            });
        }

        tracing::debug!(path = %dir.display(), "opened label store");
        Ok(store)
    }

    /// Open the store in `dir`, creating it if the directory holds no
    /// database yet.
    pub fn open_or_create(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref();
        if dir.join(DB_FILE_NAME).is_file() {
            Self::open(dir)
        } else {
            Self::create(dir)
        }
    }

    /// Release the store and its file lock.
    pub fn close(self) {
        tracing::debug!(path = %self.dir.display(), "closed label store");
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    // ========================================================================
    // Raw key/value access
    // ========================================================================

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let txn = self.db.begin_read().backend()?;
        let table = txn.open_table(LABELS).backend()?;
        let value = table.get(key).backend()?.map(|guard| guard.value().to_vec());
        Ok(value)
    }

    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let mut batch = self.batch();
        batch.put(key, value);
        batch.commit().map(|_| ())
    }

    pub fn delete(&self, key: &[u8]) -> Result<(), StoreError> {
        let mut batch = self.batch();
        batch.delete(key);
        batch.commit().map(|_| ())
    }

    /// Start an atomic multi-key write.
    pub fn batch(&self) -> WriteBatch<'_> {
        WriteBatch::new(self)
    }

    /// Visit every key/value pair, reserved keys included, in key order.
    /// All visits observe one consistent snapshot.
    pub fn scan<F>(&self, mut visit: F) -> Result<(), StoreError>
    where
        F: FnMut(&[u8], &[u8]),
    {
        let txn = self.db.begin_read().backend()?;
        let table = txn.open_table(LABELS).backend()?;
        for entry in table.iter().backend()? {
            let (key, value) = entry.backend()?;
            visit(key.value(), value.value());
        }
        Ok(())
    }

    // ========================================================================
    // Labels
    // ========================================================================

    pub fn get_label(&self, hash: &LabelHash) -> Result<Option<String>, StoreError> {
        self.get(hash.as_bytes())?
            .map(|raw| {
                String::from_utf8(raw).map_err(|_| StoreError::Corrupt {
                    key: "label",
                    reason: format!("label stored under {hash} is not valid UTF-8"),
                })
            })
            .transpose()
    }

    // ========================================================================
    // Reserved keys
    // ========================================================================

    pub fn schema_version(&self) -> Result<Option<u32>, StoreError> {
        self.get_u32(keys::SCHEMA_VERSION)
    }

    /// Precalculated number of label records. `None` until the first
    /// ingestion completes.
    pub fn record_count(&self) -> Result<Option<u64>, StoreError> {
        self.get(keys::RECORD_COUNT.as_bytes())?
            .map(|raw| keys::decode_uint(keys::RECORD_COUNT, &raw))
            .transpose()
    }

    pub fn set_record_count(&self, count: u64) -> Result<(), StoreError> {
        self.put(keys::RECORD_COUNT.as_bytes(), &keys::encode_uint(count))
    }

    pub fn is_ingestion_unfinished(&self) -> Result<bool, StoreError> {
        Ok(self.get(keys::INGESTION_UNFINISHED.as_bytes())?.is_some())
    }

    pub fn mark_ingestion_unfinished(&self) -> Result<(), StoreError> {
        self.put(keys::INGESTION_UNFINISHED.as_bytes(), FLAG_SET)
    }

    pub fn clear_ingestion_unfinished(&self) -> Result<(), StoreError> {
        self.delete(keys::INGESTION_UNFINISHED.as_bytes())
    }

    pub fn namespace(&self) -> Result<Option<String>, StoreError> {
        self.get(keys::NAMESPACE.as_bytes())?
            .map(|raw| keys::decode_string(keys::NAMESPACE, &raw))
            .transpose()
    }

    pub fn highest_label_set_version(&self) -> Result<Option<u32>, StoreError> {
        self.get_u32(keys::HIGHEST_LABEL_SET_VERSION)
    }

    /// The pinned namespace together with the highest applied label set
    /// version, or `None` on a store that has never completed an ingestion.
    /// Having only one of the two keys set is corruption.
    pub fn applied_label_set(&self) -> Result<Option<LabelSetHeader>, StoreError> {
        match (self.namespace()?, self.highest_label_set_version()?) {
            (Some(namespace), Some(label_set_version)) => Ok(Some(LabelSetHeader {
                namespace,
                label_set_version,
            })),
            (None, None) => Ok(None),
            (Some(_), None) => Err(StoreError::Corrupt {
                key: keys::HIGHEST_LABEL_SET_VERSION.name,
                reason: "missing while a namespace is pinned".to_string(),
            }),
            (None, Some(_)) => Err(StoreError::Corrupt {
                key: keys::NAMESPACE.name,
                reason: "missing while a label set version is recorded".to_string(),
            }),
        }
    }

    fn get_u32(&self, key: ReservedKey) -> Result<Option<u32>, StoreError> {
        self.get(key.as_bytes())?
            .map(|raw| keys::decode_u32(key, &raw))
            .transpose()
    }
}

/// Recursively delete the store directory at `dir`.
pub fn purge(dir: impl AsRef<Path>) -> Result<(), StoreError> {
    let dir = dir.as_ref();
    if !dir.exists() {
        return Err(StoreError::NotFound(dir.to_path_buf()));
    }
    std::fs::remove_dir_all(dir)?;
    tracing::info!(path = %dir.display(), "purged label store");
    Ok(())
}

fn open_error(dir: &Path, err: DatabaseError) -> StoreError {
    match err {
        DatabaseError::DatabaseAlreadyOpen => StoreError::Locked(dir.to_path_buf()),
        DatabaseError::Storage(StorageError::Io(io)) => StoreError::Io(io),
        other => StoreError::Backend(other.into()),
    }
}

/// Lifts any redb error into [`StoreError::Backend`].
pub(crate) trait BackendResultExt<T> {
    fn backend(self) -> Result<T, StoreError>;
}

impl<T, E: Into<redb::Error>> BackendResultExt<T> for Result<T, E> {
    fn backend(self) -> Result<T, StoreError> {
        self.map_err(|e| StoreError::Backend(e.into()))
    }
}
