//! Read-through lookups for the HTTP API.
//!
//! Results are API-shaped: the two expected failures (unknown labelhash,
//! malformed labelhash) are first-class variants, and any store error is
//! logged here and reduced to a generic server error so backend details
//! never reach callers.

use std::sync::Arc;

use time::OffsetDateTime;

use crate::codec::LabelSetHeader;
use crate::error::StoreError;
use crate::labelhash::LabelHash;
use crate::store::{LabelDb, SCHEMA_VERSION};

const INTERNAL_ERROR: &str = "Internal server error";
const COUNT_NOT_INITIALIZED: &str =
    "Label count not initialized. Check that an ingestion has completed.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealResult {
    Success { label: String },
    NotFound,
    BadRequest(String),
    ServerError(String),
}

impl HealResult {
    /// HTTP-style status code for the error variants.
    pub fn error_code(&self) -> Option<u16> {
        match self {
            Self::Success { .. } => None,
            Self::NotFound => Some(404),
            Self::BadRequest(_) => Some(400),
            Self::ServerError(_) => Some(500),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountResult {
    Success {
        count: u64,
        timestamp: OffsetDateTime,
    },
    ServerError(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    pub schema_version: u32,
    /// Namespace and highest applied label set version, if any.
    pub label_set: Option<LabelSetHeader>,
}

/// Look up the label for `hash`.
pub fn heal(db: &LabelDb, hash: &LabelHash) -> HealResult {
    match db.get_label(hash) {
        Ok(Some(label)) => HealResult::Success { label },
        Ok(None) => HealResult::NotFound,
        Err(err) => {
            tracing::error!(%hash, error = %err, "label lookup failed");
            HealResult::ServerError(INTERNAL_ERROR.to_string())
        }
    }
}

/// Report the precalculated record count.
pub fn count(db: &LabelDb) -> CountResult {
    match db.record_count() {
        Ok(Some(count)) => CountResult::Success {
            count,
            timestamp: OffsetDateTime::now_utc(),
        },
        Ok(None) => CountResult::ServerError(COUNT_NOT_INITIALIZED.to_string()),
        Err(err) => {
            tracing::error!(error = %err, "record count lookup failed");
            CountResult::ServerError(INTERNAL_ERROR.to_string())
        }
    }
}

/// Cheap-to-clone handle shared across request handlers.
#[derive(Clone)]
pub struct LookupService {
    db: Arc<LabelDb>,
}

impl LookupService {
    pub fn new(db: Arc<LabelDb>) -> Self {
        Self { db }
    }

    /// Parse a textual labelhash and look it up.
    pub fn heal(&self, labelhash: &str) -> HealResult {
        match labelhash.parse::<LabelHash>() {
            Ok(hash) => heal(&self.db, &hash),
            Err(err) => HealResult::BadRequest(err.to_string()),
        }
    }

    pub fn heal_hash(&self, hash: &LabelHash) -> HealResult {
        heal(&self.db, hash)
    }

    pub fn count(&self) -> CountResult {
        count(&self.db)
    }

    pub fn version_info(&self) -> Result<VersionInfo, StoreError> {
        Ok(VersionInfo {
            schema_version: SCHEMA_VERSION,
            label_set: self.db.applied_label_set()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::RainbowReader;
    use crate::ingest::ingest;
    use crate::labelhash::labelhash;
    use crate::test_util::{rainbow_bytes, temp_store};

    fn service_with(labels: &[&str]) -> (tempfile::TempDir, LookupService) {
        let (tmp, db) = temp_store();
        let bytes = rainbow_bytes("subgraph", 0, labels);
        ingest(&db, &mut RainbowReader::new(bytes.as_slice()).unwrap()).unwrap();
        (tmp, LookupService::new(Arc::new(db)))
    }

    #[test]
    fn heal_count_and_not_found() {
        let (_tmp, service) = service_with(&["vitalik", "ethereum"]);

        match service.count() {
            CountResult::Success { count, .. } => assert_eq!(count, 2),
            other => panic!("unexpected count result {other:?}"),
        }
        assert_eq!(
            service.heal(&labelhash("vitalik").to_hex()),
            HealResult::Success {
                label: "vitalik".to_string()
            }
        );
        assert_eq!(
            service.heal(&labelhash("nonexistent").to_hex()),
            HealResult::NotFound
        );
        assert_eq!(service.heal(&labelhash("nonexistent").to_hex()).error_code(), Some(404));
    }

    #[test]
    fn short_hash_is_a_bad_request_naming_the_expected_length() {
        let (_tmp, service) = service_with(&["vitalik"]);
        match service.heal("0x1234567890") {
            HealResult::BadRequest(message) => {
                assert!(message.contains("66"), "{message}");
                assert!(message.contains("length"), "{message}");
            }
            other => panic!("expected bad request, got {other:?}"),
        }
    }

    #[test]
    fn heals_empty_and_nul_labels() {
        let (_tmp, service) = service_with(&["", "x\0"]);
        assert_eq!(
            service.heal_hash(&labelhash("")),
            HealResult::Success {
                label: String::new()
            }
        );
        assert_eq!(
            service.heal_hash(&labelhash("x\0")),
            HealResult::Success {
                label: "x\0".to_string()
            }
        );
        assert_eq!(service.heal_hash(&labelhash("x")), HealResult::NotFound);
    }

    #[test]
    fn count_before_any_ingestion_is_a_server_error() {
        let (_tmp, db) = temp_store();
        assert!(matches!(count(&db), CountResult::ServerError(_)));
    }

    #[test]
    fn version_info_reports_applied_label_set() {
        let (_tmp, service) = service_with(&["vitalik"]);
        let info = service.version_info().unwrap();
        assert_eq!(info.schema_version, SCHEMA_VERSION);
        assert_eq!(info.label_set, Some(LabelSetHeader::new("subgraph", 0)));
    }
}
