//! Read-only integrity checks over a label store.
//!
//! Both modes first require a finished ingestion and the current schema
//! version. Lite then only checks that `RecordCount` is readable. Full also
//! sweeps every key, rehashes every stored label, and compares the tally
//! against `RecordCount`.
//!
//! Nothing here repairs a store. The only remedy for a failed validation
//! is to purge the directory and re-ingest from label set 0.

use std::fmt;

use crate::error::StoreError;
use crate::labelhash::{LabelHash, LABEL_HASH_LEN};
use crate::store::{keys, LabelDb, SCHEMA_VERSION};

/// Per-record issues kept in a report; counters keep going past this.
pub const MAX_REPORTED_ISSUES: usize = 100;

const PROGRESS_LOG_INTERVAL: u64 = 1_000_000;

pub const REMEDIATION: &str =
    "purge the data directory and re-ingest all label sets starting from label set 0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    Full,
    Lite,
}

impl fmt::Display for ValidationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "full"),
            Self::Lite => write!(f, "lite"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    IngestionUnfinished,
    SchemaMismatch { expected: u32, actual: Option<u32> },
    RecordCountUnavailable { reason: String },
    InvalidHashFormat { key: Vec<u8> },
    HashMismatch { stored: LabelHash, computed: LabelHash },
    CountMismatch { stored: u64, actual: u64 },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IngestionUnfinished => write!(f, "an ingestion was started but never finished"),
            Self::SchemaMismatch { expected, actual } => match actual {
                Some(actual) => write!(f, "schema version is {actual}, expected {expected}"),
                None => write!(f, "schema version is missing or malformed, expected {expected}"),
            },
            Self::RecordCountUnavailable { reason } => {
                write!(f, "record count unavailable: {reason}")
            }
            Self::InvalidHashFormat { key } => write!(
                f,
                "key 0x{} is {} bytes, expected {LABEL_HASH_LEN}",
                hex_prefix(key),
                key.len()
            ),
            Self::HashMismatch { stored, computed } => write!(
                f,
                "label under {stored} hashes to {computed}"
            ),
            Self::CountMismatch { stored, actual } => write!(
                f,
                "stored record count {stored} does not match {actual} records found"
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub mode: ValidationMode,
    pub records_checked: u64,
    pub valid_records: u64,
    pub invalid_hash_format: u64,
    pub hash_mismatches: u64,
    pub stored_count: Option<u64>,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    fn new(mode: ValidationMode) -> Self {
        Self {
            mode,
            records_checked: 0,
            valid_records: 0,
            invalid_hash_format: 0,
            hash_mismatches: 0,
            stored_count: None,
            issues: Vec::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
            && self.invalid_hash_format == 0
            && self.hash_mismatches == 0
    }

    /// Per-record issue, dropped once the report holds
    /// [`MAX_REPORTED_ISSUES`] of them.
    fn record_issue(&mut self, issue: ValidationIssue) {
        if self.issues.len() < MAX_REPORTED_ISSUES {
            self.issues.push(issue);
        }
    }

    /// Store-level issue. Never capped.
    fn store_issue(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }
}

/// Validate and log the outcome. Returns whether the store is valid;
/// backend failures count as invalid.
pub fn validate(db: &LabelDb, mode: ValidationMode) -> bool {
    match inspect(db, mode) {
        Ok(report) => {
            log_report(db, &report);
            report.is_valid()
        }
        Err(err) => {
            tracing::error!(
                path = %db.dir().display(),
                %mode,
                error = %err,
                remediation = REMEDIATION,
                "validation could not complete"
            );
            false
        }
    }
}

/// Run the checks for `mode` and return everything found. Only store
/// access failures are errors; integrity problems land in the report.
pub fn inspect(db: &LabelDb, mode: ValidationMode) -> Result<ValidationReport, StoreError> {
    let mut report = ValidationReport::new(mode);

    if db.is_ingestion_unfinished()? {
        report.store_issue(ValidationIssue::IngestionUnfinished);
        return Ok(report);
    }

    match db.schema_version() {
        Ok(Some(SCHEMA_VERSION)) => {}
        Ok(actual) => {
            report.store_issue(ValidationIssue::SchemaMismatch {
                expected: SCHEMA_VERSION,
                actual,
            });
            return Ok(report);
        }
        Err(StoreError::Corrupt { .. }) => {
            report.store_issue(ValidationIssue::SchemaMismatch {
                expected: SCHEMA_VERSION,
                actual: None,
            });
            return Ok(report);
        }
        Err(err) => return Err(err),
    }

    match db.record_count() {
        Ok(Some(count)) => report.stored_count = Some(count),
        Ok(None) => report.store_issue(ValidationIssue::RecordCountUnavailable {
            reason: "missing; no ingestion has completed".to_string(),
        }),
        Err(StoreError::Corrupt { reason, .. }) => {
            report.store_issue(ValidationIssue::RecordCountUnavailable { reason })
        }
        Err(err) => return Err(err),
    }

    if mode == ValidationMode::Full {
        sweep(db, &mut report)?;
        if let Some(stored) = report.stored_count {
            if stored != report.records_checked {
                report.store_issue(ValidationIssue::CountMismatch {
                    stored,
                    actual: report.records_checked,
                });
            }
        }
    }

    Ok(report)
}

fn sweep(db: &LabelDb, report: &mut ValidationReport) -> Result<(), StoreError> {
    db.scan(|key, value| {
        if keys::is_reserved(key) {
            return;
        }

        report.records_checked += 1;
        if report.records_checked % PROGRESS_LOG_INTERVAL == 0 {
            tracing::info!(records_checked = report.records_checked, "validation progress");
        }

        if key.len() != LABEL_HASH_LEN {
            report.invalid_hash_format += 1;
            report.record_issue(ValidationIssue::InvalidHashFormat { key: key.to_vec() });
            return;
        }

        let computed = LabelHash::of_bytes(value);
        if computed.as_bytes().as_slice() != key {
            report.hash_mismatches += 1;
            if let Some(stored) = LabelHash::from_slice(key) {
                report.record_issue(ValidationIssue::HashMismatch { stored, computed });
            }
            return;
        }

        report.valid_records += 1;
    })
}

fn log_report(db: &LabelDb, report: &ValidationReport) {
    let path = db.dir().display();
    if report.is_valid() {
        tracing::info!(
            path = %path,
            mode = %report.mode,
            records = report.stored_count,
            "label store is valid"
        );
        return;
    }

    for issue in &report.issues {
        tracing::error!(path = %path, mode = %report.mode, "{issue}");
    }
    tracing::error!(
        path = %path,
        mode = %report.mode,
        records_checked = report.records_checked,
        valid_records = report.valid_records,
        invalid_hash_format = report.invalid_hash_format,
        hash_mismatches = report.hash_mismatches,
        stored_count = report.stored_count,
        remediation = REMEDIATION,
        "label store failed validation"
    );
}

fn hex_prefix(bytes: &[u8]) -> String {
    hex::encode(&bytes[..bytes.len().min(LABEL_HASH_LEN)])
}
