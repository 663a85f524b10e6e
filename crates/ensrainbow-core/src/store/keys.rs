//! Reserved keys and their value encodings.
//!
//! Reserved keys are 4 bytes long, so they can never collide with a
//! 32-byte labelhash key. Integers are stored as ASCII decimal and parsed
//! strictly: anything other than a non-empty run of digits is corruption.

use crate::error::StoreError;

/// A sentinel key holding one scalar value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservedKey {
    pub name: &'static str,
    pub bytes: [u8; 4],
}

impl ReservedKey {
    pub const fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

pub const RECORD_COUNT: ReservedKey = ReservedKey {
    name: "RecordCount",
    bytes: [0xff, 0xff, 0xff, 0xff],
};

pub const INGESTION_UNFINISHED: ReservedKey = ReservedKey {
    name: "IngestionUnfinished",
    bytes: [0xff, 0xff, 0xff, 0xfe],
};

pub const SCHEMA_VERSION: ReservedKey = ReservedKey {
    name: "SchemaVersion",
    bytes: [0xff, 0xff, 0xff, 0xfd],
};

pub const NAMESPACE: ReservedKey = ReservedKey {
    name: "Namespace",
    bytes: [0xff, 0xff, 0xff, 0xfc],
};

pub const HIGHEST_LABEL_SET_VERSION: ReservedKey = ReservedKey {
    name: "HighestLabelSetVersion",
    bytes: [0xff, 0xff, 0xff, 0xfb],
};

pub const ALL: [ReservedKey; 5] = [
    RECORD_COUNT,
    INGESTION_UNFINISHED,
    SCHEMA_VERSION,
    NAMESPACE,
    HIGHEST_LABEL_SET_VERSION,
];

pub fn is_reserved(key: &[u8]) -> bool {
    ALL.iter().any(|reserved| reserved.bytes == key)
}

pub(crate) fn encode_uint(value: u64) -> Vec<u8> {
    value.to_string().into_bytes()
}

pub(crate) fn decode_uint(key: ReservedKey, raw: &[u8]) -> Result<u64, StoreError> {
    let corrupt = |reason: String| StoreError::Corrupt {
        key: key.name,
        reason,
    };

    if raw.is_empty() {
        return Err(corrupt("empty value".to_string()));
    }
    if let Some(bad) = raw.iter().find(|b| !b.is_ascii_digit()) {
        return Err(corrupt(format!(
            "expected a non-negative decimal integer, found byte 0x{bad:02x} in {:?}",
            String::from_utf8_lossy(raw)
        )));
    }

    // Digits-only input is valid UTF-8; the parse can still overflow.
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| corrupt(format!("integer out of range: {}", String::from_utf8_lossy(raw))))
}

pub(crate) fn decode_u32(key: ReservedKey, raw: &[u8]) -> Result<u32, StoreError> {
    let value = decode_uint(key, raw)?;
    u32::try_from(value).map_err(|_| StoreError::Corrupt {
        key: key.name,
        reason: format!("{value} does not fit in 32 bits"),
    })
}

pub(crate) fn decode_string(key: ReservedKey, raw: &[u8]) -> Result<String, StoreError> {
    String::from_utf8(raw.to_vec()).map_err(|_| StoreError::Corrupt {
        key: key.name,
        reason: "value is not valid UTF-8".to_string(),
    })
}
