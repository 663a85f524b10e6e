//! ENS labelhash: keccak-256 over the raw label bytes.
//!
//! [`LabelHash`] is the primary key of every label record. Its textual
//! form is the `0x`-prefixed, lowercase, 64-digit hex string used by the
//! HTTP API; parsing also accepts the bracketed encoded-labelhash form
//! (`[<64 hex digits>]`) that appears in ENS names with unknown labels.

use std::fmt;
use std::str::FromStr;

use tiny_keccak::{Hasher, Keccak};

/// Length of a labelhash in bytes.
pub const LABEL_HASH_LEN: usize = 32;

/// Length of the canonical textual form, including the `0x` prefix.
pub const LABEL_HASH_HEX_LEN: usize = 2 + LABEL_HASH_LEN * 2;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LabelHash([u8; LABEL_HASH_LEN]);

impl LabelHash {
    pub const fn from_bytes(bytes: [u8; LABEL_HASH_LEN]) -> Self {
        Self(bytes)
    }

    /// Interpret a raw store key as a labelhash. Returns `None` unless the
    /// slice is exactly 32 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; LABEL_HASH_LEN]>::try_from(bytes).ok().map(Self)
    }

    /// Hash a label.
    pub fn of(label: &str) -> Self {
        Self::of_bytes(label.as_bytes())
    }

    /// Hash raw label bytes. Used by the validator, which checks stored
    /// values without assuming they are valid UTF-8.
    pub fn of_bytes(label: &[u8]) -> Self {
        let mut hasher = Keccak::v256();
        hasher.update(label);

        let mut out = [0u8; LABEL_HASH_LEN];
        hasher.finalize(&mut out);
        Self(out)
    }

    pub fn as_bytes(&self) -> &[u8; LABEL_HASH_LEN] {
        &self.0
    }

    /// `0x`-prefixed lowercase hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

/// Compute the labelhash of `label`.
pub fn labelhash(label: &str) -> LabelHash {
    LabelHash::of(label)
}

impl fmt::Display for LabelHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for LabelHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LabelHash({})", self.to_hex())
    }
}

impl AsRef<[u8]> for LabelHash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LabelHashParseError {
    #[error(
        "Invalid labelHash length: expected 66 hex characters including 0x prefix, got {actual}"
    )]
    InvalidLength { actual: usize },

    #[error("Invalid labelHash: {0} is not a hex string")]
    InvalidHex(String),
}

impl FromStr for LabelHash {
    type Err = LabelHashParseError;

    /// Accepts `0x<64 hex>`, `<64 hex>` and `[<64 hex>]`, in any case.
    /// Length errors report the length of the input as given.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = if let Some(inner) = s.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
            inner
        } else if let Some(rest) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            rest
        } else {
            s
        };

        if digits.len() != LABEL_HASH_LEN * 2 {
            return Err(LabelHashParseError::InvalidLength { actual: s.len() });
        }

        let mut out = [0u8; LABEL_HASH_LEN];
        hex::decode_to_slice(digits, &mut out)
            .map_err(|_| LabelHashParseError::InvalidHex(s.to_string()))?;
        Ok(Self(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VITALIK: &str = "0xaf2caa1c2ca1d027f1ac823b529d0a67cd144264b2789fa2ea4d63a67c7103cc";
    const ETH: &str = "0x4f5b812789fc606be1b3b16908db13fc7a9adf7ca72641f84d75b47069d3d7f0";

    #[test]
    fn known_labelhashes() {
        assert_eq!(labelhash("vitalik").to_hex(), VITALIK);
        assert_eq!(labelhash("eth").to_hex(), ETH);
    }

    #[test]
    fn empty_label_hashes_to_keccak_of_nothing() {
        assert_eq!(
            labelhash("").to_hex(),
            "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn embedded_nul_changes_the_hash() {
        assert_ne!(labelhash("x"), labelhash("x\0"));
    }

    #[test]
    fn parse_accepts_prefixed_bare_and_bracketed_forms() {
        let expected = labelhash("vitalik");
        assert_eq!(VITALIK.parse::<LabelHash>(), Ok(expected));
        assert_eq!(VITALIK[2..].parse::<LabelHash>(), Ok(expected));
        assert_eq!(
            format!("[{}]", &VITALIK[2..]).parse::<LabelHash>(),
            Ok(expected)
        );
        assert_eq!(VITALIK.to_uppercase().parse::<LabelHash>(), Ok(expected));
    }

    #[test]
    fn parse_rejects_wrong_length_with_expected_length_in_message() {
        let err = "0x1234567890".parse::<LabelHash>().unwrap_err();
        assert_eq!(err, LabelHashParseError::InvalidLength { actual: 12 });
        assert!(err.to_string().contains("66"));
    }

    #[test]
    fn parse_rejects_non_hex_digits() {
        let bad = format!("0x{}", "zz".repeat(32));
        assert!(matches!(
            bad.parse::<LabelHash>(),
            Err(LabelHashParseError::InvalidHex(_))
        ));
    }

    #[test]
    fn from_slice_requires_exactly_32_bytes() {
        assert!(LabelHash::from_slice(&[0u8; 31]).is_none());
        assert!(LabelHash::from_slice(&[0u8; 4]).is_none());
        assert!(LabelHash::from_slice(&[7u8; 32]).is_some());
    }
}
