//! ENSRainbow core: a reverse lookup table from ENS labelhashes to labels.
//!
//! Label sets arrive as rainbow files ([`codec`]), are applied in strict
//! version order by [`ingest`] into a [`LabelDb`], checked by [`validate`]
//! and served by [`lookup`].

pub mod codec;
pub mod convert;
pub mod error;
pub mod ingest;
pub mod labelhash;
pub mod lookup;
pub mod store;
pub mod validate;

#[cfg(test)]
mod test_util;

pub use codec::{LabelRecord, LabelSetHeader, LabelSetSink, LabelSetSource};
pub use error::{CodecError, IngestError, StoreError};
pub use ingest::{ingest, IngestOptions, IngestSummary};
pub use labelhash::{labelhash, LabelHash};
pub use lookup::{CountResult, HealResult, LookupService};
pub use store::{purge, LabelDb};
pub use validate::{validate, ValidationMode, ValidationReport};
