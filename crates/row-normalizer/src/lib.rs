//! Row Normalization
//!
//! Converts loosely-typed status sheet rows into validated `StatusSnapshot`s.

mod error;
mod normalizer;
mod snapshot;

pub use error::RowError;
pub use normalizer::{ColumnMapping, NormalizerConfig, RowNormalizer, DEFAULT_HAZARD_KEYWORD};
pub use snapshot::{EntityId, RawRecord, Resolution, StatusSnapshot};
