//! Status Sheet Sources
//!
//! Fetches the raw rows of the vehicle status sheet. Every source returns the
//! `get_all_records` shape: one `RawRecord` per data row, keyed by header.

mod error;
mod file;
mod sheets;

pub use error::SourceError;
pub use file::{JsonFileSource, StaticSource};
pub use sheets::{records_from_values, ServiceAccountKey, SheetsAuth, SheetsConfig, SheetsSource};

use async_trait::async_trait;
use row_normalizer::RawRecord;

/// A feed of vehicle status rows
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Fetch every row currently in the feed
    async fn fetch_rows(&self) -> Result<Vec<RawRecord>, SourceError>;

    /// Short description for logs
    fn describe(&self) -> String;
}
