//! Local sources

use crate::error::SourceError;
use crate::DataSource;
use async_trait::async_trait;
use row_normalizer::RawRecord;
use std::path::PathBuf;
use tracing::debug;

/// Feed stored as a JSON array of row objects, for drills and dry runs
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl DataSource for JsonFileSource {
    async fn fetch_rows(&self) -> Result<Vec<RawRecord>, SourceError> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| SourceError::Unavailable(format!("{}: {}", self.path.display(), e)))?;
        let records: Vec<RawRecord> = serde_json::from_str(&text)
            .map_err(|e| SourceError::Malformed(format!("{}: {}", self.path.display(), e)))?;
        debug!("Read {} rows from {}", records.len(), self.path.display());
        Ok(records)
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

/// Fixed in-memory feed
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    records: Vec<RawRecord>,
}

impl StaticSource {
    pub fn new(records: Vec<RawRecord>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl DataSource for StaticSource {
    async fn fetch_rows(&self) -> Result<Vec<RawRecord>, SourceError> {
        Ok(self.records.clone())
    }

    fn describe(&self) -> String {
        format!("static:{} rows", self.records.len())
    }
}
