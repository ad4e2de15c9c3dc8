//! Row Error Types

use thiserror::Error;

/// Reasons a row cannot become a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowError {
    /// Entity identifier column absent or blank
    #[error("Row {row}: missing or blank entity identifier in column '{column}'")]
    MissingEntity { row: usize, column: String },

    /// Identifier already seen earlier in the same feed
    #[error("Row {row}: duplicate entity identifier '{entity}' (first seen at row {first_row})")]
    DuplicateEntity {
        row: usize,
        entity: String,
        first_row: usize,
    },
}

impl RowError {
    /// Zero-based index of the offending row in the feed
    pub fn row(&self) -> usize {
        match self {
            RowError::MissingEntity { row, .. } => *row,
            RowError::DuplicateEntity { row, .. } => *row,
        }
    }
}
