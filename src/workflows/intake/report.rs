use serde::{Deserialize, Serialize};

use super::domain::Application;

/// Per-row failure reported alongside the written records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    pub row: usize,
    pub message: String,
}

impl RowError {
    pub fn new(row: usize, message: impl Into<String>) -> Self {
        Self {
            row,
            message: message.into(),
        }
    }
}

/// Terminal state of a batch that reached the upsert stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestOutcome {
    /// At least one application was written.
    PartialOrFullSuccess,
    /// Every row failed, so nothing was sent to the store.
    NothingWritten,
}

/// Caller-facing result of an import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    #[serde(rename = "data")]
    pub records: Vec<Application>,
    pub error_count: usize,
    pub errors: Vec<RowError>,
}

impl IngestReport {
    /// Errors are ordered by row number regardless of the stage that raised them.
    pub fn new(records: Vec<Application>, mut errors: Vec<RowError>) -> Self {
        errors.sort_by_key(|error| error.row);
        Self {
            records,
            error_count: errors.len(),
            errors,
        }
    }

    pub fn outcome(&self) -> IngestOutcome {
        if self.records.is_empty() {
            IngestOutcome::NothingWritten
        } else {
            IngestOutcome::PartialOrFullSuccess
        }
    }
}
