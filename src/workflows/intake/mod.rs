//! Bulk CSV application import for a single opening.
//!
//! A batch flows through [`parser`], [`mapping`], [`identity`] and
//! [`builder`] one row at a time; [`service::ApplicationIntakeService`] folds
//! the per-row results and writes every valid row with one upsert.

pub mod builder;
pub mod domain;
pub mod identity;
pub mod mapping;
pub mod memory;
mod normalizer;
pub mod parser;
pub mod report;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    Applicant, ApplicantId, Application, ApplicationDraft, ApplicationId, ApplicationStatus,
    CustomQuestion, NetId, NewApplicant, NewOpening, Opening, OpeningId, OpeningStatus,
    OrganizationId, QuestionId,
};
pub use identity::KnownApplicant;
pub use mapping::{CanonicalField, MappingError};
pub use memory::MemoryIntakeStore;
pub use parser::ParseError;
pub use report::{IngestOutcome, IngestReport, RowError};
pub use repository::{IntakeStore, StoreError};
pub use router::intake_router;
pub use service::{ApplicationIntakeService, IngestRequest, RowSource};

/// Batch-level rejection. Raised before any row is processed; nothing is
/// written.
#[derive(Debug, thiserror::Error)]
pub enum PreconditionError {
    #[error("opening {0} not found")]
    OpeningNotFound(OpeningId),
    #[error("opening {opening_id} does not belong to organization {organization_id}")]
    OrganizationMismatch {
        opening_id: OpeningId,
        organization_id: OrganizationId,
    },
    #[error("could not load opening {opening_id}: {source}")]
    OpeningUnavailable {
        opening_id: OpeningId,
        source: StoreError,
    },
    #[error(transparent)]
    Input(#[from] ParseError),
    #[error(transparent)]
    Mapping(#[from] MappingError),
    #[error("batch has {rows} data rows, the limit is {limit}")]
    TooManyRows { rows: usize, limit: usize },
}

/// Error raised by the intake service.
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error(transparent)]
    Rejected(#[from] PreconditionError),
    /// The final upsert failed. No application from the batch was written;
    /// row errors gathered before the write are kept for diagnostics.
    #[error("application upsert failed: {source}")]
    Store {
        source: StoreError,
        row_errors: Vec<RowError>,
    },
    #[error("could not read applications: {0}")]
    Read(#[source] StoreError),
}
