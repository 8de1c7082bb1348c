use super::domain::{
    Applicant, ApplicantId, Application, ApplicationDraft, NetId, NewApplicant, Opening,
    OpeningId,
};

/// Storage abstraction so the intake pipeline can be exercised in isolation.
///
/// Implementations must enforce uniqueness of applicants by net id and of
/// applications by `(opening_id, applicant_id)`.
pub trait IntakeStore: Send + Sync {
    fn opening(&self, id: &OpeningId) -> Result<Option<Opening>, StoreError>;
    fn insert_opening(&self, opening: Opening) -> Result<Opening, StoreError>;
    fn applicant_by_net_id(&self, net_id: &NetId) -> Result<Option<Applicant>, StoreError>;
    /// Returns the applicants among `ids` that exist; unknown ids are skipped.
    fn applicants_by_ids(&self, ids: &[ApplicantId]) -> Result<Vec<Applicant>, StoreError>;
    /// Fails with [`StoreError::Conflict`] when the net id is already taken.
    fn create_applicant(&self, applicant: NewApplicant) -> Result<Applicant, StoreError>;
    /// Inserts or updates every draft in one atomic step keyed on
    /// `(opening_id, applicant_id)`. Either all drafts are written or none.
    fn upsert_applications(
        &self,
        drafts: Vec<ApplicationDraft>,
    ) -> Result<Vec<Application>, StoreError>;
    fn applications_for_opening(
        &self,
        opening_id: &OpeningId,
    ) -> Result<Vec<Application>, StoreError>;
}

/// Error enumeration for store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("constraint violated: {0}")]
    Constraint(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
