use std::collections::BTreeMap;
use std::sync::Arc;

use axum::response::Response;
use serde_json::Value;

use crate::config::IntakeConfig;
use crate::workflows::intake::domain::{
    Applicant, ApplicantId, Application, ApplicationDraft, CustomQuestion, NetId, NewApplicant, Opening,
    OpeningId, OpeningStatus, OrganizationId, QuestionId,
};
use crate::workflows::intake::memory::MemoryIntakeStore;
use crate::workflows::intake::repository::{IntakeStore, StoreError};
use crate::workflows::intake::service::{ApplicationIntakeService, IngestRequest, RowSource};

pub(super) const ORG: &str = "org-robotics";
pub(super) const OPENING: &str = "opening-fall-recruit";

pub(super) fn opening() -> Opening {
    Opening {
        id: OpeningId(OPENING.to_string()),
        organization_id: OrganizationId(ORG.to_string()),
        title: "Fall build team".to_string(),
        status: OpeningStatus::Open,
    }
}

pub(super) fn questions() -> Vec<CustomQuestion> {
    vec![
        CustomQuestion {
            id: QuestionId("q-motivation".to_string()),
            prompt: "Why do you want to join?".to_string(),
        },
        CustomQuestion {
            id: QuestionId("q-hours".to_string()),
            prompt: "How many hours per week can you commit?".to_string(),
        },
    ]
}

pub(super) fn mappings() -> BTreeMap<String, String> {
    [
        ("NetID", "net_id"),
        ("Full Name", "name"),
        ("Status", "status"),
        ("Notes", "notes"),
        ("Why join?", "q-motivation"),
        ("Hours", "q-hours"),
    ]
    .iter()
    .map(|(header, target)| (header.to_string(), target.to_string()))
    .collect()
}

pub(super) fn request(csv: &str) -> IngestRequest {
    IngestRequest {
        organization_id: OrganizationId(ORG.to_string()),
        opening_id: OpeningId(OPENING.to_string()),
        rows: RowSource::Text(csv.to_string()),
        column_mappings: mappings(),
        custom_questions: questions(),
        existing_applicants: BTreeMap::new(),
    }
}

pub(super) fn build_service() -> (
    ApplicationIntakeService<MemoryIntakeStore>,
    Arc<MemoryIntakeStore>,
) {
    let store = Arc::new(MemoryIntakeStore::with_openings([opening()]));
    let service = ApplicationIntakeService::new(store.clone(), IntakeConfig::default());
    (service, store)
}

pub(super) fn applicant_named(store: &MemoryIntakeStore, net_id: &str) -> Applicant {
    store
        .applicant_by_net_id(&NetId::parse(net_id).expect("net id"))
        .expect("lookup succeeds")
        .expect("applicant present")
}

/// Delegates to an in-memory store but fails every upsert.
pub(super) struct FailingUpsertStore {
    pub(super) inner: MemoryIntakeStore,
}

impl FailingUpsertStore {
    pub(super) fn new() -> Self {
        Self {
            inner: MemoryIntakeStore::with_openings([opening()]),
        }
    }
}

impl IntakeStore for FailingUpsertStore {
    fn opening(&self, id: &OpeningId) -> Result<Option<Opening>, StoreError> {
        self.inner.opening(id)
    }

    fn insert_opening(&self, opening: Opening) -> Result<Opening, StoreError> {
        self.inner.insert_opening(opening)
    }

    fn applicant_by_net_id(&self, net_id: &NetId) -> Result<Option<Applicant>, StoreError> {
        self.inner.applicant_by_net_id(net_id)
    }

    fn applicants_by_ids(&self, ids: &[ApplicantId]) -> Result<Vec<Applicant>, StoreError> {
        self.inner.applicants_by_ids(ids)
    }

    fn create_applicant(&self, applicant: NewApplicant) -> Result<Applicant, StoreError> {
        self.inner.create_applicant(applicant)
    }

    fn upsert_applications(
        &self,
        _drafts: Vec<ApplicationDraft>,
    ) -> Result<Vec<Application>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn applications_for_opening(
        &self,
        opening_id: &OpeningId,
    ) -> Result<Vec<Application>, StoreError> {
        self.inner.applications_for_opening(opening_id)
    }
}

/// Serves openings but cannot reach the applicant tables.
pub(super) struct LookupFailingStore {
    inner: MemoryIntakeStore,
}

impl LookupFailingStore {
    pub(super) fn new() -> Self {
        Self {
            inner: MemoryIntakeStore::with_openings([opening()]),
        }
    }
}

impl IntakeStore for LookupFailingStore {
    fn opening(&self, id: &OpeningId) -> Result<Option<Opening>, StoreError> {
        self.inner.opening(id)
    }

    fn insert_opening(&self, opening: Opening) -> Result<Opening, StoreError> {
        self.inner.insert_opening(opening)
    }

    fn applicant_by_net_id(&self, _net_id: &NetId) -> Result<Option<Applicant>, StoreError> {
        Err(StoreError::Unavailable("applicant table locked".to_string()))
    }

    fn applicants_by_ids(&self, _ids: &[ApplicantId]) -> Result<Vec<Applicant>, StoreError> {
        Err(StoreError::Unavailable("applicant table locked".to_string()))
    }

    fn create_applicant(&self, _applicant: NewApplicant) -> Result<Applicant, StoreError> {
        Err(StoreError::Unavailable("applicant table locked".to_string()))
    }

    fn upsert_applications(
        &self,
        drafts: Vec<ApplicationDraft>,
    ) -> Result<Vec<Application>, StoreError> {
        self.inner.upsert_applications(drafts)
    }

    fn applications_for_opening(
        &self,
        opening_id: &OpeningId,
    ) -> Result<Vec<Application>, StoreError> {
        self.inner.applications_for_opening(opening_id)
    }
}

/// Store whose every call fails.
pub(super) struct UnavailableStore;

impl IntakeStore for UnavailableStore {
    fn opening(&self, _id: &OpeningId) -> Result<Option<Opening>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn insert_opening(&self, _opening: Opening) -> Result<Opening, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn applicant_by_net_id(&self, _net_id: &NetId) -> Result<Option<Applicant>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn applicants_by_ids(&self, _ids: &[ApplicantId]) -> Result<Vec<Applicant>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn create_applicant(&self, _applicant: NewApplicant) -> Result<Applicant, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn upsert_applications(
        &self,
        _drafts: Vec<ApplicationDraft>,
    ) -> Result<Vec<Application>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn applications_for_opening(
        &self,
        _opening_id: &OpeningId,
    ) -> Result<Vec<Application>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
