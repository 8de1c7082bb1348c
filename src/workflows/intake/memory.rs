use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;

use super::domain::{
    Applicant, ApplicantId, Application, ApplicationDraft, ApplicationId, NetId, NewApplicant,
    Opening, OpeningId,
};
use super::repository::{IntakeStore, StoreError};

/// Mutex-guarded store used by the service binary, the CLI and tests.
#[derive(Debug, Default)]
pub struct MemoryIntakeStore {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    openings: HashMap<OpeningId, Opening>,
    applicants: HashMap<ApplicantId, Applicant>,
    applicants_by_net_id: HashMap<NetId, ApplicantId>,
    applications: BTreeMap<(OpeningId, ApplicantId), Application>,
    applicant_sequence: u64,
    application_sequence: u64,
}

impl MemoryIntakeStore {
    pub fn with_openings(openings: impl IntoIterator<Item = Opening>) -> Self {
        let store = Self::default();
        if let Ok(mut state) = store.state.lock() {
            for opening in openings {
                state.openings.insert(opening.id.clone(), opening);
            }
        }
        store
    }

    pub fn applicant_count(&self) -> usize {
        self.state
            .lock()
            .map(|state| state.applicants.len())
            .unwrap_or_default()
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store mutex poisoned".to_string()))
    }
}

impl IntakeStore for MemoryIntakeStore {
    fn opening(&self, id: &OpeningId) -> Result<Option<Opening>, StoreError> {
        Ok(self.state()?.openings.get(id).cloned())
    }

    fn insert_opening(&self, opening: Opening) -> Result<Opening, StoreError> {
        let mut state = self.state()?;
        if state.openings.contains_key(&opening.id) {
            return Err(StoreError::Conflict);
        }
        state.openings.insert(opening.id.clone(), opening.clone());
        Ok(opening)
    }

    fn applicant_by_net_id(&self, net_id: &NetId) -> Result<Option<Applicant>, StoreError> {
        let state = self.state()?;
        Ok(state
            .applicants_by_net_id
            .get(net_id)
            .and_then(|id| state.applicants.get(id))
            .cloned())
    }

    fn applicants_by_ids(&self, ids: &[ApplicantId]) -> Result<Vec<Applicant>, StoreError> {
        let state = self.state()?;
        Ok(ids
            .iter()
            .filter_map(|id| state.applicants.get(id))
            .cloned()
            .collect())
    }

    fn create_applicant(&self, applicant: NewApplicant) -> Result<Applicant, StoreError> {
        let mut state = self.state()?;
        if state.applicants_by_net_id.contains_key(&applicant.net_id) {
            return Err(StoreError::Conflict);
        }

        state.applicant_sequence += 1;
        let id = ApplicantId(format!("applicant-{:06}", state.applicant_sequence));
        let created = Applicant {
            id: id.clone(),
            net_id: applicant.net_id,
            name: applicant.name,
        };
        state
            .applicants_by_net_id
            .insert(created.net_id.clone(), id.clone());
        state.applicants.insert(id, created.clone());
        Ok(created)
    }

    fn upsert_applications(
        &self,
        drafts: Vec<ApplicationDraft>,
    ) -> Result<Vec<Application>, StoreError> {
        let mut state = self.state()?;

        let mut seen = HashSet::with_capacity(drafts.len());
        for draft in &drafts {
            if !state.openings.contains_key(&draft.opening_id) {
                return Err(StoreError::Constraint(format!(
                    "opening {} does not exist",
                    draft.opening_id
                )));
            }
            if !state.applicants.contains_key(&draft.applicant_id) {
                return Err(StoreError::Constraint(format!(
                    "applicant {} does not exist",
                    draft.applicant_id.0
                )));
            }
            if !seen.insert((&draft.opening_id, &draft.applicant_id)) {
                return Err(StoreError::Constraint(
                    "upsert cannot affect the same (opening, applicant) row twice".to_string(),
                ));
            }
        }

        let now = Utc::now();
        let mut written = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let key = (draft.opening_id.clone(), draft.applicant_id.clone());
            let existing = state.applications.get(&key).cloned();
            let application = match existing {
                Some(existing) => Application {
                    status: draft.status,
                    notes: draft.notes,
                    form_responses: draft.form_responses,
                    updated_at: now,
                    ..existing
                },
                None => {
                    state.application_sequence += 1;
                    Application {
                        id: ApplicationId(format!(
                            "application-{:06}",
                            state.application_sequence
                        )),
                        opening_id: draft.opening_id,
                        applicant_id: draft.applicant_id,
                        status: draft.status,
                        notes: draft.notes,
                        form_responses: draft.form_responses,
                        created_at: now,
                        updated_at: now,
                    }
                }
            };
            state.applications.insert(key, application.clone());
            written.push(application);
        }

        Ok(written)
    }

    fn applications_for_opening(
        &self,
        opening_id: &OpeningId,
    ) -> Result<Vec<Application>, StoreError> {
        let state = self.state()?;
        Ok(state
            .applications
            .values()
            .filter(|application| &application.opening_id == opening_id)
            .cloned()
            .collect())
    }
}
