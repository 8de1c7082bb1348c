use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::IntakeConfig;

use super::builder::{build_record, RecordContext};
use super::domain::{
    ApplicantId, Application, ApplicationDraft, CustomQuestion, NewOpening, Opening, OpeningId,
    OrganizationId,
};
use super::identity::{IdentityCache, IdentityResolver, KnownApplicant};
use super::mapping::{self, ResolvedMapping};
use super::parser::{self, CsvRow, MalformedRow, ParsedTable};
use super::repository::{IntakeStore, StoreError};
use super::report::{IngestReport, RowError};
use super::{IntakeError, PreconditionError};

/// Spreadsheet content: raw delimited text or rows the caller already split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RowSource {
    Text(String),
    Records(Vec<BTreeMap<String, Option<String>>>),
}

/// Everything one import needs. The caller has already confirmed that the
/// actor administers `organization_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestRequest {
    pub organization_id: OrganizationId,
    pub opening_id: OpeningId,
    pub rows: RowSource,
    #[serde(default)]
    pub column_mappings: BTreeMap<String, String>,
    #[serde(default)]
    pub custom_questions: Vec<CustomQuestion>,
    #[serde(default)]
    pub existing_applicants: BTreeMap<String, KnownApplicant>,
}

static OPENING_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_opening_id() -> OpeningId {
    let id = OPENING_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    OpeningId(format!("opening-{id:06}"))
}

/// Drives parsing, mapping, identity resolution and record building for a
/// batch, then writes every valid row with a single upsert.
pub struct ApplicationIntakeService<S> {
    store: Arc<S>,
    config: IntakeConfig,
}

impl<S> ApplicationIntakeService<S>
where
    S: IntakeStore + 'static,
{
    pub fn new(store: Arc<S>, config: IntakeConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &IntakeConfig {
        &self.config
    }

    /// Runs one import.
    ///
    /// Returns `Ok` once the batch reached the write stage, even when every row
    /// failed (see [`IngestReport::outcome`]). Precondition failures write
    /// nothing. A failed upsert writes no applications, but applicants created
    /// while resolving rows stay in the store.
    pub fn ingest(&self, request: IngestRequest) -> Result<IngestReport, IntakeError> {
        let opening = self.load_opening(&request.opening_id, &request.organization_id)?;
        let table = self.parse(&request.rows)?;
        let required = self.config.required_fields();
        let mapping = mapping::resolve(
            &table.headers,
            &request.column_mappings,
            &required,
            &request.custom_questions,
        )
        .map_err(PreconditionError::from)?;

        let cache = self.confirmed_cache(&request.existing_applicants);
        info!(
            opening_id = %opening.id,
            rows = table.rows.len() + table.malformed.len(),
            cached_applicants = cache.len(),
            "starting application import"
        );

        let mut resolver = IdentityResolver::new(self.store.as_ref(), cache);
        let context = RecordContext {
            opening_id: &opening.id,
            default_status: self.config.default_status,
            required: &required,
            questions: &request.custom_questions,
        };

        let mut batch = Batch::with_malformed(&table.malformed);
        for row in &table.rows {
            batch.push(process_row(&mut resolver, row, &mapping, context));
        }
        let Batch { drafts, errors, .. } = batch;

        if drafts.is_empty() {
            warn!(opening_id = %opening.id, errors = errors.len(), "no valid rows to import");
            return Ok(IngestReport::new(Vec::new(), errors));
        }

        let pending = drafts.len();
        match self.store.upsert_applications(drafts) {
            Ok(records) => {
                info!(
                    opening_id = %opening.id,
                    records = records.len(),
                    errors = errors.len(),
                    "application import finished"
                );
                Ok(IngestReport::new(records, errors))
            }
            Err(source) => {
                error!(opening_id = %opening.id, pending, %source, "application upsert failed");
                let report = IngestReport::new(Vec::new(), errors);
                Err(IntakeError::Store {
                    source,
                    row_errors: report.errors,
                })
            }
        }
    }

    /// Registers an opening so later imports can target it.
    pub fn register_opening(
        &self,
        organization_id: OrganizationId,
        opening: NewOpening,
    ) -> Result<Opening, StoreError> {
        let opening = Opening {
            id: opening.id.unwrap_or_else(next_opening_id),
            organization_id,
            title: opening.title,
            status: opening.status,
        };
        let stored = self.store.insert_opening(opening)?;
        info!(
            opening_id = %stored.id,
            organization_id = %stored.organization_id,
            "opening registered"
        );
        Ok(stored)
    }

    /// Lists the applications of an opening owned by `organization_id`.
    pub fn applications(
        &self,
        organization_id: &OrganizationId,
        opening_id: &OpeningId,
    ) -> Result<Vec<Application>, IntakeError> {
        let opening = self.load_opening(opening_id, organization_id)?;
        self.store
            .applications_for_opening(&opening.id)
            .map_err(IntakeError::Read)
    }

    fn load_opening(
        &self,
        opening_id: &OpeningId,
        organization_id: &OrganizationId,
    ) -> Result<Opening, PreconditionError> {
        let opening = self
            .store
            .opening(opening_id)
            .map_err(|source| PreconditionError::OpeningUnavailable {
                opening_id: opening_id.clone(),
                source,
            })?
            .ok_or_else(|| PreconditionError::OpeningNotFound(opening_id.clone()))?;

        if &opening.organization_id != organization_id {
            return Err(PreconditionError::OrganizationMismatch {
                opening_id: opening_id.clone(),
                organization_id: organization_id.clone(),
            });
        }

        Ok(opening)
    }

    /// Seeds the identity cache with caller-supplied applicants the store
    /// confirms under the same net id. Anything else resolves through the
    /// store like an uncached row.
    fn confirmed_cache(&self, known: &BTreeMap<String, KnownApplicant>) -> IdentityCache {
        let mut cache = IdentityCache::from_known(known);
        if cache.is_empty() {
            return cache;
        }

        match self.store.applicants_by_ids(&cache.applicant_ids()) {
            Ok(confirmed) => {
                let dropped = cache.retain_confirmed(&confirmed);
                if dropped > 0 {
                    warn!(dropped, "ignoring existing applicants the store does not confirm");
                }
                cache
            }
            Err(source) => {
                warn!(%source, "could not confirm existing applicants, resolving rows through the store");
                IdentityCache::default()
            }
        }
    }

    fn parse(&self, rows: &RowSource) -> Result<ParsedTable, PreconditionError> {
        let table = match rows {
            RowSource::Text(text) => parser::parse_text(text)?,
            RowSource::Records(records) => parser::from_records(records)?,
        };

        let data_rows = table.rows.len() + table.malformed.len();
        if data_rows > self.config.max_rows {
            return Err(PreconditionError::TooManyRows {
                rows: data_rows,
                limit: self.config.max_rows,
            });
        }

        Ok(table)
    }
}

fn process_row<S>(
    resolver: &mut IdentityResolver<'_, S>,
    row: &CsvRow,
    mapping: &ResolvedMapping,
    context: RecordContext<'_>,
) -> Result<ApplicationDraft, RowError>
where
    S: IntakeStore + ?Sized,
{
    let identity = resolver
        .resolve(row, mapping)
        .map_err(|err| RowError::new(row.number, err.to_string()))?;
    build_record(row, mapping, identity.applicant_id, context)
        .map_err(|err| RowError::new(row.number, err.to_string()))
}

/// Fold target for per-row results. Drafts keep the position of the first
/// row naming an applicant; a later row for the same applicant replaces its
/// values.
#[derive(Default)]
struct Batch {
    drafts: Vec<ApplicationDraft>,
    positions: HashMap<ApplicantId, usize>,
    errors: Vec<RowError>,
}

impl Batch {
    fn with_malformed(malformed: &[MalformedRow]) -> Self {
        let errors = malformed
            .iter()
            .map(|row| {
                RowError::new(
                    row.number,
                    format!("row has {} fields, expected {}", row.found, row.expected),
                )
            })
            .collect();
        Self {
            errors,
            ..Self::default()
        }
    }

    fn push(&mut self, result: Result<ApplicationDraft, RowError>) {
        match result {
            Ok(draft) => match self.positions.get(&draft.applicant_id) {
                Some(&position) => {
                    debug!(
                        applicant_id = %draft.applicant_id.0,
                        "later row replaces earlier duplicate"
                    );
                    self.drafts[position] = draft;
                }
                None => {
                    self.positions
                        .insert(draft.applicant_id.clone(), self.drafts.len());
                    self.drafts.push(draft);
                }
            },
            Err(row_error) => {
                debug!(row = row_error.row, message = %row_error.message, "row rejected");
                self.errors.push(row_error);
            }
        }
    }
}
