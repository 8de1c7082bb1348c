use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{CustomQuestion, NewOpening, OpeningId, OrganizationId};
use super::identity::KnownApplicant;
use super::report::IngestOutcome;
use super::repository::{IntakeStore, StoreError};
use super::service::{ApplicationIntakeService, IngestRequest, RowSource};
use super::{IntakeError, PreconditionError};

/// Import body; organization and opening come from the path.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportPayload {
    pub rows: RowSource,
    #[serde(default)]
    pub column_mappings: BTreeMap<String, String>,
    #[serde(default)]
    pub custom_questions: Vec<CustomQuestion>,
    #[serde(default)]
    pub existing_applicants: BTreeMap<String, KnownApplicant>,
}

/// Router exposing opening registration, CSV import and application listing.
///
/// Authorization happens upstream: callers reaching these routes are already
/// verified admins of the organization in the path.
pub fn intake_router<S>(service: Arc<ApplicationIntakeService<S>>) -> Router
where
    S: IntakeStore + 'static,
{
    Router::new()
        .route(
            "/api/v1/organizations/:organization_id/openings",
            post(register_opening_handler::<S>),
        )
        .route(
            "/api/v1/organizations/:organization_id/openings/:opening_id/applications",
            get(list_applications_handler::<S>),
        )
        .route(
            "/api/v1/organizations/:organization_id/openings/:opening_id/applications/import",
            post(import_handler::<S>),
        )
        .with_state(service)
}

pub(crate) async fn register_opening_handler<S>(
    State(service): State<Arc<ApplicationIntakeService<S>>>,
    Path(organization_id): Path<String>,
    Json(opening): Json<NewOpening>,
) -> Response
where
    S: IntakeStore + 'static,
{
    match service.register_opening(OrganizationId(organization_id), opening) {
        Ok(opening) => (StatusCode::CREATED, Json(opening)).into_response(),
        Err(StoreError::Conflict) => {
            let payload = json!({ "error": "opening already exists" });
            (StatusCode::CONFLICT, Json(payload)).into_response()
        }
        Err(other) => {
            let payload = json!({ "error": other.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        }
    }
}

pub(crate) async fn list_applications_handler<S>(
    State(service): State<Arc<ApplicationIntakeService<S>>>,
    Path((organization_id, opening_id)): Path<(String, String)>,
) -> Response
where
    S: IntakeStore + 'static,
{
    let organization_id = OrganizationId(organization_id);
    let opening_id = OpeningId(opening_id);
    match service.applications(&organization_id, &opening_id) {
        Ok(applications) => {
            (StatusCode::OK, Json(json!({ "data": applications }))).into_response()
        }
        Err(error) => intake_error_response(error),
    }
}

pub(crate) async fn import_handler<S>(
    State(service): State<Arc<ApplicationIntakeService<S>>>,
    Path((organization_id, opening_id)): Path<(String, String)>,
    Json(payload): Json<ImportPayload>,
) -> Response
where
    S: IntakeStore + 'static,
{
    let request = IngestRequest {
        organization_id: OrganizationId(organization_id),
        opening_id: OpeningId(opening_id),
        rows: payload.rows,
        column_mappings: payload.column_mappings,
        custom_questions: payload.custom_questions,
        existing_applicants: payload.existing_applicants,
    };

    match service.ingest(request) {
        Ok(report) => {
            let status = match report.outcome() {
                IngestOutcome::PartialOrFullSuccess => StatusCode::OK,
                IngestOutcome::NothingWritten => StatusCode::UNPROCESSABLE_ENTITY,
            };
            (status, Json(report)).into_response()
        }
        Err(error) => intake_error_response(error),
    }
}

/// Single status mapping for intake failures, shared with `AppError`.
pub(crate) fn intake_error_response(error: IntakeError) -> Response {
    let status = match &error {
        IntakeError::Rejected(PreconditionError::OpeningNotFound(_)) => StatusCode::NOT_FOUND,
        IntakeError::Rejected(PreconditionError::OrganizationMismatch { .. }) => {
            StatusCode::FORBIDDEN
        }
        IntakeError::Rejected(PreconditionError::OpeningUnavailable { .. })
        | IntakeError::Read(_) => StatusCode::SERVICE_UNAVAILABLE,
        IntakeError::Rejected(_) => StatusCode::BAD_REQUEST,
        IntakeError::Store { .. } => StatusCode::BAD_GATEWAY,
    };

    let payload = match &error {
        IntakeError::Store { row_errors, .. } => json!({
            "error": error.to_string(),
            "errorCount": row_errors.len(),
            "errors": row_errors,
        }),
        _ => json!({ "error": error.to_string() }),
    };

    (status, Json(payload)).into_response()
}
