use std::collections::BTreeMap;

use super::domain::{ApplicantId, ApplicationDraft, ApplicationStatus, CustomQuestion, OpeningId};
use super::mapping::{CanonicalField, ResolvedMapping};
use super::parser::CsvRow;

/// Per-batch inputs shared by every row the builder sees.
#[derive(Debug, Clone, Copy)]
pub struct RecordContext<'a> {
    pub opening_id: &'a OpeningId,
    pub default_status: ApplicationStatus,
    pub required: &'a [CanonicalField],
    pub questions: &'a [CustomQuestion],
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("missing required field `{0}`")]
    MissingField(CanonicalField),
    #[error("unrecognized status `{0}`")]
    InvalidStatus(String),
}

/// Assembles the application draft for one row. Performs no store access.
pub fn build_record(
    row: &CsvRow,
    mapping: &ResolvedMapping,
    applicant_id: ApplicantId,
    context: RecordContext<'_>,
) -> Result<ApplicationDraft, RecordError> {
    for field in context.required {
        if *field != CanonicalField::NetId && mapping.value(row, *field).is_none() {
            return Err(RecordError::MissingField(*field));
        }
    }

    let status = match mapping.value(row, CanonicalField::Status) {
        Some(raw) => ApplicationStatus::parse(raw)
            .ok_or_else(|| RecordError::InvalidStatus(raw.to_string()))?,
        None => context.default_status,
    };

    let notes = mapping
        .value(row, CanonicalField::Notes)
        .map(|notes| notes.to_string());

    // Unanswered questions are expected; they persist as empty answers.
    let form_responses: BTreeMap<_, _> = context
        .questions
        .iter()
        .map(|question| {
            let answer = mapping.answer(row, &question.id).unwrap_or_default();
            (question.id.clone(), answer.to_string())
        })
        .collect();

    Ok(ApplicationDraft {
        opening_id: context.opening_id.clone(),
        applicant_id,
        status,
        notes,
        form_responses,
    })
}
