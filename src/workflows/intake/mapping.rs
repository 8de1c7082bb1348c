use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::domain::{CustomQuestion, QuestionId};
use super::normalizer::normalize_header;
use super::parser::CsvRow;

/// Application fields a spreadsheet column can be mapped onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    NetId,
    Name,
    Status,
    Notes,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 4] = [
        CanonicalField::NetId,
        CanonicalField::Name,
        CanonicalField::Status,
        CanonicalField::Notes,
    ];

    pub fn key(self) -> &'static str {
        match self {
            CanonicalField::NetId => "net_id",
            CanonicalField::Name => "name",
            CanonicalField::Status => "status",
            CanonicalField::Notes => "notes",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim().to_ascii_lowercase().as_str() {
            "net_id" | "netid" => Some(Self::NetId),
            "name" => Some(Self::Name),
            "status" => Some(Self::Status),
            "notes" => Some(Self::Notes),
            _ => None,
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MappingError {
    #[error("required column `{0}` is not mapped to any header in the file")]
    MissingRequired(CanonicalField),
}

/// Column positions for every mapped canonical field and custom question.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedMapping {
    canonical: BTreeMap<CanonicalField, usize>,
    questions: BTreeMap<QuestionId, usize>,
}

impl ResolvedMapping {
    pub fn column(&self, field: CanonicalField) -> Option<usize> {
        self.canonical.get(&field).copied()
    }

    pub fn value<'r>(&self, row: &'r CsvRow, field: CanonicalField) -> Option<&'r str> {
        self.column(field).and_then(|column| row.value(column))
    }

    pub fn answer<'r>(&self, row: &'r CsvRow, question: &QuestionId) -> Option<&'r str> {
        self.questions
            .get(question)
            .and_then(|column| row.value(*column))
    }
}

/// Resolves caller-supplied header mappings against the parsed header list.
///
/// Headers without a mapping, and mappings naming neither a canonical field
/// nor one of `questions`, are ignored. When several headers map to the same
/// target the leftmost one is used.
pub fn resolve(
    headers: &[String],
    mappings: &BTreeMap<String, String>,
    required: &[CanonicalField],
    questions: &[CustomQuestion],
) -> Result<ResolvedMapping, MappingError> {
    let targets: HashMap<String, &str> = mappings
        .iter()
        .map(|(header, target)| (normalize_header(header), target.as_str()))
        .collect();

    let mut resolved = ResolvedMapping::default();
    for (column, header) in headers.iter().enumerate() {
        let Some(target) = targets.get(&normalize_header(header)) else {
            continue;
        };

        if let Some(field) = CanonicalField::from_key(target) {
            resolved.canonical.entry(field).or_insert(column);
        } else if let Some(question) = questions.iter().find(|q| q.id.0 == target.trim()) {
            resolved
                .questions
                .entry(question.id.clone())
                .or_insert(column);
        } else {
            debug!(header = %header, target = %target, "ignoring mapping to unknown target");
        }
    }

    for field in required {
        if resolved.column(*field).is_none() {
            return Err(MappingError::MissingRequired(*field));
        }
    }

    Ok(resolved)
}
