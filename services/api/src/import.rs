use clap::Args;
use recruit_intake::config::{AppConfig, IntakeConfig};
use recruit_intake::error::AppError;
use recruit_intake::workflows::intake::{
    ApplicationIntakeService, CustomQuestion, IngestOutcome, IngestReport, IngestRequest,
    IntakeError, KnownApplicant, MemoryIntakeStore, Opening, OpeningId, OpeningStatus,
    OrganizationId, RowError, RowSource,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct ImportArgs {
    /// CSV export with one header line and one application per row
    #[arg(long)]
    pub(crate) csv: PathBuf,
    /// JSON file with `columnMappings` and optional `customQuestions` / `existingApplicants`
    #[arg(long)]
    pub(crate) mapping: PathBuf,
    /// Opening the rows are imported into
    #[arg(long, default_value = "opening-local")]
    pub(crate) opening_id: String,
    /// Organization that owns the opening
    #[arg(long, default_value = "org-local")]
    pub(crate) organization_id: String,
    /// Print the full report as JSON instead of a summary
    #[arg(long)]
    pub(crate) json: bool,
}

/// Mapping document accepted by `--mapping`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MappingFile {
    pub(crate) column_mappings: BTreeMap<String, String>,
    #[serde(default)]
    pub(crate) custom_questions: Vec<CustomQuestion>,
    #[serde(default)]
    pub(crate) existing_applicants: BTreeMap<String, KnownApplicant>,
}

pub(crate) fn run_import(args: ImportArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    import_and_render(&args, config.intake)
}

/// Prints the outcome and fails when no application was written, so the
/// process exits non-zero for an empty or fully rejected batch.
pub(crate) fn import_and_render(args: &ImportArgs, config: IntakeConfig) -> Result<(), AppError> {
    let report = match import_files(args, config) {
        Ok(report) => report,
        Err(AppError::Intake(IntakeError::Store { source, row_errors })) => {
            println!("Application import for {} failed: {source}", args.opening_id);
            render_row_errors(&row_errors);
            return Err(AppError::Intake(IntakeError::Store { source, row_errors }));
        }
        Err(other) => return Err(other),
    };

    if args.json {
        let rendered = serde_json::to_string_pretty(&report).map_err(std::io::Error::from)?;
        println!("{rendered}");
    } else {
        render_summary(&args.opening_id, &report);
    }

    match report.outcome() {
        IngestOutcome::PartialOrFullSuccess => Ok(()),
        IngestOutcome::NothingWritten => Err(AppError::NothingImported {
            rejected: report.error_count,
        }),
    }
}

/// Runs one import against a throwaway store seeded with the target opening.
pub(crate) fn import_files(
    args: &ImportArgs,
    config: IntakeConfig,
) -> Result<IngestReport, AppError> {
    let csv = fs::read_to_string(&args.csv)?;
    let mapping = read_mapping(&args.mapping)?;

    let opening = Opening {
        id: OpeningId(args.opening_id.clone()),
        organization_id: OrganizationId(args.organization_id.clone()),
        title: "Local import".to_string(),
        status: OpeningStatus::Open,
    };
    let store = Arc::new(MemoryIntakeStore::with_openings([opening]));
    let service = ApplicationIntakeService::new(store, config);

    let report = service.ingest(IngestRequest {
        organization_id: OrganizationId(args.organization_id.clone()),
        opening_id: OpeningId(args.opening_id.clone()),
        rows: RowSource::Text(csv),
        column_mappings: mapping.column_mappings,
        custom_questions: mapping.custom_questions,
        existing_applicants: mapping.existing_applicants,
    })?;

    Ok(report)
}

fn read_mapping(path: &Path) -> Result<MappingFile, AppError> {
    let raw = fs::read_to_string(path)?;
    let mapping = serde_json::from_str(&raw).map_err(std::io::Error::from)?;
    Ok(mapping)
}

fn render_summary(opening_id: &str, report: &IngestReport) {
    println!("Application import for {opening_id}");
    match report.outcome() {
        IngestOutcome::PartialOrFullSuccess => {
            println!("- {} applications written", report.records.len())
        }
        IngestOutcome::NothingWritten => println!("- no applications written"),
    }

    render_row_errors(&report.errors);
}

fn render_row_errors(errors: &[RowError]) {
    if errors.is_empty() {
        return;
    }

    println!("- {} rows rejected:", errors.len());
    for error in errors {
        println!("  row {}: {}", error.row, error.message);
    }
}
