//! End-to-end run over one ZIP archive.
//!
//! Archive-level problems abort the run. Anything that goes wrong with a
//! single source file only costs that file its sheet.

use std::fmt;
use std::path::Path;

use encoding_rs::Encoding;
use glmatch_recon::extract::{extract_database, extract_source};
use glmatch_recon::layout::{
    database_sheet_candidates, desired_sheet_name, plan_sheet, resolve_database_sheet, unique_sheet_name,
    SheetInputs,
};
use glmatch_recon::{select_latest, KeyedTable, LayoutConfig, SelectedFile};
use rust_xlsxwriter::Worksheet;
use serde::Serialize;

use crate::archive::{self, ExtractedArchive};
use crate::xlsx::SpreadsheetFile;

const EXCEL_EXTENSIONS: &[&str] = &[".xls", ".xlsx", ".xlsm", ".xlsb", ".ods"];

#[derive(Debug)]
pub enum RunError {
    /// Configuration unusable at run time (e.g. unknown encoding label).
    Config(String),
    /// The archive could not be opened or extracted.
    Archive(String),
    /// No file in the archive carries the database marker.
    MissingDatabase { marker: String },
    /// The archive holds a database but nothing else.
    MissingSources,
    /// Source candidates exist but none has a recognized extension.
    NoUsableSources,
    /// The database spreadsheet could not be opened.
    DatabaseRead { file: String, message: String },
    /// Every source file was skipped.
    NoSheets { skipped: usize },
    /// The assembled workbook could not be saved.
    Write(String),
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "invalid configuration: {msg}"),
            Self::Archive(msg) => write!(f, "archive error: {msg}"),
            Self::MissingDatabase { marker } => {
                write!(f, "no database file (name containing '{marker}') in archive")
            }
            Self::MissingSources => write!(f, "archive contains no source files"),
            Self::NoUsableSources => write!(f, "no source file with a recognized extension in archive"),
            Self::DatabaseRead { file, message } => write!(f, "cannot read database '{file}': {message}"),
            Self::NoSheets { skipped } => write!(f, "no sheet produced ({skipped} source files skipped)"),
            Self::Write(msg) => write!(f, "cannot write output: {msg}"),
        }
    }
}

impl std::error::Error for RunError {}

/// Per-run knobs beyond the layout config.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions<'a> {
    pub config: &'a LayoutConfig,
    /// Value preset into every sheet's search box.
    pub search: Option<&'a str>,
}

/// What happened to one selected source file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SheetOutcome {
    Written {
        source_file: String,
        sheet: String,
        database_sheet: Option<String>,
        database_rows: usize,
        source_rows: usize,
        database_max_rank: usize,
        source_max_rank: usize,
    },
    Skipped {
        source_file: String,
        reason: String,
    },
}

impl SheetOutcome {
    pub fn source_file(&self) -> &str {
        match self {
            Self::Written { source_file, .. } | Self::Skipped { source_file, .. } => source_file,
        }
    }

    pub fn is_written(&self) -> bool {
        matches!(self, Self::Written { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub database_file: String,
    /// Files considered as sources before selection.
    pub source_candidates: usize,
    /// Files that survived selection, in processing order.
    pub selected: Vec<String>,
    pub sheets: Vec<SheetOutcome>,
}

impl RunSummary {
    pub fn written(&self) -> usize {
        self.sheets.iter().filter(|s| s.is_written()).count()
    }

    pub fn skipped(&self) -> usize {
        self.sheets.len() - self.written()
    }
}

/// One selected source as `plan` reports it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedSource {
    pub source_file: String,
    pub d_date: Option<String>,
    pub jv_date: Option<String>,
    pub sheet: String,
    pub database_candidates: Vec<String>,
    pub database_sheet: Option<String>,
}

/// Dry-run result: discovery, selection and sheet resolution, nothing read or written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArchivePlan {
    pub database_file: String,
    pub database_sheets: Vec<String>,
    pub source_candidates: usize,
    /// Candidates dropped by selection (unknown extension or a newer file for the same date).
    pub dropped: Vec<String>,
    pub sources: Vec<PlannedSource>,
}

/// Archive state shared by `run` and `plan`.
struct Prepared {
    archive: ExtractedArchive,
    database_file: String,
    database: SpreadsheetFile,
    source_candidates: Vec<String>,
    selected: Vec<SelectedFile>,
}

fn prepare(zip_path: &Path, config: &LayoutConfig) -> Result<Prepared, RunError> {
    let archive = archive::extract(zip_path).map_err(RunError::Archive)?;
    let discovery = archive::discover(archive.files(), &config.input.database_marker);

    let database_file = discovery.database.ok_or_else(|| RunError::MissingDatabase {
        marker: config.input.database_marker.clone(),
    })?;
    if discovery.sources.is_empty() {
        return Err(RunError::MissingSources);
    }

    let database = SpreadsheetFile::open(&archive.root().join(&database_file)).map_err(|message| {
        RunError::DatabaseRead {
            file: database_file.clone(),
            message,
        }
    })?;
    log::info!(
        "database {} ({} sheets), {} source candidates",
        database_file,
        database.sheet_names().len(),
        discovery.sources.len()
    );

    let selected = select_latest(archive.root(), &discovery.sources, &config.input.extensions);
    if selected.is_empty() {
        return Err(RunError::NoUsableSources);
    }
    log::info!("{} source files selected", selected.len());

    Ok(Prepared {
        archive,
        database_file,
        database,
        source_candidates: discovery.sources,
        selected,
    })
}

fn is_excel(file_name: &str) -> bool {
    let lower = file_name.to_lowercase();
    EXCEL_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

fn read_source_grid(file: &SelectedFile, fallback: &'static Encoding) -> Result<Vec<Vec<String>>, String> {
    if is_excel(&file.file_name) {
        SpreadsheetFile::open(&file.path)?.read_first_grid()
    } else {
        crate::csv::read_grid(&file.path, fallback)
    }
}

/// Read, key, plan and render one source file.
///
/// The returned worksheet has passed every check the writer makes, so a
/// file that fails anywhere in here costs only its own sheet.
fn build_source_sheet(
    file: &SelectedFile,
    database: &mut SpreadsheetFile,
    database_sheets: &[String],
    used_names: &[String],
    options: &RunOptions<'_>,
    fallback: &'static Encoding,
) -> Result<(Worksheet, SheetOutcome), String> {
    let config = options.config;

    let candidates = database_sheet_candidates(file);
    let database_sheet = resolve_database_sheet(&candidates, database_sheets);
    log::debug!("{}: database candidates {:?} -> {:?}", file.file_name, candidates, database_sheet);

    let database_table = match &database_sheet {
        Some(sheet) => {
            let grid = database.read_grid(sheet)?;
            let table = extract_database(sheet, &grid, &config.database).map_err(|e| e.to_string())?;
            let key = config
                .database
                .key_position()
                .ok_or_else(|| format!("database key column '{}' not selected", config.database.key_column))?;
            Some(KeyedTable::new(table, key).map_err(|e| e.to_string())?)
        }
        None => None,
    };

    let grid = read_source_grid(file, fallback)?;
    let source = extract_source(&file.file_name, &grid, &config.source).map_err(|e| e.to_string())?;
    let source = KeyedTable::by_header(source, glmatch_recon::config::SEQ_HEADER).map_err(|e| e.to_string())?;

    let name = unique_sheet_name(used_names, &desired_sheet_name(file));
    let plan = plan_sheet(
        &SheetInputs {
            name: &name,
            database: database_table.as_ref(),
            source: &source,
            search: options.search,
        },
        config,
    );
    let worksheet = crate::xlsx::render_sheet(&plan)?;

    let (database_rows, database_max_rank) = database_table
        .as_ref()
        .map(|t| (t.table.len(), t.max_rank))
        .unwrap_or((0, 0));
    let outcome = SheetOutcome::Written {
        source_file: file.file_name.clone(),
        sheet: name,
        database_sheet,
        database_rows,
        source_rows: source.table.len(),
        database_max_rank,
        source_max_rank: source.max_rank,
    };
    Ok((worksheet, outcome))
}

/// Build every sheet of an archive. Files that fail are recorded as skipped.
fn build_sheets(zip_path: &Path, options: &RunOptions<'_>) -> Result<(Vec<Worksheet>, RunSummary), RunError> {
    let fallback = crate::csv::resolve_encoding(&options.config.input.fallback_encoding).map_err(RunError::Config)?;
    let mut prepared = prepare(zip_path, options.config)?;
    let database_sheets = prepared.database.sheet_names();

    let mut worksheets: Vec<Worksheet> = Vec::new();
    let mut outcomes = Vec::new();
    let mut used_names: Vec<String> = Vec::new();

    for file in &prepared.selected {
        match build_source_sheet(file, &mut prepared.database, &database_sheets, &used_names, options, fallback) {
            Ok((worksheet, outcome)) => {
                if let SheetOutcome::Written { sheet, .. } = &outcome {
                    log::info!("{} -> sheet '{}'", file.file_name, sheet);
                    used_names.push(sheet.clone());
                }
                worksheets.push(worksheet);
                outcomes.push(outcome);
            }
            Err(reason) => {
                log::warn!("skipping {}: {}", file.file_name, reason);
                outcomes.push(SheetOutcome::Skipped {
                    source_file: file.file_name.clone(),
                    reason,
                });
            }
        }
    }

    let summary = RunSummary {
        database_file: prepared.database_file.clone(),
        source_candidates: prepared.source_candidates.len(),
        selected: prepared.selected.iter().map(|f| f.file_name.clone()).collect(),
        sheets: outcomes,
    };

    if worksheets.is_empty() {
        return Err(RunError::NoSheets {
            skipped: summary.skipped(),
        });
    }

    Ok((worksheets, summary))
}

/// Run the whole pipeline and write the workbook to `output`.
pub fn process_archive(zip_path: &Path, output: &Path, options: &RunOptions<'_>) -> Result<RunSummary, RunError> {
    let (worksheets, summary) = build_sheets(zip_path, options)?;
    let count = worksheets.len();
    crate::xlsx::render(worksheets, output).map_err(RunError::Write)?;
    log::info!("wrote {} sheets to {}", count, output.display());
    Ok(summary)
}

/// Run the whole pipeline and return the workbook bytes.
pub fn process_archive_to_buffer(zip_path: &Path, options: &RunOptions<'_>) -> Result<(Vec<u8>, RunSummary), RunError> {
    let (worksheets, summary) = build_sheets(zip_path, options)?;
    let bytes = crate::xlsx::render_to_buffer(worksheets).map_err(RunError::Write)?;
    Ok((bytes, summary))
}

/// Discovery, selection and sheet resolution only.
pub fn plan_archive(zip_path: &Path, config: &LayoutConfig) -> Result<ArchivePlan, RunError> {
    let prepared = prepare(zip_path, config)?;
    let database_sheets = prepared.database.sheet_names();

    let mut used_names: Vec<String> = Vec::new();
    let sources = prepared
        .selected
        .iter()
        .map(|file| {
            let database_candidates = database_sheet_candidates(file);
            let database_sheet = resolve_database_sheet(&database_candidates, &database_sheets);
            let sheet = unique_sheet_name(&used_names, &desired_sheet_name(file));
            used_names.push(sheet.clone());
            PlannedSource {
                source_file: file.file_name.clone(),
                d_date: file.dates.d_date.clone(),
                jv_date: file.dates.jv_date.clone(),
                sheet,
                database_candidates,
                database_sheet,
            }
        })
        .collect();

    let kept: Vec<&Path> = prepared.selected.iter().map(|f| f.path.as_path()).collect();
    let dropped = prepared
        .source_candidates
        .iter()
        .filter(|c| !kept.contains(&prepared.archive.root().join(c).as_path()))
        .cloned()
        .collect();

    Ok(ArchivePlan {
        database_file: prepared.database_file,
        database_sheets,
        source_candidates: prepared.source_candidates.len(),
        dropped,
        sources,
    })
}
