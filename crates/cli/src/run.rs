//! `glmatch run`, `glmatch plan`, `glmatch config`.

use std::path::{Path, PathBuf};

use glmatch_io::{RunError, RunOptions, SheetOutcome};
use glmatch_recon::LayoutConfig;

use crate::exit_codes::{run_exit_code, EXIT_CONFIG};
use crate::CliError;

fn run_err(err: RunError) -> CliError {
    let hint = match &err {
        RunError::MissingDatabase { .. } => {
            Some("the database workbook's file name must contain the marker (input.database_marker)".to_string())
        }
        RunError::NoUsableSources => Some("recognized extensions are set by input.extensions".to_string()),
        RunError::NoSheets { .. } => Some("rerun with -v to see why each file was skipped".to_string()),
        _ => None,
    };
    let cli = CliError::new(run_exit_code(&err), err.to_string());
    match hint {
        Some(hint) => cli.with_hint(hint),
        None => cli,
    }
}

fn load_config(path: Option<&Path>) -> Result<LayoutConfig, CliError> {
    let Some(path) = path else {
        return Ok(LayoutConfig::default());
    };
    log::info!("using config {}", path.display());
    let text = std::fs::read_to_string(path)
        .map_err(|e| CliError::new(EXIT_CONFIG, format!("cannot read config {}: {e}", path.display())))?;
    LayoutConfig::from_toml(&text)
        .map_err(|e| CliError::new(EXIT_CONFIG, e.to_string()).with_hint("`glmatch config` prints every field with its default"))
}

fn check_archive(path: &Path) -> Result<(), CliError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(CliError::args(format!("archive not found: {}", path.display())))
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, CliError> {
    serde_json::to_string_pretty(value).map_err(|e| CliError::general(format!("JSON serialization error: {e}")))
}

pub fn cmd_run(
    archive: PathBuf,
    output: PathBuf,
    config_path: Option<PathBuf>,
    search: Option<String>,
    json_output: bool,
) -> Result<(), CliError> {
    check_archive(&archive)?;
    let config = load_config(config_path.as_deref())?;

    let options = RunOptions {
        config: &config,
        search: search.as_deref(),
    };
    let summary = glmatch_io::process_archive(&archive, &output, &options).map_err(run_err)?;

    if json_output {
        println!("{}", to_json(&summary)?);
    }

    // Human summary to stderr
    for outcome in &summary.sheets {
        match outcome {
            SheetOutcome::Written {
                source_file,
                sheet,
                database_sheet,
                source_rows,
                ..
            } => eprintln!(
                "  {} -> '{}' ({} rows, database sheet: {})",
                source_file,
                sheet,
                source_rows,
                database_sheet.as_deref().unwrap_or("none")
            ),
            SheetOutcome::Skipped { source_file, reason } => {
                eprintln!("  {} skipped: {}", source_file, reason)
            }
        }
    }
    eprintln!(
        "wrote {}: {} sheets, {} skipped (database {})",
        output.display(),
        summary.written(),
        summary.skipped(),
        summary.database_file
    );

    Ok(())
}

pub fn cmd_plan(archive: PathBuf, config_path: Option<PathBuf>, json_output: bool) -> Result<(), CliError> {
    check_archive(&archive)?;
    let config = load_config(config_path.as_deref())?;
    let plan = glmatch_io::plan_archive(&archive, &config).map_err(run_err)?;

    if json_output {
        println!("{}", to_json(&plan)?);
        return Ok(());
    }

    println!("database: {} ({} sheets)", plan.database_file, plan.database_sheets.len());
    println!("sources:  {} candidates, {} selected", plan.source_candidates, plan.sources.len());
    for source in &plan.sources {
        println!(
            "  {} -> '{}' (database sheet: {})",
            source.source_file,
            source.sheet,
            source.database_sheet.as_deref().unwrap_or("none")
        );
    }
    for dropped in &plan.dropped {
        println!("  dropped {}", dropped);
    }
    Ok(())
}

pub fn cmd_config() -> Result<(), CliError> {
    let text = LayoutConfig::default().to_toml().map_err(|e| CliError::general(e.to_string()))?;
    print!("{text}");
    Ok(())
}
