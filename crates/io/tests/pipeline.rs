use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Reader};
use glmatch_io::{plan_archive, process_archive, process_archive_to_buffer, RunError, RunOptions, SheetOutcome};
use glmatch_recon::LayoutConfig;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

// -------------------------------------------------------------------------
// Fixtures
// -------------------------------------------------------------------------

/// One source CSV line with the default source letters populated.
fn source_line(rc: &str, ch: &str, dr: &str, detail: &str) -> String {
    let mut cells = vec![String::new(); 52];
    cells[9] = rc.into(); // J
    cells[10] = "OC1".into(); // K
    cells[11] = ch.into(); // L
    cells[12] = "P01".into(); // M
    cells[13] = "4000".into(); // N
    cells[15] = "0".into(); // P
    cells[38] = dr.into(); // AM
    cells[39] = "0".into(); // AN
    cells[51] = detail.into(); // AZ
    cells
        .iter()
        .map(|c| if c.contains(',') { format!("\"{c}\"") } else { c.clone() })
        .collect::<Vec<_>>()
        .join(",")
}

fn source_csv(lines: &[String]) -> Vec<u8> {
    let mut text = lines.join("\n");
    text.push('\n');
    text.into_bytes()
}

/// Database workbook with one populated sheet per name.
fn database_xlsx(sheets: &[&str]) -> Vec<u8> {
    let mut workbook = rust_xlsxwriter::Workbook::new();
    for name in sheets {
        let ws = workbook.add_worksheet().set_name(*name).unwrap();
        ws.write_string(0, 5, "term").unwrap(); // F
        ws.write_string(0, 31, "seq").unwrap(); // AF
        ws.write_string(0, 44, "resp_byte").unwrap(); // AS
        ws.write_string(0, 51, "amt_1_full").unwrap(); // AZ
        for (i, (seq, amount)) in [("000123", "0012500"), ("000124", "50"), ("000123", "0000100")]
            .iter()
            .enumerate()
        {
            let row = i as u32 + 1;
            ws.write_string(row, 5, "T01").unwrap();
            ws.write_string(row, 31, *seq).unwrap();
            ws.write_string(row, 44, "00").unwrap();
            ws.write_string(row, 51, *amount).unwrap();
        }
    }
    workbook.save_to_buffer().unwrap()
}

fn write_zip(dir: &Path, entries: &[(&str, Vec<u8>)]) -> PathBuf {
    let path = dir.join("input.zip");
    let file = File::create(&path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    for (name, bytes) in entries {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(bytes).unwrap();
    }
    zip.finish().unwrap();
    path
}

fn standard_archive(dir: &Path) -> PathBuf {
    let src = source_csv(&[
        source_line("R2", "B", "1,250.00", "cash seq_num:000123 ok"),
        source_line("R1", "A", "10", "cash seq_num:000999"),
    ]);
    write_zip(
        dir,
        &[
            ("DATABASE_ATMI.xlsx", database_xlsx(&["D251110", "251109"])),
            ("GLJV20251220_ATMI-D251110.csv", src.clone()),
            ("GLJV20251221_ATMI-D251110.csv", src.clone()),
            ("GLJV20251221_ATMI-D251111.csv", src),
            ("notes.pdf", b"%PDF".to_vec()),
            ("__MACOSX/._DATABASE_ATMI.xlsx", b"junk".to_vec()),
        ],
    )
}

fn read_back(path: &Path) -> Vec<(String, Vec<Vec<String>>)> {
    let mut book = open_workbook_auto(path).unwrap();
    let names = book.sheet_names().to_vec();
    names
        .into_iter()
        .map(|name| {
            let range = book.worksheet_range(&name).unwrap();
            let grid = range
                .rows()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect();
            (name, grid)
        })
        .collect()
}

// -------------------------------------------------------------------------
// Runs
// -------------------------------------------------------------------------

#[test]
fn run_writes_one_sheet_per_latest_file() {
    let dir = TempDir::new().unwrap();
    let zip = standard_archive(dir.path());
    let out = dir.path().join("GL_File.xlsx");
    let config = LayoutConfig::default();

    let summary = process_archive(&zip, &out, &RunOptions { config: &config, search: Some("000123") }).unwrap();

    assert_eq!(summary.database_file, "DATABASE_ATMI.xlsx");
    assert_eq!(summary.source_candidates, 4);
    assert_eq!(
        summary.selected,
        vec!["GLJV20251221_ATMI-D251110.csv", "GLJV20251221_ATMI-D251111.csv"]
    );
    assert_eq!(summary.written(), 2);

    match &summary.sheets[0] {
        SheetOutcome::Written {
            sheet,
            database_sheet,
            database_rows,
            database_max_rank,
            source_rows,
            ..
        } => {
            assert_eq!(sheet, "251110");
            assert_eq!(database_sheet.as_deref(), Some("D251110"));
            assert_eq!(*database_rows, 3);
            assert_eq!(*database_max_rank, 2);
            assert_eq!(*source_rows, 2);
        }
        other => panic!("expected written sheet, got {other:?}"),
    }
    match &summary.sheets[1] {
        SheetOutcome::Written { sheet, database_sheet, .. } => {
            assert_eq!(sheet, "251111");
            assert!(database_sheet.is_none());
        }
        other => panic!("expected written sheet, got {other:?}"),
    }

    let sheets = read_back(&out);
    let names: Vec<&str> = sheets.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["251110", "251111"]);

    let grid = &sheets[0].1;
    assert_eq!(grid[0][0], "Search SEQ");
    assert_eq!(grid[0][1], "000123");
    assert_eq!(grid[2][0], "Database(ATMI)");
}

#[test]
fn identical_archives_render_identically() {
    let dir = TempDir::new().unwrap();
    let zip = standard_archive(dir.path());
    let config = LayoutConfig::default();
    let options = RunOptions { config: &config, search: None };

    let (first, _) = process_archive_to_buffer(&zip, &options).unwrap();
    let (second, _) = process_archive_to_buffer(&zip, &options).unwrap();

    let a = dir.path().join("a.xlsx");
    let b = dir.path().join("b.xlsx");
    std::fs::write(&a, first).unwrap();
    std::fs::write(&b, second).unwrap();
    assert_eq!(read_back(&a), read_back(&b));
}

#[test]
fn empty_source_is_skipped() {
    let dir = TempDir::new().unwrap();
    let zip = write_zip(
        dir.path(),
        &[
            ("DATABASE.xlsx", database_xlsx(&["D251110"])),
            ("GLJV20251221-D251110.csv", source_csv(&[source_line("R1", "A", "1", "seq_num:1")])),
            ("GLJV20251221-D251112.csv", Vec::new()),
        ],
    );
    let config = LayoutConfig::default();
    let (_, summary) = process_archive_to_buffer(&zip, &RunOptions { config: &config, search: None }).unwrap();

    assert_eq!(summary.written(), 1);
    assert_eq!(summary.skipped(), 1);
    match &summary.sheets[1] {
        SheetOutcome::Skipped { source_file, reason } => {
            assert_eq!(source_file, "GLJV20251221-D251112.csv");
            assert!(reason.contains("no rows"));
        }
        other => panic!("expected skipped file, got {other:?}"),
    }
}

#[test]
fn excel_sources_read_first_sheet() {
    let dir = TempDir::new().unwrap();
    let mut source = rust_xlsxwriter::Workbook::new();
    let ws = source.add_worksheet();
    ws.write_string(0, 9, "R9").unwrap(); // J
    ws.write_string(0, 11, "CH").unwrap(); // L
    ws.write_number(0, 38, 12.5).unwrap(); // AM
    ws.write_string(0, 51, "seq_num:000124").unwrap(); // AZ
    let zip = write_zip(
        dir.path(),
        &[
            ("DATABASE.xlsx", database_xlsx(&["251110"])),
            ("GLJV20251221-D251110.xlsx", source.save_to_buffer().unwrap()),
        ],
    );

    let out = dir.path().join("out.xlsx");
    let config = LayoutConfig::default();
    let summary = process_archive(&zip, &out, &RunOptions { config: &config, search: Some("000124") }).unwrap();
    match &summary.sheets[0] {
        SheetOutcome::Written { database_sheet, source_rows, .. } => {
            assert_eq!(database_sheet.as_deref(), Some("251110"));
            assert_eq!(*source_rows, 1);
        }
        other => panic!("expected written sheet, got {other:?}"),
    }
}

#[test]
fn duplicate_sheet_names_are_suffixed() {
    let dir = TempDir::new().unwrap();
    let src = source_csv(&[source_line("R1", "A", "1", "seq_num:1")]);
    let zip = write_zip(
        dir.path(),
        &[
            ("DATABASE.xlsx", database_xlsx(&["x"])),
            ("a/report.csv", src.clone()),
            ("b/report.csv", src),
        ],
    );
    let config = LayoutConfig::default();
    let (_, summary) = process_archive_to_buffer(&zip, &RunOptions { config: &config, search: None }).unwrap();
    let sheets: Vec<&str> = summary
        .sheets
        .iter()
        .map(|s| match s {
            SheetOutcome::Written { sheet, .. } => sheet.as_str(),
            SheetOutcome::Skipped { .. } => "",
        })
        .collect();
    assert_eq!(sheets, vec!["report", "report_2"]);
}

#[test]
fn sheet_rejected_by_writer_is_skipped() {
    let dir = TempDir::new().unwrap();
    let long_detail = format!("seq_num:000123 {}", "x".repeat(40_000));
    let zip = write_zip(
        dir.path(),
        &[
            ("DATABASE.xlsx", database_xlsx(&["D251110"])),
            ("GLJV20251221-D251110.csv", source_csv(&[source_line("R1", "A", "1", "seq_num:000123")])),
            ("GLJV20251221-D251112.csv", source_csv(&[source_line("R2", "B", "2", &long_detail)])),
        ],
    );
    let out = dir.path().join("out.xlsx");
    let config = LayoutConfig::default();
    let summary = process_archive(&zip, &out, &RunOptions { config: &config, search: None }).unwrap();

    assert_eq!(summary.written(), 1);
    assert_eq!(summary.skipped(), 1);
    match &summary.sheets[1] {
        SheetOutcome::Skipped { source_file, reason } => {
            assert_eq!(source_file, "GLJV20251221-D251112.csv");
            assert!(reason.contains("'251112'"), "{reason}");
        }
        other => panic!("expected skipped file, got {other:?}"),
    }

    let sheets: Vec<String> = read_back(&out).into_iter().map(|(name, _)| name).collect();
    assert_eq!(sheets, vec!["251110".to_string()]);
}

// -------------------------------------------------------------------------
// Failures
// -------------------------------------------------------------------------

#[test]
fn missing_database_is_an_archive_error() {
    let dir = TempDir::new().unwrap();
    let zip = write_zip(dir.path(), &[("GL-D251110.csv", source_csv(&[source_line("R", "C", "1", "d")]))]);
    let config = LayoutConfig::default();
    let err = process_archive_to_buffer(&zip, &RunOptions { config: &config, search: None }).unwrap_err();
    assert!(matches!(err, RunError::MissingDatabase { .. }));
}

#[test]
fn archive_without_sources() {
    let dir = TempDir::new().unwrap();
    let zip = write_zip(dir.path(), &[("DATABASE.xlsx", database_xlsx(&["x"]))]);
    let config = LayoutConfig::default();
    let err = process_archive_to_buffer(&zip, &RunOptions { config: &config, search: None }).unwrap_err();
    assert!(matches!(err, RunError::MissingSources));

    let zip = write_zip(
        dir.path(),
        &[("DATABASE.xlsx", database_xlsx(&["x"])), ("readme.md", b"hi".to_vec())],
    );
    let err = process_archive_to_buffer(&zip, &RunOptions { config: &config, search: None }).unwrap_err();
    assert!(matches!(err, RunError::NoUsableSources));
}

#[test]
fn unreadable_database_aborts() {
    let dir = TempDir::new().unwrap();
    let zip = write_zip(
        dir.path(),
        &[
            ("DATABASE.xlsx", b"not a workbook".to_vec()),
            ("GL-D251110.csv", source_csv(&[source_line("R", "C", "1", "d")])),
        ],
    );
    let config = LayoutConfig::default();
    let err = process_archive_to_buffer(&zip, &RunOptions { config: &config, search: None }).unwrap_err();
    assert!(matches!(err, RunError::DatabaseRead { .. }));
}

#[test]
fn all_sources_skipped_is_no_sheets() {
    let dir = TempDir::new().unwrap();
    let zip = write_zip(
        dir.path(),
        &[("DATABASE.xlsx", database_xlsx(&["x"])), ("GL-D251110.csv", Vec::new())],
    );
    let config = LayoutConfig::default();
    let err = process_archive_to_buffer(&zip, &RunOptions { config: &config, search: None }).unwrap_err();
    assert!(matches!(err, RunError::NoSheets { skipped: 1 }));
}

#[test]
fn corrupt_zip_is_an_archive_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.zip");
    std::fs::write(&path, "nope").unwrap();
    let config = LayoutConfig::default();
    let err = plan_archive(&path, &config).unwrap_err();
    assert!(matches!(err, RunError::Archive(_)));
}

#[test]
fn unknown_encoding_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    let zip = standard_archive(dir.path());
    let mut config = LayoutConfig::default();
    config.input.fallback_encoding = "klingon".into();
    let err = process_archive_to_buffer(&zip, &RunOptions { config: &config, search: None }).unwrap_err();
    assert!(matches!(err, RunError::Config(_)));
}

// -------------------------------------------------------------------------
// Dry run
// -------------------------------------------------------------------------

#[test]
fn plan_reports_selection_and_sheets() {
    let dir = TempDir::new().unwrap();
    let zip = standard_archive(dir.path());
    let plan = plan_archive(&zip, &LayoutConfig::default()).unwrap();

    assert_eq!(plan.database_sheets, vec!["D251110", "251109"]);
    assert_eq!(plan.dropped, vec!["GLJV20251220_ATMI-D251110.csv", "notes.pdf"]);
    assert_eq!(plan.sources.len(), 2);
    assert_eq!(plan.sources[0].sheet, "251110");
    assert_eq!(plan.sources[0].jv_date.as_deref(), Some("251221"));
    assert_eq!(plan.sources[0].database_sheet.as_deref(), Some("D251110"));
    assert_eq!(plan.sources[1].database_sheet, None);

    let json = serde_json::to_value(&plan).unwrap();
    assert_eq!(json["sources"][0]["database_candidates"][1], "D251110");
}

#[test]
fn summary_serializes_with_status_tag() {
    let dir = TempDir::new().unwrap();
    let zip = standard_archive(dir.path());
    let config = LayoutConfig::default();
    let (_, summary) = process_archive_to_buffer(&zip, &RunOptions { config: &config, search: None }).unwrap();
    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["sheets"][0]["status"], "written");
    assert_eq!(json["sheets"][0]["sheet"], "251110");
}
