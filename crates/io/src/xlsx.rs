// Excel input (xlsx, xls, xlsb, ods) and workbook output (xlsx only)
//
// Input: every cell is flattened to the text a user would see, so both
// spreadsheet and delimited sources feed the same grid-based extractors.
// Output: renders planned sheets; no knowledge of the matching itself.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Range, Reader, Sheets};
use glmatch_recon::layout::{Align, CellContent, CellStyle, SheetPlan};
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Formula, Workbook, Worksheet};

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// An open spreadsheet, read one sheet at a time.
pub struct SpreadsheetFile {
    path: PathBuf,
    book: Sheets<BufReader<File>>,
}

impl SpreadsheetFile {
    pub fn open(path: &Path) -> Result<Self, String> {
        let book = open_workbook_auto(path).map_err(|e| format!("Failed to open Excel file: {}", e))?;
        Ok(Self {
            path: path.to_path_buf(),
            book,
        })
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.book.sheet_names().to_vec()
    }

    /// Cell text of a named sheet.
    pub fn read_grid(&mut self, sheet_name: &str) -> Result<Vec<Vec<String>>, String> {
        let range = self
            .book
            .worksheet_range(sheet_name)
            .map_err(|e| format!("Failed to read sheet '{}' of {}: {}", sheet_name, self.path.display(), e))?;
        Ok(range_to_grid(&range))
    }

    /// Cell text of the first sheet.
    pub fn read_first_grid(&mut self) -> Result<Vec<Vec<String>>, String> {
        let first = self
            .book
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| format!("{} contains no sheets", self.path.display()))?;
        self.read_grid(&first)
    }
}

/// Flatten a used range into rows of text.
///
/// Leading empty columns are restored so column letters keep their meaning;
/// leading empty rows are not.
fn range_to_grid(range: &Range<Data>) -> Vec<Vec<String>> {
    let first_col = range.start().map(|(_, c)| c as usize).unwrap_or(0);
    range
        .rows()
        .map(|row| {
            let mut out = vec![String::new(); first_col];
            out.extend(row.iter().map(cell_text));
            out
        })
        .collect()
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(n) => {
            // Integers without decimals
            if n.fract() == 0.0 && n.abs() < 1e15 {
                format!("{}", *n as i64)
            } else {
                format!("{}", n)
            }
        }
        Data::Int(n) => n.to_string(),
        Data::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        Data::Error(e) => e.to_string(),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(datetime) => datetime.to_string(),
            None => dt.as_f64().to_string(),
        },
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn build_format(style: &CellStyle) -> Format {
    let mut format = Format::new();

    if style.bold {
        format = format.set_bold();
    }
    if style.italic {
        format = format.set_italic();
    }
    if let Some(size) = style.font_size {
        format = format.set_font_size(size as f64);
    }

    format = match style.align {
        Align::General => format,
        Align::Left => format.set_align(FormatAlign::Left),
        Align::Center => format.set_align(FormatAlign::Center),
        Align::Right => format.set_align(FormatAlign::Right),
    };
    if style.vcenter {
        format = format.set_align(FormatAlign::VerticalCenter);
    }

    if style.border {
        format = format.set_border(FormatBorder::Thin);
    }
    if let Some(rgb) = style.fill {
        format = format.set_background_color(Color::RGB(rgb));
    }
    if let Some(num_format) = style.num_format {
        format = format.set_num_format(num_format);
    }

    format
}

fn write_sheet(worksheet: &mut Worksheet, plan: &SheetPlan) -> Result<usize, String> {
    let mut formats: HashMap<&CellStyle, Format> = HashMap::new();
    let mut cells_written = 0;

    for cell in &plan.cells {
        let format = formats.entry(&cell.style).or_insert_with(|| build_format(&cell.style));
        let (row, col) = (cell.row, cell.col);
        let err = |e: rust_xlsxwriter::XlsxError| format!("Failed to write cell ({}, {}) of '{}': {}", row, col, plan.name, e);

        match &cell.content {
            CellContent::Blank => {
                worksheet.write_blank(row, col, format).map_err(err)?;
            }
            CellContent::Text(s) => {
                worksheet.write_string_with_format(row, col, s, format).map_err(err)?;
            }
            CellContent::Number(n) => {
                worksheet.write_number_with_format(row, col, *n, format).map_err(err)?;
            }
            CellContent::Formula { formula, cached } => {
                let source = formula.strip_prefix('=').unwrap_or(formula);
                let formula = Formula::new(source).set_result(cached.display());
                worksheet.write_formula_with_format(row, col, formula, format).map_err(err)?;
            }
        }
        cells_written += 1;
    }

    for (&col, &width) in &plan.column_widths {
        worksheet
            .set_column_width(col, width)
            .map_err(|e| format!("Failed to set column {} width: {}", col, e))?;
    }

    Ok(cells_written)
}

/// Render one plan as a standalone worksheet.
///
/// Everything the writer rejects (sheet names, string lengths, row limits)
/// fails here, before the sheet joins a workbook.
pub fn render_sheet(plan: &SheetPlan) -> Result<Worksheet, String> {
    let mut worksheet = Worksheet::new();
    worksheet
        .set_name(&plan.name)
        .map_err(|e| format!("Failed to create sheet '{}': {}", plan.name, e))?;
    let cells = write_sheet(&mut worksheet, plan)?;
    log::debug!("sheet '{}': {} cells", plan.name, cells);
    Ok(worksheet)
}

/// Collect rendered worksheets into a workbook, in order.
pub fn build_workbook(sheets: Vec<Worksheet>) -> Workbook {
    let mut workbook = Workbook::new();
    for sheet in sheets {
        workbook.push_worksheet(sheet);
    }
    workbook
}

pub fn render_to_buffer(sheets: Vec<Worksheet>) -> Result<Vec<u8>, String> {
    build_workbook(sheets)
        .save_to_buffer()
        .map_err(|e| format!("Failed to build XLSX: {}", e))
}

pub fn render(sheets: Vec<Worksheet>, path: &Path) -> Result<(), String> {
    build_workbook(sheets)
        .save(path)
        .map_err(|e| format!("Failed to save XLSX file: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use glmatch_recon::layout::{plan_sheet, SheetInputs};
    use glmatch_recon::{KeyedTable, LayoutConfig, Table, Value};

    fn source_table() -> KeyedTable {
        let mut t = Table::new("src", vec!["RC".into(), "DR".into(), "Seq".into(), "Details".into()]);
        t.push_row(vec![Value::text("R1"), Value::Number(1250.0), Value::text("77"), Value::text("seq_num:77")]);
        t.push_row(vec![Value::text("R2"), Value::Number(3.5), Value::text("78"), Value::text("seq_num:78")]);
        KeyedTable::by_header(t, "Seq").unwrap()
    }

    #[test]
    fn test_cell_text_variants() {
        assert_eq!(cell_text(&Data::Float(42.0)), "42");
        assert_eq!(cell_text(&Data::Float(0.25)), "0.25");
        assert_eq!(cell_text(&Data::Int(-7)), "-7");
        assert_eq!(cell_text(&Data::Bool(true)), "TRUE");
        assert_eq!(cell_text(&Data::Empty), "");
        assert_eq!(cell_text(&Data::String(" x ".into())), " x ");
    }

    #[test]
    fn test_build_format_does_not_panic_for_every_style() {
        let config = LayoutConfig::default();
        let src = source_table();
        let plan = plan_sheet(&SheetInputs { name: "s", database: None, source: &src, search: None }, &config);
        for cell in &plan.cells {
            let _ = build_format(&cell.style);
        }
    }

    #[test]
    fn test_rendered_sheet_reads_back() {
        let config = LayoutConfig::default();
        let src = source_table();
        let plan = plan_sheet(
            &SheetInputs { name: "251110", database: None, source: &src, search: Some("78") },
            &config,
        );

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xlsx");
        render(vec![render_sheet(&plan).unwrap()], &path).unwrap();

        let mut book = SpreadsheetFile::open(&path).unwrap();
        assert_eq!(book.sheet_names(), vec!["251110".to_string()]);
        let grid = book.read_grid("251110").unwrap();

        assert_eq!(grid[0][0], "Search SEQ");
        assert_eq!(grid[0][1], "78");

        // Cached formula result for rank 1 of "78" in the first report row
        let first_report_row = 7;
        assert_eq!(grid[first_report_row][0], "R2");

        let raw = plan.source_data.unwrap();
        assert_eq!(grid[raw.first as usize - 1][0], "R1");
        assert_eq!(grid[raw.first as usize - 1][1], "1250");
    }

    #[test]
    fn test_rendered_formulas_keep_text() {
        let config = LayoutConfig::default();
        let src = source_table();
        let plan = plan_sheet(&SheetInputs { name: "f", database: None, source: &src, search: None }, &config);
        let bytes = render_to_buffer(vec![render_sheet(&plan).unwrap()]).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.xlsx");
        std::fs::write(&path, bytes).unwrap();

        let mut book: Sheets<_> = open_workbook_auto(&path).unwrap();
        let formulas = book.worksheet_formula("f").unwrap();
        let found = formulas
            .rows()
            .flatten()
            .any(|f| f.starts_with("IFERROR(INDEX(") && f.contains(r#"$B$1&"|"&1"#));
        assert!(found);
    }

    #[test]
    fn test_oversized_text_fails_its_sheet_only() {
        let config = LayoutConfig::default();
        let mut t = Table::new("src", vec!["RC".into(), "Seq".into(), "Details".into()]);
        t.push_row(vec![Value::text("R1"), Value::text("1"), Value::text("x".repeat(40_000))]);
        let src = KeyedTable::by_header(t, "Seq").unwrap();
        let plan = plan_sheet(&SheetInputs { name: "big", database: None, source: &src, search: None }, &config);

        let err = render_sheet(&plan).err().expect("expected render_sheet to fail");
        assert!(err.contains("'big'"), "{err}");
    }

    #[test]
    fn test_invalid_sheet_name_is_rejected_before_writing() {
        let config = LayoutConfig::default();
        let src = source_table();
        let plan = plan_sheet(&SheetInputs { name: "'quoted'", database: None, source: &src, search: None }, &config);
        assert!(render_sheet(&plan).is_err());
    }

    #[test]
    fn test_read_grid_restores_leading_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("src.xlsx");
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 2, "C1").unwrap();
        sheet.write_number(1, 3, 12.0).unwrap();
        workbook.save(&path).unwrap();

        let mut book = SpreadsheetFile::open(&path).unwrap();
        let grid = book.read_first_grid().unwrap();
        assert_eq!(grid[0][2], "C1");
        assert_eq!(grid[1][3], "12");
        assert_eq!(grid[0][0], "");
    }

    #[test]
    fn test_duplicate_sheet_name_is_rejected() {
        let config = LayoutConfig::default();
        let src = source_table();
        let plan = plan_sheet(&SheetInputs { name: "same", database: None, source: &src, search: None }, &config);
        let sheets = vec![render_sheet(&plan).unwrap(), render_sheet(&plan).unwrap()];
        assert!(render_to_buffer(sheets).is_err());
    }
}
