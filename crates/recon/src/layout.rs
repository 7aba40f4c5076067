//! Sheet layout planning.
//!
//! A sheet is planned top to bottom:
//!
//! ```text
//! row 1          search prompt | search box
//! row 3..        database report: title, header, one formula row per rank
//!                (gap rows)
//!                source report: title, header, one formula row per rank
//! raw_start-1..  raw database table (label, header, data)
//!                raw source table (label, header, data)
//! ```
//!
//! Report cells are `INDEX/MATCH` formulas against the `_SearchKey` column of
//! the raw tables, so the planner has to know the raw table positions before
//! it can emit a single formula. All positions here are computed 1-based
//! (spreadsheet rows) and stored 0-based in [`PlannedCell`].

use std::collections::BTreeMap;

use crate::columns::{absolute_cell, absolute_range};
use crate::config::{LayoutConfig, DETAILS_HEADER, SEARCH_KEY_HEADER, SEQ_HEADER};
use crate::filename::{fallback_sheet_name, file_stem};
use crate::keys::KeyedTable;
use crate::lookup::{formula_result, LookupIndex};
use crate::select::SelectedFile;
use crate::table::Value;

/// Excel's sheet name length limit.
pub const MAX_SHEET_NAME_LEN: usize = 31;

pub const TEXT_FORMAT: &str = "@";
pub const AMOUNT_FORMAT: &str = "#,##0.00";
pub const SEARCH_FILL: u32 = 0xFFFF00;
pub const HEADER_FILL: u32 = 0xD9D9D9;

const SEARCH_ROW: u32 = 1;
const SEARCH_LABEL_COL: usize = 0;
const SEARCH_BOX_COL: usize = 1;
const REPORT_START_ROW: u32 = SEARCH_ROW + 2;
/// Title row plus header row above each block of report rows.
const REPORT_CHROME_ROWS: u32 = 2;
/// Blank rows between the report area and the first raw table.
const RAW_SECTION_MARGIN: u32 = 5;
/// Rows between one raw table's header and the next raw table's header, beyond its data.
const RAW_TABLE_SPACING: u32 = 4;

const MIN_COLUMN_WIDTH: f64 = 12.0;
const MAX_COLUMN_WIDTH: f64 = 60.0;
const WIDTH_PADDING: usize = 3;
const DEFAULT_EDGE_WIDTH: usize = 20;
const MIN_COL_A_WIDTH: usize = 30;
const MIN_COL_B_WIDTH: usize = 25;
const DETAILS_WIDTH: f64 = 12.0;

// ---------------------------------------------------------------------------
// Plan types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Align {
    #[default]
    General,
    Left,
    Center,
    Right,
}

/// Renderer-neutral cell style.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct CellStyle {
    pub bold: bool,
    pub italic: bool,
    pub font_size: Option<u8>,
    pub border: bool,
    pub align: Align,
    pub vcenter: bool,
    pub num_format: Option<&'static str>,
    /// Solid background, 0xRRGGBB.
    pub fill: Option<u32>,
}

impl CellStyle {
    fn bordered(align: Align) -> Self {
        Self {
            border: true,
            align,
            vcenter: true,
            ..Self::default()
        }
    }

    fn with_format(mut self, format: &'static str) -> Self {
        self.num_format = Some(format);
        self
    }

    fn search_label() -> Self {
        Self {
            bold: true,
            font_size: Some(12),
            align: Align::Right,
            ..Self::default()
        }
    }

    fn search_box() -> Self {
        Self {
            fill: Some(SEARCH_FILL),
            ..Self::bordered(Align::Center).with_format(TEXT_FORMAT)
        }
    }

    fn section_title() -> Self {
        Self {
            bold: true,
            font_size: Some(14),
            ..Self::default()
        }
    }

    fn raw_title() -> Self {
        Self {
            bold: true,
            italic: true,
            ..Self::default()
        }
    }

    fn report_header() -> Self {
        Self {
            bold: true,
            fill: Some(HEADER_FILL),
            ..Self::bordered(Align::Center)
        }
    }

    fn table_header() -> Self {
        Self {
            bold: true,
            ..Self::bordered(Align::Center)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CellContent {
    Blank,
    Text(String),
    Number(f64),
    /// Formula text (with leading `=`) and the value it evaluates to for the
    /// preset search value.
    Formula { formula: String, cached: Value },
}

impl From<&Value> for CellContent {
    fn from(value: &Value) -> Self {
        match value {
            Value::Empty => CellContent::Blank,
            Value::Text(s) => CellContent::Text(s.clone()),
            Value::Number(n) => CellContent::Number(*n),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedCell {
    /// 0-based row.
    pub row: u32,
    /// 0-based column.
    pub col: u16,
    pub content: CellContent,
    pub style: CellStyle,
}

/// 1-based inclusive data rows of a raw table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowSpan {
    pub first: u32,
    pub last: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SheetPlan {
    pub name: String,
    pub cells: Vec<PlannedCell>,
    /// 0-based column -> width in characters.
    pub column_widths: BTreeMap<u16, f64>,
    pub database_data: Option<RowSpan>,
    pub source_data: Option<RowSpan>,
    /// Formula rows reserved per report section (0 when the section is absent).
    pub database_report_rows: usize,
    pub source_report_rows: usize,
}

impl SheetPlan {
    /// Cell at a 0-based position.
    pub fn cell(&self, row: u32, col: u16) -> Option<&PlannedCell> {
        self.cells.iter().find(|c| c.row == row && c.col == col)
    }
}

/// What one sheet is built from.
#[derive(Debug, Clone, Copy)]
pub struct SheetInputs<'a> {
    pub name: &'a str,
    /// Matched database table, if any.
    pub database: Option<&'a KeyedTable>,
    pub source: &'a KeyedTable,
    /// Value preset into the search box; cached formula results follow it.
    pub search: Option<&'a str>,
}

// ---------------------------------------------------------------------------
// Sheet names and database sheet resolution
// ---------------------------------------------------------------------------

/// Sheet name a source file asks for: its `D` date, else its file stem.
pub fn desired_sheet_name(file: &SelectedFile) -> String {
    match &file.dates.d_date {
        Some(d) => d.clone(),
        None => file_stem(&file.file_name).to_string(),
    }
}

/// Database sheets to try for a source file, in priority order.
pub fn database_sheet_candidates(file: &SelectedFile) -> Vec<String> {
    let mut candidates = Vec::new();
    if let Some(d) = &file.dates.d_date {
        candidates.push(d.clone());
        candidates.push(format!("D{d}"));
    }
    let fallback = fallback_sheet_name(&file.file_name);
    if !fallback.is_empty() {
        candidates.push(fallback);
    }
    candidates
}

/// First candidate present among the database's sheet names.
pub fn resolve_database_sheet(candidates: &[String], available: &[String]) -> Option<String> {
    candidates.iter().find(|c| available.contains(c)).cloned()
}

/// Replace characters Excel forbids in sheet names and cap the length.
pub fn sanitize_sheet_name(desired: &str) -> String {
    let cleaned: String = desired
        .trim()
        .chars()
        .map(|c| match c {
            '[' | ']' | ':' | '*' | '?' | '/' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim_matches('\'');
    let base = if cleaned.is_empty() { "Sheet" } else { cleaned };
    // Truncation can expose an apostrophe, which may not end a name either
    let capped: String = base.chars().take(MAX_SHEET_NAME_LEN).collect();
    capped.trim_end_matches('\'').to_string()
}

/// A sheet name not yet in `existing` (case-insensitive), suffixing `_2`, `_3`, ...
/// within the length budget.
pub fn unique_sheet_name(existing: &[String], desired: &str) -> String {
    let base = sanitize_sheet_name(desired);
    let taken = |name: &str| {
        let lower = name.to_lowercase();
        existing.iter().any(|e| e.to_lowercase() == lower)
    };

    if !taken(&base) {
        return base;
    }

    let mut i = 2;
    loop {
        let suffix = format!("_{i}");
        let keep = MAX_SHEET_NAME_LEN.saturating_sub(suffix.chars().count());
        let name: String = base.chars().take(keep).chain(suffix.chars()).collect();
        if !taken(&name) {
            return name;
        }
        i += 1;
    }
}

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

struct Planner {
    cells: Vec<PlannedCell>,
}

impl Planner {
    /// Place a cell at a 1-based row and 0-based column.
    fn put(&mut self, row: u32, col: usize, content: CellContent, style: CellStyle) {
        self.cells.push(PlannedCell {
            row: row - 1,
            col: col as u16,
            content,
            style,
        });
    }
}

/// How a column's cells are styled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    /// Centered; numbers right-aligned.
    Plain,
    /// Centered, text format.
    Code,
    /// Right-aligned, thousands separator, two decimals.
    Amount,
    /// Left-aligned, text format.
    Detail,
}

impl ColumnKind {
    fn style(self, value: Option<&Value>) -> CellStyle {
        match self {
            ColumnKind::Plain if value.is_some_and(Value::is_number) => CellStyle::bordered(Align::Right),
            ColumnKind::Plain => CellStyle::bordered(Align::Center),
            ColumnKind::Code => CellStyle::bordered(Align::Center).with_format(TEXT_FORMAT),
            ColumnKind::Amount => CellStyle::bordered(Align::Right).with_format(AMOUNT_FORMAT),
            ColumnKind::Detail => CellStyle::bordered(Align::Left).with_format(TEXT_FORMAT),
        }
    }
}

fn database_kinds(table: &KeyedTable) -> Vec<ColumnKind> {
    (0..table.table.width())
        .map(|i| {
            if i == table.key_column || i == table.search_key_column {
                ColumnKind::Code
            } else {
                ColumnKind::Plain
            }
        })
        .collect()
}

fn source_kinds(table: &KeyedTable, config: &LayoutConfig) -> Vec<ColumnKind> {
    table
        .table
        .headers
        .iter()
        .map(|h| {
            if config.source.numeric_columns.contains(h) {
                ColumnKind::Amount
            } else if h == DETAILS_HEADER {
                ColumnKind::Detail
            } else if h == SEQ_HEADER || h == SEARCH_KEY_HEADER {
                ColumnKind::Code
            } else {
                ColumnKind::Plain
            }
        })
        .collect()
}

/// Database columns shown in the report, as positions into the raw table.
fn database_display_columns(table: &KeyedTable, config: &LayoutConfig) -> Vec<usize> {
    let headers = &table.table.headers;
    let mut cols: Vec<usize> = (0..headers.len())
        .filter(|&i| i != table.search_key_column)
        .filter(|&i| !config.database.excluded_display_columns.contains(&headers[i]))
        .collect();

    if let Some([a, b]) = &config.database.swap_display_columns {
        let pa = cols.iter().position(|&i| &headers[i] == a);
        let pb = cols.iter().position(|&i| &headers[i] == b);
        if let (Some(pa), Some(pb)) = (pa, pb) {
            cols.swap(pa, pb);
        }
    }
    cols
}

fn source_display_columns(table: &KeyedTable) -> Vec<usize> {
    (0..table.table.width())
        .filter(|&i| i != table.search_key_column)
        .collect()
}

/// One report block: title, header row, `rows` formula rows.
struct ReportSection<'a> {
    title: &'a str,
    table: &'a KeyedTable,
    display: Vec<usize>,
    kinds: Vec<ColumnKind>,
    data: RowSpan,
    rows: usize,
    /// Report cells of plain columns are always centered.
    center_plain: bool,
}

fn lookup_formula(search_cell: &str, rank: usize, data_range: &str, key_range: &str) -> String {
    format!(r#"=IFERROR(INDEX({data_range}, MATCH({search_cell}&"|"&{rank}, {key_range}, 0)), "")"#)
}

/// Write a report block starting at `top`; returns the first row after it.
fn write_report(planner: &mut Planner, top: u32, section: &ReportSection<'_>, search: &str) -> u32 {
    planner.put(top, 0, CellContent::Text(section.title.to_string()), CellStyle::section_title());

    for (i, &col) in section.display.iter().enumerate() {
        planner.put(
            top + 1,
            i,
            CellContent::Text(section.table.table.headers[col].clone()),
            CellStyle::report_header(),
        );
    }

    let search_cell = absolute_cell(SEARCH_BOX_COL, SEARCH_ROW);
    let key_range = absolute_range(section.table.search_key_column, section.data.first, section.data.last);
    let index = LookupIndex::new(section.table);
    let data_top = top + REPORT_CHROME_ROWS;

    for offset in 0..section.rows {
        let rank = offset + 1;
        let row = data_top + offset as u32;
        let matched = index.get(search, rank);
        for (i, &col) in section.display.iter().enumerate() {
            let data_range = absolute_range(col, section.data.first, section.data.last);
            let style = match section.kinds[col] {
                ColumnKind::Plain | ColumnKind::Code if section.center_plain => CellStyle::bordered(Align::Center),
                kind => kind.style(None),
            };
            planner.put(
                row,
                i,
                CellContent::Formula {
                    formula: lookup_formula(&search_cell, rank, &data_range, &key_range),
                    cached: formula_result(matched, col),
                },
                style,
            );
        }
    }

    data_top + section.rows as u32
}

/// Write a raw table with its label above the header row.
fn write_raw_table(planner: &mut Planner, header_row: u32, label: &str, table: &KeyedTable, kinds: &[ColumnKind]) {
    planner.put(header_row - 1, 0, CellContent::Text(label.to_string()), CellStyle::raw_title());

    for (col, header) in table.table.headers.iter().enumerate() {
        planner.put(header_row, col, CellContent::Text(header.clone()), CellStyle::table_header());
    }

    for (offset, row) in table.table.rows.iter().enumerate() {
        let sheet_row = header_row + 1 + offset as u32;
        for (col, value) in row.iter().enumerate() {
            planner.put(sheet_row, col, CellContent::from(value), kinds[col].style(Some(value)));
        }
    }
}

/// Raw width per column: longest header or value plus padding.
fn measure_widths(widths: &mut BTreeMap<usize, usize>, table: &KeyedTable, skip: Option<usize>) {
    for (col, header) in table.table.headers.iter().enumerate() {
        if Some(col) == skip {
            continue;
        }
        let longest = table
            .table
            .column(col)
            .map(|v| v.display().chars().count())
            .chain(std::iter::once(header.chars().count()))
            .max()
            .unwrap_or(0);
        let entry = widths.entry(col).or_insert(0);
        *entry = (*entry).max(longest + WIDTH_PADDING);
    }
}

fn column_widths(database: Option<&KeyedTable>, source: Option<&KeyedTable>) -> BTreeMap<u16, f64> {
    let mut raw: BTreeMap<usize, usize> = BTreeMap::new();
    if let Some(db) = database {
        measure_widths(&mut raw, db, None);
    }
    let details = source.and_then(|s| s.table.column_index(DETAILS_HEADER));
    if let Some(src) = source {
        measure_widths(&mut raw, src, details);
    }

    let mut out: BTreeMap<u16, f64> = raw
        .iter()
        .map(|(&col, &w)| (col as u16, (w as f64).clamp(MIN_COLUMN_WIDTH, MAX_COLUMN_WIDTH)))
        .collect();

    let a = raw.get(&0).copied().unwrap_or(DEFAULT_EDGE_WIDTH).max(MIN_COL_A_WIDTH);
    let b = raw.get(&1).copied().unwrap_or(DEFAULT_EDGE_WIDTH).max(MIN_COL_B_WIDTH);
    out.insert(0, a as f64);
    out.insert(1, b as f64);

    if let Some(col) = details {
        out.insert(col as u16, DETAILS_WIDTH);
    }
    out
}

/// Lay out one sheet: search box, report sections, raw tables, widths.
pub fn plan_sheet(inputs: &SheetInputs<'_>, config: &LayoutConfig) -> SheetPlan {
    let database = inputs.database.filter(|t| !t.table.is_empty());
    let source = Some(inputs.source).filter(|t| !t.table.is_empty());
    let search = inputs.search.unwrap_or("");
    let gap = config.layout.gap_rows as u32;

    let db_rows = database.map(|t| t.reserved_rows(config.layout.database_reserved_rows));
    let src_rows = source.map(|t| t.reserved_rows(config.layout.source_reserved_rows));

    let db_ui_height = REPORT_CHROME_ROWS + db_rows.unwrap_or(0) as u32;
    let src_ui_height = REPORT_CHROME_ROWS + src_rows.unwrap_or(0) as u32;
    let raw_start = SEARCH_ROW + db_ui_height + gap + src_ui_height + RAW_SECTION_MARGIN;

    let mut planner = Planner { cells: Vec::new() };

    // Raw tables first: report formulas need their ranges
    let mut header_row = raw_start;
    let database_data = database.map(|db| {
        write_raw_table(&mut planner, header_row, &config.database.title, db, &database_kinds(db));
        let span = RowSpan {
            first: header_row + 1,
            last: header_row + db.table.len() as u32,
        };
        header_row += db.table.len() as u32 + RAW_TABLE_SPACING;
        span
    });
    let source_data = source.map(|src| {
        write_raw_table(&mut planner, header_row, &config.source.raw_title, src, &source_kinds(src, config));
        RowSpan {
            first: header_row + 1,
            last: header_row + src.table.len() as u32,
        }
    });

    // Search box
    planner.put(
        SEARCH_ROW,
        SEARCH_LABEL_COL,
        CellContent::Text(config.layout.search_label.clone()),
        CellStyle::search_label(),
    );
    let search_content = match inputs.search {
        Some(s) if !s.is_empty() => CellContent::Text(s.to_string()),
        _ => CellContent::Blank,
    };
    planner.put(SEARCH_ROW, SEARCH_BOX_COL, search_content, CellStyle::search_box());

    // Reports
    let mut report_row = REPORT_START_ROW;
    if let (Some(db), Some(data), Some(rows)) = (database, database_data, db_rows) {
        let section = ReportSection {
            title: &config.database.title,
            table: db,
            display: database_display_columns(db, config),
            kinds: database_kinds(db),
            data,
            rows,
            center_plain: true,
        };
        report_row = write_report(&mut planner, report_row, &section, search);
    }
    report_row += gap;
    if let (Some(src), Some(data), Some(rows)) = (source, source_data, src_rows) {
        let section = ReportSection {
            title: &config.source.title,
            table: src,
            display: source_display_columns(src),
            kinds: source_kinds(src, config),
            data,
            rows,
            center_plain: false,
        };
        write_report(&mut planner, report_row, &section, search);
    }

    planner.cells.sort_by_key(|c| (c.row, c.col));

    SheetPlan {
        name: inputs.name.to_string(),
        cells: planner.cells,
        column_widths: column_widths(database, source),
        database_data,
        source_data,
        database_report_rows: db_rows.unwrap_or(0),
        source_report_rows: src_rows.unwrap_or(0),
    }
}
