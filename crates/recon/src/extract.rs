//! Column extraction for the two table kinds.
//!
//! Input grids are rows of cell text exactly as read from the file. Both
//! extractors slice fixed spreadsheet letters, then apply the per-kind cleanup.

use std::sync::OnceLock;

use regex::Regex;

use crate::columns::{col_to_index, index_to_col};
use crate::config::{DatabaseConfig, SourceConfig, DETAILS_HEADER, RAW_DETAIL_HEADER, SEQ_HEADER};
use crate::error::ReconError;
use crate::table::{Table, Value};

fn seq_num_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"seq_num:([0-9]+)").unwrap())
}

/// Rescale an implied-decimal value.
///
/// Only all-digit text starting with `00` is divided by 100; anything else is
/// returned as trimmed text, even when it looks numeric.
pub fn implied_decimal(raw: &str) -> Value {
    let text = raw.trim();
    let all_digits = !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit());
    if !all_digits || !text.starts_with("00") {
        return Value::text(text);
    }
    match text.parse::<f64>() {
        Ok(n) => Value::Number(n / 100.0),
        Err(_) => Value::text(text),
    }
}

/// Sequence number embedded in a detail string (`...seq_num:1234...`), or the
/// trimmed detail when there is none.
pub fn extract_seq_num(detail: &str) -> String {
    match seq_num_re().captures(detail).and_then(|c| c.get(1)) {
        Some(m) => m.as_str().to_string(),
        None => detail.trim().to_string(),
    }
}

/// Parse a numeric source cell; blanks and garbage become 0.
fn parse_amount(raw: &str) -> f64 {
    match raw.trim().replace(',', "").parse::<f64>() {
        Ok(n) if n.is_finite() => n,
        _ => 0.0,
    }
}

/// Restrict every row to the given letters, in that order.
///
/// Rows shorter than a requested column get empty text there. Rows whose
/// selected cells are all blank are dropped.
pub fn extract_columns(grid: &[Vec<String>], letters: &[String]) -> Result<Vec<Vec<String>>, ReconError> {
    let indices = letters
        .iter()
        .map(|l| col_to_index(l))
        .collect::<Result<Vec<usize>, ReconError>>()?;

    Ok(grid
        .iter()
        .map(|row| {
            indices
                .iter()
                .map(|&i| row.get(i).cloned().unwrap_or_default())
                .collect::<Vec<String>>()
        })
        .filter(|row| row.iter().any(|cell| !cell.trim().is_empty()))
        .collect())
}

/// Build the database table from one database sheet.
///
/// The first grid row holds the headers. Cells are trimmed and the configured
/// implied-decimal columns are rescaled.
pub fn extract_database(sheet_name: &str, grid: &[Vec<String>], config: &DatabaseConfig) -> Result<Table, ReconError> {
    let header_row: Vec<String> = match grid.first() {
        Some(first) => extract_columns(std::slice::from_ref(first), &config.columns)?
            .into_iter()
            .next()
            .unwrap_or_else(|| vec![String::new(); config.columns.len()]),
        None => vec![String::new(); config.columns.len()],
    };

    // Unnamed header cells fall back to the column letter
    let headers: Vec<String> = header_row
        .iter()
        .zip(&config.columns)
        .map(|(h, letter)| {
            let h = h.trim();
            if h.is_empty() {
                col_to_index(letter).map(index_to_col).unwrap_or_else(|_| letter.clone())
            } else {
                h.to_string()
            }
        })
        .collect();

    let decimal_positions = config.implied_decimal_positions();
    let mut table = Table::new(sheet_name, headers);

    let body = grid.get(1..).unwrap_or(&[]);
    for row in extract_columns(body, &config.columns)? {
        let values = row
            .iter()
            .enumerate()
            .map(|(pos, cell)| {
                if decimal_positions.contains(&pos) {
                    implied_decimal(cell)
                } else {
                    Value::text(cell.trim())
                }
            })
            .collect();
        table.push_row(values);
    }

    log::debug!("database sheet '{}': {} rows", sheet_name, table.len());
    Ok(table)
}

/// Build the source table from a header-less source grid.
///
/// Columns are named from the config, the raw detail column is split into
/// `Seq` and `Details`, amounts are parsed and rows sorted.
pub fn extract_source(file_name: &str, grid: &[Vec<String>], config: &SourceConfig) -> Result<Table, ReconError> {
    let rows = extract_columns(grid, &config.columns)?;
    if rows.is_empty() {
        return Err(ReconError::EmptySource);
    }

    let mut table = Table::new(file_name, config.headers.clone());
    let raw_idx = table.require_column(RAW_DETAIL_HEADER)?;
    let numeric: Vec<usize> = config
        .numeric_columns
        .iter()
        .map(|name| table.require_column(name))
        .collect::<Result<_, _>>()?;

    let mut seqs = Vec::with_capacity(rows.len());
    let mut details = Vec::with_capacity(rows.len());

    for row in rows {
        seqs.push(Value::text(extract_seq_num(&row[raw_idx])));
        details.push(Value::text(row[raw_idx].clone()));

        let values = row
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                if numeric.contains(&i) {
                    Value::Number(parse_amount(cell))
                } else if i == raw_idx {
                    Value::text(cell.clone())
                } else {
                    Value::text(cell.trim())
                }
            })
            .collect();
        table.push_row(values);
    }

    table.push_column(SEQ_HEADER, seqs);
    table.push_column(DETAILS_HEADER, details);

    let final_headers = config.final_headers();
    let order: Vec<&str> = final_headers.iter().map(|s| s.as_str()).collect();
    table.reorder(&order);
    table.sort_by_columns(&config.sort_by);

    log::debug!("source '{}': {} rows", file_name, table.len());
    Ok(table)
}
