// Spreadsheet column letters and absolute range references

use crate::error::ReconError;

/// Convert column letter(s) to a 0-based index: A=0, Z=25, AA=26, AZ=51.
pub fn col_to_index(letters: &str) -> Result<usize, ReconError> {
    let trimmed = letters.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_alphabetic()) {
        return Err(ReconError::InvalidColumn(letters.to_string()));
    }

    let mut n: usize = 0;
    for b in trimmed.bytes() {
        let digit = (b.to_ascii_uppercase() - b'A') as usize + 1;
        n = n
            .checked_mul(26)
            .and_then(|n| n.checked_add(digit))
            .ok_or_else(|| ReconError::InvalidColumn(letters.to_string()))?;
    }
    Ok(n - 1)
}

/// Convert a 0-based column index to Excel-style letter(s).
pub fn index_to_col(col: usize) -> String {
    let mut result = String::new();
    let mut n = col;
    loop {
        result.insert(0, (b'A' + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    result
}

/// Absolute single-column range, e.g. `$C$20:$C$31`. Rows are 1-based.
pub fn absolute_range(col: usize, first_row: u32, last_row: u32) -> String {
    let letters = index_to_col(col);
    format!("${letters}${first_row}:${letters}${last_row}")
}

/// Absolute single-cell reference, e.g. `$B$1`. Row is 1-based.
pub fn absolute_cell(col: usize, row: u32) -> String {
    format!("${}${}", index_to_col(col), row)
}
