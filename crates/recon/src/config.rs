use serde::{Deserialize, Serialize};

use crate::columns::col_to_index;
use crate::error::ReconError;

/// Header of the raw detail column the derived `Seq`/`Details` come from.
pub const RAW_DETAIL_HEADER: &str = "AZ_RAW";
/// Derived source column holding the sequence number (source key column).
pub const SEQ_HEADER: &str = "Seq";
/// Derived source column holding the untouched detail text.
pub const DETAILS_HEADER: &str = "Details";
/// Appended column holding each row's `value|rank` key.
pub const SEARCH_KEY_HEADER: &str = "_SearchKey";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Everything the planner and pipeline need to know, fixed for a whole run.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LayoutConfig {
    pub layout: SheetLayoutConfig,
    pub database: DatabaseConfig,
    pub source: SourceConfig,
    pub input: InputConfig,
}

// ---------------------------------------------------------------------------
// Sheet layout
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SheetLayoutConfig {
    /// Minimum report rows for the database section.
    pub database_reserved_rows: usize,
    /// Minimum report rows for the source section.
    pub source_reserved_rows: usize,
    /// Blank rows between the two report sections.
    pub gap_rows: usize,
    /// Prompt written left of the search box.
    pub search_label: String,
}

impl Default for SheetLayoutConfig {
    fn default() -> Self {
        Self {
            database_reserved_rows: 2,
            source_reserved_rows: 10,
            gap_rows: 3,
            search_label: "Search SEQ".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Database table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    pub title: String,
    /// Column letters to keep, in output order.
    pub columns: Vec<String>,
    /// Letter of the column whose text forms the row key.
    pub key_column: String,
    /// Letters whose `00`-prefixed digit strings are divided by 100.
    pub implied_decimal_columns: Vec<String>,
    /// Header names hidden from the report section.
    pub excluded_display_columns: Vec<String>,
    /// Two header names swapped in the report section when both are shown.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swap_display_columns: Option<[String; 2]>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            title: "Database(ATMI)".to_string(),
            columns: strings(&[
                "F", "G", "I", "J", "K", "M", "O", "V", "AF", "AS", "AT", "AU", "AV", "AX", "AZ",
                "BH", "CU", "DP",
            ]),
            key_column: "AF".to_string(),
            implied_decimal_columns: strings(&["AZ", "CU"]),
            excluded_display_columns: strings(&["from_acct", "to_acct", "auth_branch_from"]),
            swap_display_columns: Some(["amt_1_full".to_string(), "resp_byte".to_string()]),
        }
    }
}

impl DatabaseConfig {
    /// Position of the key column within `columns`.
    pub fn key_position(&self) -> Option<usize> {
        position_of_letter(&self.columns, &self.key_column)
    }

    /// Positions within `columns` of the implied-decimal letters that are selected.
    pub fn implied_decimal_positions(&self) -> Vec<usize> {
        self.implied_decimal_columns
            .iter()
            .filter_map(|l| position_of_letter(&self.columns, l))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Source table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceConfig {
    pub title: String,
    /// Label written above the raw source table.
    pub raw_title: String,
    /// Column letters to keep, in output order.
    pub columns: Vec<String>,
    /// Names for `columns`, one each. Must include `AZ_RAW`.
    pub headers: Vec<String>,
    /// Columns parsed as numbers (unparsable becomes 0).
    pub numeric_columns: Vec<String>,
    /// Sort order of the source rows.
    pub sort_by: Vec<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            title: "ATMI".to_string(),
            raw_title: "--- Raw ATMI Data ---".to_string(),
            columns: strings(&["J", "K", "L", "M", "N", "P", "AM", "AN", "AZ"]),
            headers: strings(&[
                "RC",
                "OC",
                "CH",
                "Product Code",
                "Account Code",
                "Tax",
                "DR",
                "CR",
                RAW_DETAIL_HEADER,
            ]),
            numeric_columns: strings(&["DR", "CR"]),
            sort_by: strings(&["CH", "RC", "OC", "Product Code"]),
        }
    }
}

impl SourceConfig {
    /// Final column order of the source table: configured headers with the raw
    /// detail column replaced by `Seq` and `Details`.
    pub fn final_headers(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .headers
            .iter()
            .filter(|h| h.as_str() != RAW_DETAIL_HEADER)
            .cloned()
            .collect();
        out.push(SEQ_HEADER.to_string());
        out.push(DETAILS_HEADER.to_string());
        out
    }
}

// ---------------------------------------------------------------------------
// Input discovery
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct InputConfig {
    /// Case-insensitive substring identifying the database file.
    pub database_marker: String,
    /// Recognized source file extensions.
    pub extensions: Vec<String>,
    /// Encoding label tried when a text source is not valid UTF-8.
    pub fallback_encoding: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            database_marker: "DATABASE".to_string(),
            extensions: strings(&[".csv", ".trf", ".txt", ".xls", ".xlsx"]),
            fallback_encoding: "windows-874".to_string(),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn position_of_letter(columns: &[String], letter: &str) -> Option<usize> {
    columns.iter().position(|c| c.eq_ignore_ascii_case(letter))
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl LayoutConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: LayoutConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ReconError> {
        toml::to_string_pretty(self).map_err(|e| ReconError::ConfigParse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.layout.database_reserved_rows == 0 || self.layout.source_reserved_rows == 0 {
            return Err(ReconError::ConfigValidation(
                "reserved row floors must be at least 1".into(),
            ));
        }

        // Every letter must parse
        for letter in self
            .database
            .columns
            .iter()
            .chain(&self.database.implied_decimal_columns)
            .chain(std::iter::once(&self.database.key_column))
            .chain(&self.source.columns)
        {
            col_to_index(letter)?;
        }

        if self.database.columns.is_empty() {
            return Err(ReconError::ConfigValidation(
                "database.columns must not be empty".into(),
            ));
        }
        if self.database.key_position().is_none() {
            return Err(ReconError::ConfigValidation(format!(
                "database.key_column '{}' is not one of database.columns",
                self.database.key_column
            )));
        }

        if self.source.columns.len() != self.source.headers.len() {
            return Err(ReconError::ConfigValidation(format!(
                "source.columns has {} letters but source.headers has {} names",
                self.source.columns.len(),
                self.source.headers.len()
            )));
        }
        if !self.source.headers.iter().any(|h| h == RAW_DETAIL_HEADER) {
            return Err(ReconError::ConfigValidation(format!(
                "source.headers must include '{RAW_DETAIL_HEADER}'"
            )));
        }

        let final_headers = self.source.final_headers();
        for name in self.source.numeric_columns.iter().chain(&self.source.sort_by) {
            if !final_headers.contains(name) {
                return Err(ReconError::ConfigValidation(format!(
                    "source column '{name}' is not a source header"
                )));
            }
        }

        if self.input.extensions.is_empty() {
            return Err(ReconError::ConfigValidation(
                "input.extensions must not be empty".into(),
            ));
        }
        if self.input.database_marker.trim().is_empty() {
            return Err(ReconError::ConfigValidation(
                "input.database_marker must not be empty".into(),
            ));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
