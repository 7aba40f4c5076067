//! Date tokens embedded in source file names.
//!
//! Source exports are named like `GLJV20251221_ATMI_SCB_000_ATMI1-D251110.csv`:
//! the `D` token is the business date the file covers (`YYMMDD`) and the `JV`
//! token is the journal-voucher run date (`YYYYMMDD`, normalized here to
//! `YYMMDD` so both tokens compare the same way).

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

fn d_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)[-_]?D([0-9]{6})").unwrap())
}

fn jv_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)JV([0-9]{8})").unwrap())
}

fn d_suffix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)[-_]?D[0-9]{6}.*$").unwrap())
}

fn gl_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)GL").unwrap())
}

/// The two optional date tokens of a file name, both `YYMMDD`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileDates {
    pub d_date: Option<String>,
    pub jv_date: Option<String>,
}

impl FileDates {
    /// Numeric rank of the JV date; absent or non-digit sorts lowest.
    pub fn jv_rank(&self) -> i64 {
        self.jv_date
            .as_deref()
            .and_then(|d| d.parse::<i64>().ok())
            .unwrap_or(-1)
    }
}

/// Final path component, or the input itself when it has none.
pub fn basename(name: &str) -> &str {
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(name)
}

/// File name without its last extension.
pub fn file_stem(name: &str) -> &str {
    let base = basename(name);
    match base.rfind('.') {
        Some(0) | None => base,
        Some(idx) => &base[..idx],
    }
}

pub fn parse_dates(filename: &str) -> FileDates {
    let base = basename(filename);

    let d_date = d_date_re()
        .captures(base)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());

    // YYYYMMDD -> YYMMDD
    let jv_date = jv_date_re()
        .captures(base)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str()[2..].to_string());

    FileDates { d_date, jv_date }
}

/// Drop a trailing `-D######...` token from a file stem.
pub fn strip_d_suffix(stem: &str) -> String {
    d_suffix_re().replace(stem, "").trim().to_string()
}

/// Database sheet name guessed from the file name when no date sheet exists.
pub fn fallback_sheet_name(filename: &str) -> String {
    let without_gl = gl_re().replace_all(basename(filename), "");
    let stem = file_stem(&without_gl).trim().to_string();
    strip_d_suffix(&stem)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_tokens() {
        let dates = parse_dates("GLJV20251221_ATMI_SCB_000_ATMI1-D251110.csv");
        assert_eq!(dates.d_date.as_deref(), Some("251110"));
        assert_eq!(dates.jv_date.as_deref(), Some("251221"));
    }

    #[test]
    fn parses_from_nested_path() {
        let dates = parse_dates("batch/2025/GLJV20251130_X-D251129.txt");
        assert_eq!(dates.d_date.as_deref(), Some("251129"));
        assert_eq!(dates.jv_date.as_deref(), Some("251130"));
    }

    #[test]
    fn tokens_are_case_insensitive() {
        let dates = parse_dates("gljv20250102_atmi_d250101.csv");
        assert_eq!(dates.d_date.as_deref(), Some("250101"));
        assert_eq!(dates.jv_date.as_deref(), Some("250102"));
    }

    #[test]
    fn missing_tokens_are_absent() {
        assert_eq!(parse_dates("report.csv"), FileDates::default());

        let only_d = parse_dates("ATMI-D251110.csv");
        assert_eq!(only_d.d_date.as_deref(), Some("251110"));
        assert!(only_d.jv_date.is_none());

        let short_jv = parse_dates("GLJV202512_ATMI.csv");
        assert!(short_jv.jv_date.is_none());
    }

    #[test]
    fn jv_rank_orders_absent_lowest() {
        let none = FileDates::default();
        let some = parse_dates("GLJV20251220_A.csv");
        assert_eq!(none.jv_rank(), -1);
        assert_eq!(some.jv_rank(), 251220);
    }

    #[test]
    fn fallback_name_strips_gl_and_date() {
        assert_eq!(
            fallback_sheet_name("GLJV20251221_ATMI_SCB_000_ATMI1-D251110.csv"),
            "JV20251221_ATMI_SCB_000_ATMI1"
        );
        assert_eq!(fallback_sheet_name("ATMI_SCB.xlsx"), "ATMI_SCB");
    }

    #[test]
    fn strip_d_suffix_keeps_undated_names() {
        assert_eq!(strip_d_suffix("ATMI1-D251110_extra"), "ATMI1");
        assert_eq!(strip_d_suffix("ATMI1"), "ATMI1");
    }

    #[test]
    fn stem_handles_dotfiles_and_extensions() {
        assert_eq!(file_stem("dir/a.b.csv"), "a.b");
        assert_eq!(file_stem(".hidden"), ".hidden");
        assert_eq!(file_stem("noext"), "noext");
    }
}
