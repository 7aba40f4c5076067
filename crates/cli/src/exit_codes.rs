//! Exit codes returned by `glmatch`.
//!
//! Wrapper scripts branch on these, so a code never changes meaning once
//! released. 0-2 are shared by every command; 3 and up come from the
//! archive pipeline through [`run_exit_code`].
//!
//! | Code | Meaning                                   |
//! |------|-------------------------------------------|
//! | 0    | success                                   |
//! | 1    | unexpected failure                        |
//! | 2    | usage error (bad arguments, missing file) |
//! | 3    | archive unusable                          |
//! | 4    | database workbook unreadable              |
//! | 5    | configuration rejected                    |
//! | 6    | output not written                        |
//! | 7    | every source file skipped                 |

use glmatch_io::RunError;

/// Command completed.
pub const EXIT_SUCCESS: u8 = 0;

/// Failure with no dedicated code (e.g. JSON serialization).
pub const EXIT_ERROR: u8 = 1;

/// Bad arguments or a missing input file.
pub const EXIT_USAGE: u8 = 2;

/// Archive unusable: not a ZIP, no database file, no source files.
pub const EXIT_ARCHIVE: u8 = 3;

/// Database spreadsheet could not be opened.
pub const EXIT_DATABASE: u8 = 4;

/// Config file unreadable, malformed or failing validation.
pub const EXIT_CONFIG: u8 = 5;

/// Output workbook could not be written.
pub const EXIT_WRITE: u8 = 6;

/// Every source file was skipped; nothing to write.
pub const EXIT_NO_SHEETS: u8 = 7;

/// Map a pipeline error to its exit code.
pub fn run_exit_code(err: &RunError) -> u8 {
    match err {
        RunError::Config(_) => EXIT_CONFIG,
        RunError::Archive(_)
        | RunError::MissingDatabase { .. }
        | RunError::MissingSources
        | RunError::NoUsableSources => EXIT_ARCHIVE,
        RunError::DatabaseRead { .. } => EXIT_DATABASE,
        RunError::Write(_) => EXIT_WRITE,
        RunError::NoSheets { .. } => EXIT_NO_SHEETS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct() {
        let codes = [
            EXIT_SUCCESS,
            EXIT_ERROR,
            EXIT_USAGE,
            EXIT_ARCHIVE,
            EXIT_DATABASE,
            EXIT_CONFIG,
            EXIT_WRITE,
            EXIT_NO_SHEETS,
        ];
        let unique: std::collections::HashSet<_> = codes.iter().collect();
        assert_eq!(unique.len(), codes.len());
    }

    #[test]
    fn archive_errors_share_a_code() {
        assert_eq!(run_exit_code(&RunError::MissingSources), EXIT_ARCHIVE);
        assert_eq!(run_exit_code(&RunError::MissingDatabase { marker: "DATABASE".into() }), EXIT_ARCHIVE);
        assert_eq!(run_exit_code(&RunError::NoSheets { skipped: 2 }), EXIT_NO_SHEETS);
    }
}
