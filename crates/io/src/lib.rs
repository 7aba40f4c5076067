//! `glmatch-io`: everything that touches files. ZIP extraction, CSV and
//! Excel reading, XLSX output, and the end-to-end run built on top of them.

pub mod archive;
pub mod csv;
pub mod pipeline;
pub mod xlsx;

pub use pipeline::{
    plan_archive, process_archive, process_archive_to_buffer, ArchivePlan, PlannedSource, RunError,
    RunOptions, RunSummary, SheetOutcome,
};
