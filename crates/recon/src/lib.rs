//! `glmatch-recon`: GL/database matching engine.
//!
//! Pure engine crate: receives already-read grids of cells, returns keyed
//! tables and sheet plans. No filesystem, archive or XLSX dependencies.

pub mod columns;
pub mod config;
pub mod error;
pub mod extract;
pub mod filename;
pub mod keys;
pub mod layout;
pub mod lookup;
pub mod select;
pub mod table;

pub use config::LayoutConfig;
pub use error::ReconError;
pub use filename::{parse_dates, FileDates};
pub use keys::{build_row_keys, KeyedTable, RowKey};
pub use layout::{plan_sheet, SheetInputs, SheetPlan};
pub use lookup::LookupIndex;
pub use select::{select_latest, SelectedFile};
pub use table::{Table, Value};
