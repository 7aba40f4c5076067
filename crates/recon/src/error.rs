use std::fmt;

#[derive(Debug)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (bad floor, unknown header, etc.).
    ConfigValidation(String),
    /// Not a spreadsheet column reference like `A` or `AZ`.
    InvalidColumn(String),
    /// A table lacks a column the caller asked for by name.
    MissingColumn { table: String, column: String },
    /// A source grid had no data rows.
    EmptySource,
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::InvalidColumn(col) => write!(f, "invalid column letter: '{col}'"),
            Self::MissingColumn { table, column } => {
                write!(f, "table '{table}': missing column '{column}'")
            }
            Self::EmptySource => write!(f, "source file has no rows"),
        }
    }
}

impl std::error::Error for ReconError {}
