use std::collections::HashMap;
use std::fmt;

use crate::config::SEARCH_KEY_HEADER;
use crate::error::ReconError;
use crate::table::{Table, Value};

/// Composite lookup key: a key-column value plus its 1-based occurrence rank.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowKey {
    pub value: String,
    pub rank: usize,
}

impl RowKey {
    pub fn new(value: impl Into<String>, rank: usize) -> Self {
        Self {
            value: value.into(),
            rank,
        }
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.value, self.rank)
    }
}

/// Assign `value|rank` keys in row order. Duplicates are ranked by first-seen order.
pub fn build_row_keys<'a, I>(values: I) -> Vec<RowKey>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen: HashMap<&'a str, usize> = HashMap::new();
    values
        .into_iter()
        .map(|v| {
            let count = seen.entry(v).or_insert(0);
            *count += 1;
            RowKey::new(v, *count)
        })
        .collect()
}

/// A table with its row keys, the key text appended as `_SearchKey`.
#[derive(Debug, Clone)]
pub struct KeyedTable {
    pub table: Table,
    pub keys: Vec<RowKey>,
    /// Column the keys were built from.
    pub key_column: usize,
    /// Position of the appended `_SearchKey` column.
    pub search_key_column: usize,
    /// Highest duplicate rank observed; 1 for an empty table.
    pub max_rank: usize,
}

impl KeyedTable {
    pub fn new(mut table: Table, key_column: usize) -> Result<Self, ReconError> {
        if key_column >= table.width() {
            return Err(ReconError::MissingColumn {
                table: table.name.clone(),
                column: format!("#{}", key_column + 1),
            });
        }

        let texts: Vec<String> = table.column(key_column).map(|v| v.display().trim().to_string()).collect();
        let keys = build_row_keys(texts.iter().map(|s| s.as_str()));
        let max_rank = keys.iter().map(|k| k.rank).max().unwrap_or(1);

        table.push_column(
            SEARCH_KEY_HEADER,
            keys.iter().map(|k| Value::Text(k.to_string())).collect(),
        );
        let search_key_column = table.width() - 1;

        Ok(Self {
            table,
            keys,
            key_column,
            search_key_column,
            max_rank,
        })
    }

    /// Key a table by the column with the given header.
    pub fn by_header(table: Table, header: &str) -> Result<Self, ReconError> {
        let idx = table.require_column(header)?;
        Self::new(table, idx)
    }

    /// Number of report rows to reserve: the floor, widened to the max rank.
    pub fn reserved_rows(&self, floor: usize) -> usize {
        floor.max(self.max_rank)
    }
}
