use std::cmp::Ordering;
use std::fmt;

use crate::error::ReconError;

/// A single cell of an extracted table.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Empty,
    Text(String),
    Number(f64),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        let s = s.into();
        if s.is_empty() {
            Value::Empty
        } else {
            Value::Text(s)
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Number(_))
    }

    /// Text used for keys, sorting and width estimation.
    pub fn display(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Empty => Ok(()),
            Value::Text(s) => f.write_str(s),
            Value::Number(n) => {
                // Integers without decimals
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
        }
    }
}

/// A flat table: named columns and rows of equal width.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(name: impl Into<String>, headers: Vec<String>) -> Self {
        Self {
            name: name.into(),
            headers,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn width(&self) -> usize {
        self.headers.len()
    }

    /// Append a row, padding or truncating it to the table width.
    pub fn push_row(&mut self, mut row: Vec<Value>) {
        row.resize(self.headers.len(), Value::Empty);
        self.rows.push(row);
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn require_column(&self, name: &str) -> Result<usize, ReconError> {
        self.column_index(name).ok_or_else(|| ReconError::MissingColumn {
            table: self.name.clone(),
            column: name.to_string(),
        })
    }

    pub fn column(&self, idx: usize) -> impl Iterator<Item = &Value> {
        self.rows.iter().map(move |row| &row[idx])
    }

    pub fn push_column(&mut self, header: impl Into<String>, values: Vec<Value>) {
        self.headers.push(header.into());
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.push(value);
        }
        let width = self.headers.len();
        for row in &mut self.rows {
            row.resize(width, Value::Empty);
        }
    }

    /// Keep only the named columns, in the given order. Unknown names are skipped.
    pub fn reorder(&mut self, names: &[&str]) {
        let picks: Vec<usize> = names.iter().filter_map(|n| self.column_index(n)).collect();
        let headers: Vec<String> = picks.iter().map(|&i| self.headers[i].clone()).collect();
        self.headers = headers;
        for row in &mut self.rows {
            let picked: Vec<Value> = picks.iter().map(|&i| row[i].clone()).collect();
            *row = picked;
        }
    }

    /// Stable ascending sort by the display text of the named columns.
    pub fn sort_by_columns(&mut self, names: &[String]) {
        let keys: Vec<usize> = names.iter().filter_map(|n| self.column_index(n)).collect();
        if keys.is_empty() {
            return;
        }
        self.rows.sort_by(|a, b| {
            for &k in &keys {
                match a[k].display().cmp(&b[k].display()) {
                    Ordering::Equal => continue,
                    other => return other,
                }
            }
            Ordering::Equal
        });
    }
}
