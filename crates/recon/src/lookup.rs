use std::collections::HashMap;

use regex::{Regex, RegexBuilder};

use crate::keys::KeyedTable;
use crate::table::Value;

/// Key -> row map over a keyed table, built once and queried per report cell.
///
/// Answers the same question as the sheet formula
/// `IFERROR(INDEX(col, MATCH(search&"|"&rank, keys, 0)), "")`, including
/// the exact-match rules of `MATCH`: case is ignored, `*` and `?` in the
/// search value are wildcards, `~` escapes them, and the first matching
/// row wins.
#[derive(Debug)]
pub struct LookupIndex<'a> {
    table: &'a KeyedTable,
    /// Case-folded key text -> first row carrying it.
    rows: HashMap<String, usize>,
}

fn fold(text: &str) -> String {
    text.to_lowercase()
}

/// Anchored, case-insensitive regex for a `MATCH` wildcard pattern.
fn wildcard_regex(pattern: &str) -> Option<Regex> {
    let mut source = String::from("^");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => source.push_str(".*"),
            '?' => source.push('.'),
            '~' => match chars.peek().copied() {
                Some(next) if matches!(next, '*' | '?' | '~') => {
                    chars.next();
                    source.push_str(&regex::escape(&next.to_string()));
                }
                _ => source.push('~'),
            },
            c => source.push_str(&regex::escape(&c.to_string())),
        }
    }
    source.push('$');
    RegexBuilder::new(&source)
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
        .ok()
}

/// What the sheet formula shows for `column` of a matched row (or no match).
///
/// `INDEX` on an empty cell yields 0; a miss yields the `IFERROR` fallback.
pub fn formula_result(row: Option<&[Value]>, column: usize) -> Value {
    match row.and_then(|r| r.get(column)) {
        Some(Value::Empty) => Value::Number(0.0),
        Some(value) => value.clone(),
        None => Value::Empty,
    }
}

impl<'a> LookupIndex<'a> {
    pub fn new(table: &'a KeyedTable) -> Self {
        let mut rows = HashMap::with_capacity(table.keys.len());
        for (i, key) in table.keys.iter().enumerate() {
            rows.entry(fold(&key.to_string())).or_insert(i);
        }
        Self { table, rows }
    }

    /// Row index of the `rank`-th occurrence of `search`.
    pub fn position(&self, search: &str, rank: usize) -> Option<usize> {
        let pattern = format!("{search}|{rank}");
        if !pattern.contains(['*', '?', '~']) {
            return self.rows.get(&fold(&pattern)).copied();
        }
        let re = wildcard_regex(&pattern)?;
        self.table.keys.iter().position(|key| re.is_match(&key.to_string()))
    }

    /// Values of the `rank`-th occurrence of `search`.
    pub fn get(&self, search: &str, rank: usize) -> Option<&'a [Value]> {
        let table = self.table;
        self.position(search, rank).map(|i| table.table.rows[i].as_slice())
    }

    /// The value the report formula for (`search`, `rank`, `column`) evaluates to.
    pub fn cell(&self, search: &str, rank: usize, column: usize) -> Value {
        formula_result(self.get(search, rank), column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Table;

    fn keyed() -> KeyedTable {
        let mut t = Table::new("t", vec!["k".into(), "v".into()]);
        t.push_row(vec![Value::text("X"), Value::text("first")]);
        t.push_row(vec![Value::text("Y"), Value::text("other")]);
        t.push_row(vec![Value::text("X"), Value::text("second")]);
        KeyedTable::new(t, 0).unwrap()
    }

    fn keyed_from(rows: &[(&str, Value)]) -> KeyedTable {
        let mut t = Table::new("t", vec!["k".into(), "v".into()]);
        for (k, v) in rows {
            t.push_row(vec![Value::text(*k), v.clone()]);
        }
        KeyedTable::new(t, 0).unwrap()
    }

    #[test]
    fn rank_two_returns_second_occurrence() {
        let table = keyed();
        let index = LookupIndex::new(&table);
        assert_eq!(index.cell("X", 1, 1), Value::text("first"));
        assert_eq!(index.cell("X", 2, 1), Value::text("second"));
        assert_eq!(index.position("X", 2), Some(2));
    }

    #[test]
    fn search_ignores_case() {
        let table = keyed_from(&[("ATM7", Value::text("hit"))]);
        let index = LookupIndex::new(&table);
        assert_eq!(index.cell("atm7", 1, 1), Value::text("hit"));
        assert_eq!(index.cell("Atm7", 1, 1), Value::text("hit"));
    }

    #[test]
    fn case_variants_resolve_to_first_row() {
        // "abc" and "ABC" are ranked separately but fold to the same key
        let table = keyed_from(&[("abc", Value::text("lower")), ("ABC", Value::text("upper"))]);
        let index = LookupIndex::new(&table);
        assert_eq!(index.cell("ABC", 1, 1), Value::text("lower"));
    }

    #[test]
    fn wildcards_follow_match_rules() {
        let table = keyed_from(&[
            ("A*1", Value::text("star")),
            ("AB1", Value::text("ab")),
            ("A?C", Value::text("question")),
        ]);
        let index = LookupIndex::new(&table);

        // Unescaped `*` matches the first row whose key fits
        assert_eq!(index.cell("A*", 1, 1), Value::text("star"));
        assert_eq!(index.cell("?b1", 1, 1), Value::text("ab"));
        // `~` makes the next wildcard literal
        assert_eq!(index.cell("A~*1", 1, 1), Value::text("star"));
        assert_eq!(index.cell("A~?C", 1, 1), Value::text("question"));
        assert_eq!(index.cell("A~?1", 1, 1), Value::Empty);
    }

    #[test]
    fn matched_empty_cell_reads_as_zero() {
        let table = keyed_from(&[("K", Value::Empty)]);
        let index = LookupIndex::new(&table);
        assert_eq!(index.cell("K", 1, 1), Value::Number(0.0));
        assert_eq!(index.cell("K", 2, 1), Value::Empty);
    }

    #[test]
    fn rank_past_count_is_blank() {
        let table = keyed();
        let index = LookupIndex::new(&table);
        assert_eq!(index.cell("X", 3, 1), Value::Empty);
        assert_eq!(index.cell("Z", 1, 1), Value::Empty);
        assert!(index.get("Y", 2).is_none());
    }

    #[test]
    fn search_key_column_is_reachable() {
        let table = keyed();
        let index = LookupIndex::new(&table);
        assert_eq!(index.cell("Y", 1, table.search_key_column), Value::text("Y|1"));
    }
}
