//! Domain model shared by every pipeline stage.
//!
//! - [`Table`] - ordered, uniquely-named columns over ordered rows
//! - [`Row`] - one value per column, stored positionally
//!
//! Cells are [`serde_json::Value`]s restricted in practice to strings,
//! numbers and null. A table never changes after construction: every stage
//! consumes one table and builds a new one.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;

use crate::error::TableError;

/// A single row; `row[i]` is the value of `columns[i]`.
pub type Row = Vec<Value>;

/// In-memory table: the currency between pipeline stages.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    /// Build a table, checking that column names are unique and that every
    /// row holds exactly one value per column.
    pub fn new<S: Into<String>>(
        columns: impl IntoIterator<Item = S>,
        rows: Vec<Row>,
    ) -> Result<Self, TableError> {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();

        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(TableError::DuplicateColumn(column.clone()));
            }
        }

        for (i, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(TableError::RaggedRow {
                    row: i,
                    expected: columns.len(),
                    found: row.len(),
                });
            }
        }

        Ok(Self { columns, rows })
    }

    /// Build a table whose shape is already guaranteed by the caller.
    pub(crate) fn from_parts(columns: Vec<String>, rows: Vec<Row>) -> Self {
        debug_assert!(rows.iter().all(|r| r.len() == columns.len()));
        Self { columns, rows }
    }

    /// A table with the given columns and no rows.
    pub fn empty<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Result<Self, TableError> {
        Self::new(columns, Vec::new())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Position of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Values of the column at `index`, top to bottom.
    pub fn column(&self, index: usize) -> impl Iterator<Item = &Value> + '_ {
        self.rows.iter().map(move |row| &row[index])
    }

    /// Cell lookup by row position and column name.
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let index = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[index])
    }

    /// First `n` rows.
    pub fn head(&self, n: usize) -> Table {
        Self::from_parts(
            self.columns.clone(),
            self.rows.iter().take(n).cloned().collect(),
        )
    }

    /// Rows as JSON objects (column order follows the map implementation).
    pub fn to_records(&self) -> Vec<Value> {
        self.rows
            .iter()
            .map(|row| {
                let obj: Map<String, Value> = self
                    .columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect();
                Value::Object(obj)
            })
            .collect()
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<Row>) {
        (self.columns, self.rows)
    }
}

/// Hashable identity of a sequence of values (group keys, join keys, rows).
///
/// Numbers compare by value: `1` and `1.0` share a key, `1` and `"1"` do not.
pub fn value_key(values: &[Value]) -> String {
    Value::Array(values.iter().map(normalize_number).collect()).to_string()
}

/// Integral floats in `i64` range become integers; `-0.0` becomes `0`.
fn normalize_number(value: &Value) -> Value {
    match value.as_f64() {
        Some(f) if value.is_f64() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => {
            Value::from(f as i64)
        }
        _ => value.clone(),
    }
}

/// Render a cell for text output: null is blank, strings are unquoted.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cells: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| row.iter().map(display_value).collect())
            .collect();

        let widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| {
                cells
                    .iter()
                    .map(|r| r[i].chars().count())
                    .chain(std::iter::once(c.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let header: Vec<String> = self
            .columns
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:<w$}", c, w = w))
            .collect();
        writeln!(f, "{}", header.join(" | ").trim_end())?;

        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        writeln!(f, "{}", rule.join("-+-"))?;

        for row in &cells {
            let line: Vec<String> = row
                .iter()
                .zip(&widths)
                .map(|(v, w)| format!("{:<w$}", v, w = w))
                .collect();
            writeln!(f, "{}", line.join(" | ").trim_end())?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Table {
        Table::new(
            ["id", "name"],
            vec![
                vec![json!(1), json!("Acme")],
                vec![json!(2), Value::Null],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_new_rejects_duplicate_columns() {
        let err = Table::new(["a", "a"], vec![]).unwrap_err();
        assert_eq!(err, TableError::DuplicateColumn("a".into()));
    }

    #[test]
    fn test_new_rejects_ragged_rows() {
        let err = Table::new(["a", "b"], vec![vec![json!(1)]]).unwrap_err();
        assert_eq!(
            err,
            TableError::RaggedRow {
                row: 0,
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn test_lookup() {
        let table = sample();
        assert_eq!(table.len(), 2);
        assert_eq!(table.width(), 2);
        assert_eq!(table.column_index("name"), Some(1));
        assert_eq!(table.get(0, "name"), Some(&json!("Acme")));
        assert_eq!(table.get(5, "name"), None);
        assert_eq!(table.column(0).cloned().collect::<Vec<_>>(), vec![json!(1), json!(2)]);
    }

    #[test]
    fn test_value_key_distinguishes_types() {
        assert_ne!(value_key(&[json!(1)]), value_key(&[json!("1")]));
        assert_ne!(value_key(&[json!(1)]), value_key(&[json!(1.5)]));
        assert_eq!(value_key(&[json!("x"), json!(2)]), value_key(&[json!("x"), json!(2)]));
    }

    #[test]
    fn test_value_key_equates_integral_floats() {
        assert_eq!(value_key(&[json!(1)]), value_key(&[json!(1.0)]));
        assert_eq!(value_key(&[json!(0)]), value_key(&[json!(-0.0)]));
        assert_eq!(value_key(&[json!("a"), json!(-3.0)]), value_key(&[json!("a"), json!(-3)]));
    }

    #[test]
    fn test_display_aligns_columns() {
        let rendered = sample().to_string();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "id | name");
        assert_eq!(lines[1], "---+-----");
        assert_eq!(lines[2], "1  | Acme");
        assert_eq!(lines[3], "2  |");
    }

    #[test]
    fn test_head() {
        let table = sample();
        assert_eq!(table.head(1).len(), 1);
        assert_eq!(table.head(10).len(), 2);
    }
}
