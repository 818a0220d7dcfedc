//! Column existence checks.
//!
//! Shared by the stages (which fail the run on a missing column) and by the
//! CLI editing commands (which refuse to write a config that references a
//! column the source does not have).

use crate::error::ColumnNotFoundError;
use crate::models::Table;

/// Position of `column`, or an error naming it and the asking stage.
pub fn require_column(table: &Table, column: &str, stage: &'static str) -> Result<usize, ColumnNotFoundError> {
    table
        .column_index(column)
        .ok_or_else(|| ColumnNotFoundError::new(column, stage))
}

/// Positions of every column, failing on the first missing one.
pub fn require_columns(
    table: &Table,
    columns: &[String],
    stage: &'static str,
) -> Result<Vec<usize>, ColumnNotFoundError> {
    columns
        .iter()
        .map(|c| require_column(table, c, stage))
        .collect()
}

/// Every requested column absent from the table, in request order.
pub fn missing_columns<'a>(table: &Table, columns: &'a [String]) -> Vec<&'a str> {
    columns
        .iter()
        .filter(|c| !table.has_column(c))
        .map(String::as_str)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table() -> Table {
        Table::new(["id", "name", "city"], vec![vec![json!(1), json!("a"), json!("b")]]).unwrap()
    }

    fn cols(c: &[&str]) -> Vec<String> {
        c.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_require_columns_returns_positions() {
        assert_eq!(require_columns(&table(), &cols(&["city", "id"]), "include").unwrap(), vec![2, 0]);
    }

    #[test]
    fn test_require_columns_names_first_missing() {
        let err = require_columns(&table(), &cols(&["id", "zip", "age"]), "include").unwrap_err();
        assert_eq!(err.column, "zip");
        assert_eq!(err.stage, "include");
    }

    #[test]
    fn test_missing_columns() {
        assert_eq!(missing_columns(&table(), &cols(&["zip", "id", "age"])), vec!["zip", "age"]);
        assert!(missing_columns(&table(), &cols(&[])).is_empty());
    }
}
