//! Column inclusion.

use std::collections::HashSet;

use crate::error::{ConfigError, PipelineResult};
use crate::models::Table;
use crate::validation::require_columns;

/// Restrict a table to `columns`, in the requested order.
///
/// `None` is the identity. Every requested column must exist; the first
/// missing one is reported.
pub fn project(table: Table, columns: Option<&[String]>) -> PipelineResult<Table> {
    let Some(columns) = columns else {
        return Ok(table);
    };

    let mut seen = HashSet::new();
    if let Some(dup) = columns.iter().find(|c| !seen.insert(c.as_str())) {
        return Err(ConfigError::DuplicateColumn(dup.clone()).into());
    }

    let positions = require_columns(&table, columns, "include")?;
    let rows = table
        .rows()
        .iter()
        .map(|row| positions.iter().map(|&i| row[i].clone()).collect())
        .collect();

    Ok(Table::from_parts(columns.to_vec(), rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use serde_json::json;

    fn table() -> Table {
        Table::new(
            ["id", "name", "city"],
            vec![
                vec![json!(1), json!("ann"), json!("Oslo")],
                vec![json!(2), json!("bob"), json!("Rome")],
            ],
        )
        .unwrap()
    }

    fn cols(c: &[&str]) -> Vec<String> {
        c.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_project_reorders() {
        let result = project(table(), Some(&cols(&["city", "id"]))).unwrap();
        assert_eq!(result.columns(), ["city", "id"]);
        assert_eq!(result.rows()[1], vec![json!("Rome"), json!(2)]);
    }

    #[test]
    fn test_project_all_columns_is_identity() {
        let all = table().columns().to_vec();
        assert_eq!(project(table(), Some(&all)).unwrap(), table());
    }

    #[test]
    fn test_project_none_is_identity() {
        assert_eq!(project(table(), None).unwrap(), table());
    }

    #[test]
    fn test_project_missing_column() {
        let err = project(table(), Some(&cols(&["id", "zip", "age"]))).unwrap_err();
        match err {
            PipelineError::ColumnNotFound(e) => assert_eq!(e.column, "zip"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_project_duplicate_column() {
        let err = project(table(), Some(&cols(&["id", "id"]))).unwrap_err();
        assert!(matches!(err, PipelineError::Config(ConfigError::DuplicateColumn(c)) if c == "id"));
    }
}
