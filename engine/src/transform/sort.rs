//! Multi-key ordering.

use serde_json::Value;
use std::cmp::Ordering;

use crate::error::ColumnNotFoundError;
use crate::models::Table;
use crate::validation::require_column;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// One column of the combined sort order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub column: String,
    pub direction: SortDirection,
}

/// Ascending columns, then descending columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortSpec {
    pub ascending: Vec<String>,
    pub descending: Vec<String>,
}

impl SortSpec {
    /// Combined key list: ascending keys first, each group in declared order.
    pub fn keys(&self) -> Vec<SortKey> {
        let tag = |columns: &[String], direction| {
            columns
                .iter()
                .map(|c| SortKey {
                    column: c.clone(),
                    direction,
                })
                .collect::<Vec<_>>()
        };
        let mut keys = tag(self.ascending.as_slice(), SortDirection::Ascending);
        keys.extend(tag(self.descending.as_slice(), SortDirection::Descending));
        keys
    }

    pub fn is_empty(&self) -> bool {
        self.ascending.is_empty() && self.descending.is_empty()
    }
}

/// Order two non-null cells: numbers numerically, strings lexically, and
/// numbers before strings.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) | Value::Object(_) => 4,
        }
    }

    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => {
                let (x, y) = (x.as_f64().unwrap_or(f64::NAN), y.as_f64().unwrap_or(f64::NAN));
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            }
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Nulls sort last in both directions.
fn compare_directed(a: &Value, b: &Value, direction: SortDirection) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => match direction {
            SortDirection::Ascending => compare_values(a, b),
            SortDirection::Descending => compare_values(a, b).reverse(),
        },
    }
}

/// Stable multi-key sort; `None` or an empty spec is the identity.
pub fn sort(table: Table, spec: Option<&SortSpec>) -> Result<Table, ColumnNotFoundError> {
    let Some(spec) = spec else {
        return Ok(table);
    };

    let keys: Vec<(usize, SortDirection)> = spec
        .keys()
        .iter()
        .map(|k| require_column(&table, &k.column, "sort").map(|i| (i, k.direction)))
        .collect::<Result<_, _>>()?;
    if keys.is_empty() {
        return Ok(table);
    }

    let (columns, mut rows) = table.into_parts();
    rows.sort_by(|a, b| {
        keys.iter()
            .map(|&(i, direction)| compare_directed(&a[i], &b[i], direction))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    });

    Ok(Table::from_parts(columns, rows))
}
