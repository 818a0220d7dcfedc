//! Grouped and ungrouped aggregation.
//!
//! Specs run strictly in order and each one sees the table produced by the
//! previous one. How a result lands back in the table depends on the aggregate:
//!
//! | spec      | projected columns | merge-back                                   |
//! |-----------|-------------------|----------------------------------------------|
//! | grouped   | any               | inner merge of one row per group on the keys |
//! | ungrouped | yes               | scalar broadcast into a new column           |
//! | ungrouped | no                | scalar collected; all of them replace the table with one row |
//!
//! Duplicate rows are removed once every spec has been applied.

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use crate::error::{ConfigError, PipelineResult};
use crate::logs::{log_info_indent, log_success};
use crate::models::{value_key, Row, Table};
use crate::validation::require_columns;

/// Supported aggregate functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateFunction {
    /// Number of rows in the partition
    Count,
    Sum,
    /// Arithmetic mean
    Avg,
    Max,
    Min,
}

impl AggregateFunction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateFunction::Count => "count",
            AggregateFunction::Sum => "sum",
            AggregateFunction::Avg => "avg",
            AggregateFunction::Max => "max",
            AggregateFunction::Min => "min",
        }
    }

    /// Reduce one partition.
    ///
    /// `count` counts rows; every other function only looks at numeric
    /// values. Without numeric values `sum` is 0 and `avg`/`max`/`min` are
    /// null.
    pub fn reduce<'a>(&self, row_count: usize, values: impl IntoIterator<Item = &'a Value>) -> Value {
        let numbers = values.into_iter().filter_map(|v| match v {
            Value::Number(n) => Some(n),
            _ => None,
        });

        match self {
            AggregateFunction::Count => Value::from(row_count),
            AggregateFunction::Sum => sum(numbers),
            AggregateFunction::Avg => mean(numbers),
            AggregateFunction::Max => extreme(numbers, |candidate, best| candidate > best),
            AggregateFunction::Min => extreme(numbers, |candidate, best| candidate < best),
        }
    }
}

impl FromStr for AggregateFunction {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "count" => Ok(AggregateFunction::Count),
            "sum" => Ok(AggregateFunction::Sum),
            "avg" => Ok(AggregateFunction::Avg),
            "max" => Ok(AggregateFunction::Max),
            "min" => Ok(AggregateFunction::Min),
            _ => Err(ConfigError::UnsupportedFunction(s.to_string())),
        }
    }
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Integer while every input is an integer and the total fits, float otherwise.
fn sum<'a>(numbers: impl Iterator<Item = &'a Number>) -> Value {
    let mut exact: Option<i64> = Some(0);
    let mut approx = 0.0_f64;

    for n in numbers {
        approx += n.as_f64().unwrap_or(0.0);
        exact = exact.and_then(|acc| n.as_i64().and_then(|i| acc.checked_add(i)));
    }

    match exact {
        Some(i) => Value::from(i),
        None => float(approx),
    }
}

fn mean<'a>(numbers: impl Iterator<Item = &'a Number>) -> Value {
    let (count, total) = numbers.fold((0usize, 0.0_f64), |(c, t), n| (c + 1, t + n.as_f64().unwrap_or(0.0)));
    if count == 0 {
        Value::Null
    } else {
        float(total / count as f64)
    }
}

/// First value that `wins` against every other, kept in its original form.
fn extreme<'a>(numbers: impl Iterator<Item = &'a Number>, wins: impl Fn(f64, f64) -> bool) -> Value {
    let mut best: Option<(&Number, f64)> = None;
    for n in numbers {
        let x = n.as_f64().unwrap_or(f64::NAN);
        if best.map_or(true, |(_, b)| wins(x, b)) {
            best = Some((n, x));
        }
    }
    best.map(|(n, _)| Value::Number(n.clone())).unwrap_or(Value::Null)
}

fn float(x: f64) -> Value {
    Number::from_f64(x).map(Value::Number).unwrap_or(Value::Null)
}

/// One aggregate of the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateSpec {
    pub function: AggregateFunction,
    /// Target columns; several columns pool their values
    pub columns: Vec<String>,
    /// Group-by keys; `None` aggregates the whole table
    pub group: Option<Vec<String>>,
    /// Name of the produced column
    pub alias: String,
}

impl AggregateSpec {
    pub fn new(function: AggregateFunction, columns: &[&str], alias: &str) -> Self {
        Self {
            function,
            columns: columns.iter().map(|c| c.to_string()).collect(),
            group: None,
            alias: alias.to_string(),
        }
    }

    pub fn grouped_by(mut self, keys: &[&str]) -> Self {
        self.group = Some(keys.iter().map(|k| k.to_string()).collect());
        self
    }
}

/// Apply `specs` in order, then drop duplicate rows.
///
/// `projected` is the include list of the run (if any); it decides where
/// ungrouped results go.
pub fn apply(table: Table, specs: &[AggregateSpec], projected: Option<&[String]>) -> PipelineResult<Table> {
    let mut table = table;
    let mut scalars: Vec<(String, Value)> = Vec::new();

    for spec in specs {
        let targets = require_columns(&table, &spec.columns, "aggregate")?;
        if table.has_column(&spec.alias) || scalars.iter().any(|(a, _)| a == &spec.alias) {
            return Err(ConfigError::DuplicateAlias(spec.alias.clone()).into());
        }

        match &spec.group {
            Some(keys) => {
                let key_positions = require_columns(&table, keys, "aggregate")?;
                table = merge_grouped(&table, spec, &targets, &key_positions);
                log_info_indent(
                    format!("{}({}) by [{}] → {}", spec.function, spec.columns.join(", "), keys.join(", "), spec.alias),
                    1,
                );
            }
            None => {
                let values = table.rows().iter().flat_map(|row| targets.iter().map(move |&i| &row[i]));
                let scalar = spec.function.reduce(table.len(), values);
                log_info_indent(format!("{}({}) → {} = {}", spec.function, spec.columns.join(", "), spec.alias, scalar), 1);

                if projected.is_some() {
                    table = broadcast(table, &spec.alias, scalar);
                } else {
                    scalars.push((spec.alias.clone(), scalar));
                }
            }
        }
    }

    if projected.is_none() && !scalars.is_empty() {
        let (columns, row): (Vec<String>, Row) = scalars.into_iter().unzip();
        table = Table::from_parts(columns, vec![row]);
    }

    let before = table.len();
    let table = drop_duplicates(table);
    log_success(format!("Aggregated: {} rows ({} duplicates removed)", table.len(), before - table.len()));
    Ok(table)
}

/// Groups in order of first appearance; rows with a null key belong to none.
fn partition(table: &Table, keys: &[usize]) -> (Vec<Vec<usize>>, Vec<Option<usize>>) {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut membership: Vec<Option<usize>> = Vec::with_capacity(table.len());

    for (ri, row) in table.rows().iter().enumerate() {
        let key: Vec<Value> = keys.iter().map(|&k| row[k].clone()).collect();
        if key.iter().any(Value::is_null) {
            membership.push(None);
            continue;
        }
        let gi = *index.entry(value_key(&key)).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[gi].push(ri);
        membership.push(Some(gi));
    }

    (groups, membership)
}

/// One aggregated value per group, inner-merged back on the group keys.
fn merge_grouped(table: &Table, spec: &AggregateSpec, targets: &[usize], keys: &[usize]) -> Table {
    let (groups, membership) = partition(table, keys);

    let results: Vec<Value> = groups
        .iter()
        .map(|rows| {
            let values = rows
                .iter()
                .flat_map(|&ri| targets.iter().map(move |&ti| &table.rows()[ri][ti]));
            spec.function.reduce(rows.len(), values)
        })
        .collect();

    let mut columns = table.columns().to_vec();
    columns.push(spec.alias.clone());

    let rows = table
        .rows()
        .iter()
        .zip(membership)
        .filter_map(|(row, group)| {
            group.map(|gi| {
                let mut row = row.clone();
                row.push(results[gi].clone());
                row
            })
        })
        .collect();

    Table::from_parts(columns, rows)
}

fn broadcast(table: Table, alias: &str, scalar: Value) -> Table {
    let (mut columns, mut rows) = table.into_parts();
    columns.push(alias.to_string());
    for row in &mut rows {
        row.push(scalar.clone());
    }
    Table::from_parts(columns, rows)
}

/// Keep the first occurrence of every distinct row.
pub fn drop_duplicates(table: Table) -> Table {
    let (columns, rows) = table.into_parts();
    let mut seen = HashSet::with_capacity(rows.len());
    let rows = rows.into_iter().filter(|row| seen.insert(value_key(row))).collect();
    Table::from_parts(columns, rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use serde_json::json;

    fn scores() -> Table {
        Table::new(
            ["g", "n"],
            vec![
                vec![json!("x"), json!(1)],
                vec![json!("x"), json!(3)],
                vec![json!("y"), json!(5)],
            ],
        )
        .unwrap()
    }

    fn cols(c: &[&str]) -> Vec<String> {
        c.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_function_parse() {
        assert_eq!("SUM".parse::<AggregateFunction>().unwrap(), AggregateFunction::Sum);
        let err = "median".parse::<AggregateFunction>().unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFunction(ref f) if f == "median"));
        assert_eq!(err.to_string(), "Function median not supported");
    }

    #[test]
    fn test_reduce_identities_without_numbers() {
        let values = [json!("a"), Value::Null];
        assert_eq!(AggregateFunction::Sum.reduce(2, &values), json!(0));
        assert_eq!(AggregateFunction::Count.reduce(0, &Vec::<Value>::new()), json!(0));
        assert_eq!(AggregateFunction::Avg.reduce(2, &values), Value::Null);
        assert_eq!(AggregateFunction::Max.reduce(2, &values), Value::Null);
        assert_eq!(AggregateFunction::Min.reduce(2, &values), Value::Null);
    }

    #[test]
    fn test_reduce_skips_non_numeric() {
        let values = [json!(4), json!("oops"), json!(2.5), Value::Null];
        assert_eq!(AggregateFunction::Sum.reduce(4, &values), json!(6.5));
        assert_eq!(AggregateFunction::Avg.reduce(4, &values), json!(3.25));
        assert_eq!(AggregateFunction::Max.reduce(4, &values), json!(4));
        assert_eq!(AggregateFunction::Min.reduce(4, &values), json!(2.5));
        assert_eq!(AggregateFunction::Count.reduce(4, &values), json!(4));
    }

    #[test]
    fn test_sum_stays_integer() {
        assert_eq!(AggregateFunction::Sum.reduce(2, &[json!(2), json!(3)]), json!(5));
    }

    #[test]
    fn test_grouped_sum_scenario() {
        let spec = AggregateSpec::new(AggregateFunction::Sum, &["n"], "total").grouped_by(&["g"]);
        let result = apply(scores(), &[spec], None).unwrap();

        assert_eq!(result.columns(), ["g", "n", "total"]);
        assert_eq!(
            result.rows(),
            [
                vec![json!("x"), json!(1), json!(4)],
                vec![json!("x"), json!(3), json!(4)],
                vec![json!("y"), json!(5), json!(5)],
            ]
        );
    }

    #[test]
    fn test_grouped_count_and_dedup() {
        let projected = cols(&["g"]);
        let table = Table::new(["g"], vec![vec![json!("x")], vec![json!("x")], vec![json!("y")]]).unwrap();
        let spec = AggregateSpec::new(AggregateFunction::Count, &["g"], "rows").grouped_by(&["g"]);

        let result = apply(table, &[spec], Some(&projected)).unwrap();
        assert_eq!(
            result.rows(),
            [vec![json!("x"), json!(2)], vec![json!("y"), json!(1)]]
        );
    }

    #[test]
    fn test_null_group_keys_drop_out() {
        let table = Table::new(
            ["g", "n"],
            vec![vec![json!("x"), json!(1)], vec![Value::Null, json!(2)]],
        )
        .unwrap();
        let spec = AggregateSpec::new(AggregateFunction::Sum, &["n"], "total").grouped_by(&["g"]);

        let result = apply(table, &[spec], None).unwrap();
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn test_integer_and_float_group_keys_share_a_group() {
        let table = Table::new(
            ["g", "n"],
            vec![vec![json!(1), json!(1)], vec![json!(1.0), json!(3)]],
        )
        .unwrap();
        let spec = AggregateSpec::new(AggregateFunction::Sum, &["n"], "total").grouped_by(&["g"]);

        let result = apply(table, &[spec], None).unwrap();
        assert_eq!(result.len(), 2);
        assert!(result.rows().iter().all(|row| row[2] == json!(4)));
    }

    #[test]
    fn test_drop_duplicates_equates_integral_floats() {
        let table = Table::new(["a"], vec![vec![json!(2)], vec![json!(2.0)], vec![json!(2.5)]]).unwrap();
        assert_eq!(drop_duplicates(table).rows(), [vec![json!(2)], vec![json!(2.5)]]);
    }

    #[test]
    fn test_ungrouped_with_projection_broadcasts() {
        let projected = cols(&["g", "n"]);
        let spec = AggregateSpec::new(AggregateFunction::Max, &["n"], "top");

        let result = apply(scores(), &[spec], Some(&projected)).unwrap();
        assert_eq!(result.columns(), ["g", "n", "top"]);
        assert!(result.column(2).all(|v| v == &json!(5)));
    }

    #[test]
    fn test_ungrouped_without_projection_replaces_table() {
        let specs = [
            AggregateSpec::new(AggregateFunction::Sum, &["n"], "total"),
            AggregateSpec::new(AggregateFunction::Avg, &["n"], "mean"),
            AggregateSpec::new(AggregateFunction::Count, &["n"], "rows"),
        ];

        let result = apply(scores(), &specs, None).unwrap();
        assert_eq!(result.columns(), ["total", "mean", "rows"]);
        assert_eq!(result.rows(), [vec![json!(9), json!(3.0), json!(3)]]);
    }

    #[test]
    fn test_specs_compose_sequentially() {
        let projected = cols(&["g", "n"]);
        let specs = [
            AggregateSpec::new(AggregateFunction::Sum, &["n"], "total").grouped_by(&["g"]),
            AggregateSpec::new(AggregateFunction::Min, &["total"], "smallest"),
        ];

        let result = apply(scores(), &specs, Some(&projected)).unwrap();
        assert_eq!(result.columns(), ["g", "n", "total", "smallest"]);
        assert!(result.column(3).all(|v| v == &json!(4)));
    }

    #[test]
    fn test_multiple_target_columns_pool_values() {
        let table = Table::new(["a", "b"], vec![vec![json!(1), json!(2)], vec![json!(3), json!(4)]]).unwrap();
        let spec = AggregateSpec::new(AggregateFunction::Sum, &["a", "b"], "total");

        let result = apply(table, &[spec], None).unwrap();
        assert_eq!(result.rows(), [vec![json!(10)]]);
    }

    #[test]
    fn test_unknown_columns_fail() {
        let spec = AggregateSpec::new(AggregateFunction::Sum, &["price"], "total");
        let err = apply(scores(), &[spec], None).unwrap_err();
        assert!(matches!(err, PipelineError::ColumnNotFound(e) if e.column == "price"));

        let spec = AggregateSpec::new(AggregateFunction::Sum, &["n"], "total").grouped_by(&["region"]);
        let err = apply(scores(), &[spec], None).unwrap_err();
        assert!(matches!(err, PipelineError::ColumnNotFound(e) if e.column == "region"));
    }

    #[test]
    fn test_alias_collision_fails() {
        let spec = AggregateSpec::new(AggregateFunction::Sum, &["n"], "g").grouped_by(&["g"]);
        let err = apply(scores(), &[spec], None).unwrap_err();
        assert!(matches!(err, PipelineError::Config(ConfigError::DuplicateAlias(a)) if a == "g"));
    }

    #[test]
    fn test_drop_duplicates_keeps_first() {
        let table = Table::new(
            ["a", "b"],
            vec![
                vec![json!(1), json!("x")],
                vec![json!(2), json!("y")],
                vec![json!(1), json!("x")],
            ],
        )
        .unwrap();

        let result = drop_duplicates(table);
        assert_eq!(result.rows(), [vec![json!(1), json!("x")], vec![json!(2), json!("y")]]);
    }
}
