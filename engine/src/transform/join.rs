//! Multi-source joins.
//!
//! Two strategies resolve several source tables into one:
//!
//! - **exact**: a left fold of SQL-style relational merges on key columns
//!   (`left`, `right`, `inner`, `outer`);
//! - **fuzzy**: column correspondences are discovered from approximate value
//!   matches, matched values are rewritten to their canonical spelling from
//!   the other table, and the remaining columns are cascaded by row position.
//!
//! ```text
//! A: id | name             B: company         result: id | name
//!    1  | Acme Companies      Acme Company             1  | Acme Company
//!                 name ↔ company (score 84.6 ≥ 80)
//! ```

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use super::fuzzy::{Choices, FuzzyMatcher, DEFAULT_THRESHOLD};
use crate::error::ConfigError;
use crate::logs::{log_info, log_info_indent, log_success_indent, log_warning};
use crate::models::{value_key, Row, Table};

/// Default number of leading values per column used to discover
/// correspondences.
pub const DEFAULT_PREVIEW_ROWS: usize = 20;

/// SQL join semantics for unmatched rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinMode {
    /// Keep every left row.
    #[default]
    Left,
    /// Keep every right row.
    Right,
    /// Keep matched pairs only.
    Inner,
    /// Keep everything.
    Outer,
}

impl JoinMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinMode::Left => "left",
            JoinMode::Right => "right",
            JoinMode::Inner => "inner",
            JoinMode::Outer => "outer",
        }
    }
}

impl FromStr for JoinMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "left" => Ok(JoinMode::Left),
            "right" => Ok(JoinMode::Right),
            "inner" => Ok(JoinMode::Inner),
            "outer" => Ok(JoinMode::Outer),
            _ => Err(ConfigError::UnsupportedJoinMode(s.to_string())),
        }
    }
}

impl fmt::Display for JoinMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tunables of the fuzzy strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuzzyJoinOptions {
    /// Minimum score (inclusive) for a value to count as a match
    pub threshold: f64,
    /// Leading values per column scanned during discovery
    pub preview_rows: usize,
}

impl Default for FuzzyJoinOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            preview_rows: DEFAULT_PREVIEW_ROWS,
        }
    }
}

/// How the sources are combined.
#[derive(Debug, Clone, PartialEq)]
pub enum JoinStrategy {
    Exact { keys: Vec<String>, mode: JoinMode },
    Fuzzy(FuzzyJoinOptions),
}

/// Join section of a plan: which sources, combined how.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinSpec {
    pub sources: Vec<String>,
    pub strategy: JoinStrategy,
}

impl JoinSpec {
    /// Join already-loaded tables (same order as `sources`).
    pub fn join(&self, tables: &[Table]) -> Result<Table, ConfigError> {
        match &self.strategy {
            JoinStrategy::Exact { keys, mode } => join_exact(tables, keys, *mode),
            JoinStrategy::Fuzzy(options) => join_fuzzy_all(tables, options),
        }
    }
}

// =============================================================================
// Exact join
// =============================================================================

/// Left fold of relational merges: `((t0 ⋈ t1) ⋈ t2) ...`.
pub fn join_exact(tables: &[Table], keys: &[String], mode: JoinMode) -> Result<Table, ConfigError> {
    let (first, rest) = tables.split_first().ok_or(ConfigError::NoJoinSources)?;
    if keys.is_empty() {
        return Err(ConfigError::MissingJoinKeys);
    }

    for (source_index, table) in tables.iter().enumerate() {
        if let Some(key) = keys.iter().find(|k| !table.has_column(k)) {
            return Err(ConfigError::JoinKeyNotFound {
                key: key.clone(),
                source_index,
            });
        }
    }

    log_info(format!(
        "Joining {} sources on [{}] ({})",
        tables.len(),
        keys.join(", "),
        mode
    ));

    let mut result = first.clone();
    for table in rest {
        result = merge(&result, table, keys, mode)?;
    }
    Ok(result)
}

/// Relational merge of two tables whose key columns have been checked.
fn merge(left: &Table, right: &Table, keys: &[String], mode: JoinMode) -> Result<Table, ConfigError> {
    let key_positions = |table: &Table| -> Vec<usize> {
        keys.iter().filter_map(|k| table.column_index(k)).collect()
    };
    let left_keys = key_positions(left);
    let right_keys = key_positions(right);

    let left_extra: Vec<usize> = (0..left.width()).filter(|i| !left_keys.contains(i)).collect();
    let right_extra: Vec<usize> = (0..right.width()).filter(|i| !right_keys.contains(i)).collect();

    // Overlapping non-key columns get `_x` / `_y` suffixes
    let left_names: HashSet<&str> = left_extra.iter().map(|&i| left.columns()[i].as_str()).collect();
    let right_names: HashSet<&str> = right_extra.iter().map(|&i| right.columns()[i].as_str()).collect();

    let mut columns: Vec<String> = left
        .columns()
        .iter()
        .enumerate()
        .map(|(i, c)| {
            if !left_keys.contains(&i) && right_names.contains(c.as_str()) {
                format!("{}_x", c)
            } else {
                c.clone()
            }
        })
        .collect();
    columns.extend(right_extra.iter().map(|&i| {
        let c = &right.columns()[i];
        if left_names.contains(c.as_str()) {
            format!("{}_y", c)
        } else {
            c.clone()
        }
    }));

    let build_row = |l: Option<&Row>, r: Option<&Row>| -> Row {
        let mut row: Row = match l {
            Some(l) => l.clone(),
            // Right-only row: keys come from the right side, the rest is null
            None => (0..left.width())
                .map(|i| match (left_keys.iter().position(|&k| k == i), r) {
                    (Some(pos), Some(r)) => r[right_keys[pos]].clone(),
                    _ => Value::Null,
                })
                .collect(),
        };
        row.extend(
            right_extra
                .iter()
                .map(|&i| r.map(|r| r[i].clone()).unwrap_or(Value::Null)),
        );
        row
    };

    let mut rows: Vec<Row> = Vec::new();

    match mode {
        JoinMode::Right => {
            let index = key_index(left, &left_keys);
            for r in right.rows() {
                match lookup(&index, r, &right_keys) {
                    Some(matches) => {
                        rows.extend(matches.iter().map(|&li| build_row(Some(&left.rows()[li]), Some(r))))
                    }
                    None => rows.push(build_row(None, Some(r))),
                }
            }
        }
        JoinMode::Left | JoinMode::Inner | JoinMode::Outer => {
            let index = key_index(right, &right_keys);
            let mut right_matched = vec![false; right.len()];

            for l in left.rows() {
                match lookup(&index, l, &left_keys) {
                    Some(matches) => {
                        for &ri in matches {
                            right_matched[ri] = true;
                            rows.push(build_row(Some(l), Some(&right.rows()[ri])));
                        }
                    }
                    None if mode != JoinMode::Inner => rows.push(build_row(Some(l), None)),
                    None => {}
                }
            }

            if mode == JoinMode::Outer {
                for (ri, r) in right.rows().iter().enumerate() {
                    if !right_matched[ri] {
                        rows.push(build_row(None, Some(r)));
                    }
                }
            }
        }
    }

    Table::new(columns, rows).map_err(|e| ConfigError::JoinColumnConflict(e.to_string()))
}

/// Row positions by key; rows with a null key are never indexed.
fn key_index(table: &Table, keys: &[usize]) -> HashMap<String, Vec<usize>> {
    let mut index: HashMap<String, Vec<usize>> = HashMap::new();
    for (i, row) in table.rows().iter().enumerate() {
        if let Some(key) = row_key(row, keys) {
            index.entry(key).or_default().push(i);
        }
    }
    index
}

fn lookup<'a>(index: &'a HashMap<String, Vec<usize>>, row: &Row, keys: &[usize]) -> Option<&'a Vec<usize>> {
    row_key(row, keys).and_then(|k| index.get(&k))
}

/// Key of a row; null never equals null.
fn row_key(row: &Row, keys: &[usize]) -> Option<String> {
    let values: Vec<Value> = keys.iter().map(|&k| row[k].clone()).collect();
    if values.iter().any(Value::is_null) {
        None
    } else {
        Some(value_key(&values))
    }
}

// =============================================================================
// Fuzzy join
// =============================================================================

/// One qualifying value match found during discovery.
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyMatch {
    pub reference: String,
    pub column: String,
    pub value: String,
    pub score: f64,
}

/// Column of A mapped onto its best-matching column of B.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnCorrespondence {
    pub source: String,
    pub target: String,
}

/// Fuzzy-join every source left to right.
pub fn join_fuzzy_all(tables: &[Table], options: &FuzzyJoinOptions) -> Result<Table, ConfigError> {
    if tables.len() < 2 {
        return Err(ConfigError::FuzzyJoinSources(tables.len()));
    }
    if !(0.0..=100.0).contains(&options.threshold) {
        return Err(ConfigError::InvalidThreshold(options.threshold));
    }
    if options.preview_rows == 0 {
        return Err(ConfigError::InvalidPreviewRows);
    }

    let mut result = tables[0].clone();
    for table in &tables[1..] {
        result = join_fuzzy(&result, table, options);
    }
    Ok(result)
}

/// Qualifying matches per column of A, in discovery order.
///
/// For each column of A, each of its first `preview_rows` values is matched
/// against every column of B (B order). Reference values are scored in
/// parallel; collection keeps sequential order, so evidence is deterministic.
pub fn discover_matches(
    a: &Table,
    b: &Table,
    matcher: &FuzzyMatcher,
    preview_rows: usize,
) -> Vec<(String, Vec<FuzzyMatch>)> {
    let choices: Vec<Choices<'_>> = (0..b.width()).map(|bi| Choices::new(b.column(bi))).collect();

    a.columns()
        .iter()
        .enumerate()
        .map(|(ai, col_a)| {
            log_info_indent(format!("Processing column: {}", col_a), 1);
            let preview: Vec<&Value> = a.column(ai).take(preview_rows).collect();

            let per_reference: Vec<Vec<FuzzyMatch>> = preview
                .par_iter()
                .map(|&reference| {
                    b.columns()
                        .iter()
                        .zip(&choices)
                        .filter_map(|(col_b, column_choices)| {
                            matcher.find(reference, column_choices).map(|m| FuzzyMatch {
                                reference: reference.as_str().unwrap_or_default().to_string(),
                                column: col_b.clone(),
                                value: m.value.to_string(),
                                score: m.score,
                            })
                        })
                        .collect()
                })
                .collect();

            (col_a.clone(), per_reference.into_iter().flatten().collect())
        })
        .collect()
}

/// First qualifying match decides the counterpart of each column of A.
pub fn correspondences(evidence: &[(String, Vec<FuzzyMatch>)]) -> Vec<ColumnCorrespondence> {
    evidence
        .iter()
        .filter_map(|(col_a, matches)| {
            matches.first().map(|m| ColumnCorrespondence {
                source: col_a.clone(),
                target: m.column.clone(),
            })
        })
        .collect()
}

/// Fuzzy join of two tables.
///
/// The result keeps A's rows and columns. Matched columns of A are
/// canonicalized to B's spelling, then every column of B that is neither in
/// A nor a match target is appended by row position: truncated when B is
/// longer, padded with null when B is shorter.
pub fn join_fuzzy(a: &Table, b: &Table, options: &FuzzyJoinOptions) -> Table {
    let matcher = FuzzyMatcher::new(options.threshold);

    let evidence = discover_matches(a, b, &matcher, options.preview_rows);
    let matched = correspondences(&evidence);

    let (mut columns, mut rows) = a.clone().into_parts();

    for corr in &matched {
        let (Some(ai), Some(bi)) = (a.column_index(&corr.source), b.column_index(&corr.target)) else {
            continue;
        };
        log_info_indent(format!("Merging column: \"{}\" with column: \"{}\"", corr.source, corr.target), 1);

        let choices = Choices::new(b.column(bi));
        // Scored against the original A values so rewrites never chain
        let rewrites: Vec<Option<String>> = a
            .rows()
            .par_iter()
            .map(|row| matcher.find(&row[ai], &choices).map(|m| m.value.to_string()))
            .collect();

        let mut rewritten = 0usize;
        for (row, rewrite) in rows.iter_mut().zip(rewrites) {
            if let Some(value) = rewrite {
                if row[ai].as_str() != Some(value.as_str()) {
                    rewritten += 1;
                }
                row[ai] = Value::String(value);
            }
        }
        log_success_indent(format!("{} values canonicalized", rewritten), 2);
    }

    let targets: HashSet<&str> = matched.iter().map(|c| c.target.as_str()).collect();
    let cascaded: Vec<usize> = (0..b.width())
        .filter(|&bi| {
            let col = b.columns()[bi].as_str();
            !a.has_column(col) && !targets.contains(col)
        })
        .collect();

    if !cascaded.is_empty() && a.len() != b.len() {
        log_warning(format!(
            "Row counts differ ({} vs {}): cascaded columns are {}",
            a.len(),
            b.len(),
            if b.len() > a.len() { "truncated" } else { "padded with null" }
        ));
    }

    for &bi in &cascaded {
        log_info_indent(format!("Cascading column: {}", b.columns()[bi]), 1);
        columns.push(b.columns()[bi].clone());
        for (ri, row) in rows.iter_mut().enumerate() {
            row.push(b.rows().get(ri).map(|r| r[bi].clone()).unwrap_or(Value::Null));
        }
    }

    Table::from_parts(columns, rows)
}
