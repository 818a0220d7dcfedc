//! Error types for the tabflow transformation pipeline.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`ConfigError`] - Missing, contradictory or unsupported configuration
//! - [`ColumnNotFoundError`] - A stage referenced a column the table lacks
//! - [`TableError`] - A table was constructed with inconsistent shape
//! - [`TableIoError`] - Loading or saving a table failed
//! - [`PipelineError`] - Top-level error of a pipeline run
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors caused by the configuration document or the specs derived from it.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Neither `data.src` nor `join.src` is configured.
    #[error("No data source found in the config file")]
    MissingSource,

    /// Both `data.src` and `join.src` are configured.
    #[error("You cannot specify both a data source and join sources in the config file")]
    ConflictingSources,

    /// `join.src` is present but empty.
    #[error("Join requires at least one source")]
    NoJoinSources,

    /// Exact join without key columns.
    #[error("Exact join requires at least one key column")]
    MissingJoinKeys,

    /// A join key is absent from one of the sources.
    #[error("Join key '{key}' does not exist in join source #{source_index}")]
    JoinKeyNotFound { key: String, source_index: usize },

    /// Merging produced two columns with the same name.
    #[error("Join produced a duplicate column: {0}")]
    JoinColumnConflict(String),

    /// Fuzzy join with fewer than two sources.
    #[error("Fuzzy join requires at least two sources, got {0}")]
    FuzzyJoinSources(usize),

    /// Fuzzy threshold outside of [0, 100].
    #[error("Fuzzy threshold must be within 0..=100, got {0}")]
    InvalidThreshold(f64),

    /// Fuzzy preview window of zero rows.
    #[error("Fuzzy preview window must hold at least one row")]
    InvalidPreviewRows,

    /// Aggregate function outside of the supported set.
    #[error("Function {0} not supported")]
    UnsupportedFunction(String),

    /// Join mode outside of left/right/inner/outer.
    #[error("Join mode {0} not supported")]
    UnsupportedJoinMode(String),

    /// Aggregate entry without an alias.
    #[error("Aggregate '{0}' requires an alias")]
    MissingAlias(String),

    /// Aggregate without target columns (only `count` may omit them).
    #[error("Aggregate '{0}' requires at least one target column")]
    MissingTargetColumns(String),

    /// Two aggregates share an alias, or an alias shadows an existing column.
    #[error("Duplicate aggregate alias: {0}")]
    DuplicateAlias(String),

    /// The same column was listed twice in `include`.
    #[error("Column '{0}' is included more than once")]
    DuplicateColumn(String),

    /// `data.dest` is required to save the result.
    #[error("No data destination found in the config file")]
    MissingDestination,

    /// Config file could not be read or written.
    #[error("Config IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid YAML for the expected shape.
    #[error("Error while loading YAML file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

// =============================================================================
// Column Lookup Errors
// =============================================================================

/// A stage referenced a column that is absent from its input table.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Column '{column}' does not exist in the dataset (referenced by {stage})")]
pub struct ColumnNotFoundError {
    /// Name of the missing column.
    pub column: String,
    /// Stage that asked for it (`include`, `aggregate`, `sort`, ...).
    pub stage: &'static str,
}

impl ColumnNotFoundError {
    pub fn new(column: impl Into<String>, stage: &'static str) -> Self {
        Self {
            column: column.into(),
            stage,
        }
    }
}

// =============================================================================
// Table Shape Errors
// =============================================================================

/// Errors while constructing a [`crate::Table`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TableError {
    /// Column names must be unique.
    #[error("Duplicate column: {0}")]
    DuplicateColumn(String),

    /// Every row must hold exactly one value per column.
    #[error("Row {row} has {found} values, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
}

// =============================================================================
// Table I/O Errors
// =============================================================================

/// Errors from the table store (CSV loading and saving).
#[derive(Debug, Error)]
pub enum TableIoError {
    /// Failed to read or write a file.
    #[error("Failed to access table file: {0}")]
    Io(#[from] std::io::Error),

    /// The named source does not exist.
    #[error("File '{0}' not found")]
    NotFound(String),

    /// Bytes could not be decoded with the detected encoding.
    #[error("Failed to decode content: {0}")]
    Encoding(String),

    /// Malformed CSV.
    #[error("Invalid CSV format: {0}")]
    Csv(#[from] csv::Error),

    /// Delimiter is not a single-byte character.
    #[error("Unsupported delimiter: {0:?}")]
    Delimiter(char),

    /// Empty file.
    #[error("CSV file is empty")]
    EmptyFile,

    /// No headers found.
    #[error("No headers found in CSV")]
    NoHeaders,

    /// Parsed content does not form a valid table.
    #[error("Invalid table: {0}")]
    Table(#[from] TableError),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline error.
///
/// This is the error type returned by [`crate::Pipeline::run`]. Any variant
/// aborts the run; nothing is written on failure.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Configuration error.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Missing column.
    #[error("{0}")]
    ColumnNotFound(#[from] ColumnNotFoundError),

    /// Table shape error.
    #[error("Table error: {0}")]
    Table(#[from] TableError),

    /// Load/save error.
    #[error("IO error: {0}")]
    Io(#[from] TableIoError),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for configuration handling.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for table store operations.
pub type TableIoResult<T> = Result<T, TableIoError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
