//! # Tabflow - declarative tabular transformations
//!
//! Tabflow reads a YAML config describing one data source (or several join
//! sources) and runs a fixed pipeline of stages over it: join, column
//! inclusion, aggregation and sort. The result is previewed or saved as CSV.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  CSV files  │────▶│   Parser    │────▶│  Pipeline   │────▶│  CSV file   │
//! │  (ISO/UTF8) │     │  (auto-enc) │     │ J → I → A → S│     │  (atomic)   │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//!                                                ▲
//!                                         ┌─────────────┐
//!                                         │ config.yml  │
//!                                         └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tabflow::{Config, CsvStore, Pipeline};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load(Config::default_path())?;
//!     let table = Pipeline::new(&config)?.apply(&CsvStore::from_cwd()?)?;
//!     println!("Saved {} rows", table.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - The `Table` value
//! - [`parser`] - CSV parsing with auto-detection
//! - [`store`] - Loading and saving tables
//! - [`config`] - YAML configuration document
//! - [`transform`] - Join, projection, aggregation, sort and the pipeline
//! - [`validation`] - Column existence checks
//! - [`logs`] - Pipeline log broadcasting

// Core modules
pub mod error;
pub mod models;

// Parsing and storage
pub mod parser;
pub mod store;

// Configuration
pub mod config;

// Transformation
pub mod transform;

// Validation
pub mod validation;

// Logging
pub mod logs;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ColumnNotFoundError,
    ConfigError,
    ConfigResult,
    PipelineError,
    PipelineResult,
    TableError,
    TableIoError,
    TableIoResult,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{Row, Table};

// =============================================================================
// Re-exports - CSV Parsing and Stores
// =============================================================================

pub use parser::{
    decode_content,
    detect_delimiter,
    detect_encoding,
    parse_bytes_auto,
    parse_csv,
    table_to_csv,
    write_csv,
    ParseResult,
};

pub use store::{CsvStore, MemoryStore, TableStore};

// =============================================================================
// Re-exports - Config
// =============================================================================

pub use config::{AggregateEntry, Config, JoinSection, SortSection};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::{
    AggregateFunction,
    AggregateSpec,
    FuzzyJoinOptions,
    JoinMode,
    JoinSpec,
    JoinStrategy,
    Pipeline,
    Plan,
    SortSpec,
    SourceSelection,
    DEFAULT_PREVIEW_LIMIT,
};

// =============================================================================
// Re-exports - Validation and Logs
// =============================================================================

pub use validation::missing_columns;

pub use logs::{LogEntry, LogLevel, LOG_BROADCASTER};
