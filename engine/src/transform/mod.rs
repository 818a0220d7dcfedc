//! Transformation module.
//!
//! This module holds the pipeline stages and their orchestration:
//! - Fuzzy: normalized similarity scoring
//! - Join: exact key merges and fuzzy column correspondence
//! - Projection, Aggregate, Sort: the remaining stages
//! - Pipeline: fixed-order composition of the stages

pub mod aggregate;
pub mod fuzzy;
pub mod join;
pub mod pipeline;
pub mod projection;
pub mod sort;

pub use aggregate::{AggregateFunction, AggregateSpec};
pub use fuzzy::FuzzyMatcher;
pub use join::{FuzzyJoinOptions, JoinMode, JoinSpec, JoinStrategy};
pub use pipeline::{Pipeline, Plan, SourceSelection, DEFAULT_PREVIEW_LIMIT};
pub use projection::project;
pub use sort::{SortDirection, SortKey, SortSpec};
