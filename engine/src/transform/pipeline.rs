//! Pipeline orchestration: Join → Include → Aggregate → Sort.
//!
//! A [`Pipeline`] is built from a [`Config`] once; construction resolves
//! the document into a typed [`Plan`] and rejects contradictory sources.
//! Every run then loads fresh tables from a [`TableStore`] and fails fast on
//! the first error. Nothing is saved unless the whole run succeeds.
//!
//! # Example
//!
//! ```rust,ignore
//! use tabflow::{Config, CsvStore, Pipeline};
//!
//! let config = Config::load(Config::default_path())?;
//! let store = CsvStore::from_cwd()?;
//! let preview = Pipeline::new(&config)?.preview(&store, 10)?;
//! println!("{}", preview);
//! ```

use crate::config::Config;
use crate::error::{ConfigError, ConfigResult, PipelineResult};
use crate::logs::{log_info, log_info_indent, log_success};
use crate::models::Table;
use crate::store::TableStore;
use crate::transform::aggregate::{self, AggregateSpec};
use crate::transform::join::JoinSpec;
use crate::transform::projection::project;
use crate::transform::sort::{sort, SortSpec};

/// Rows shown by `preview` when the caller does not ask for a count.
pub const DEFAULT_PREVIEW_LIMIT: usize = 10;

/// Where the input table comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceSelection {
    /// `data.src`
    Single(String),
    /// `join.src`, combined by the join stage
    Join(JoinSpec),
}

impl SourceSelection {
    pub fn names(&self) -> Vec<&str> {
        match self {
            SourceSelection::Single(name) => vec![name.as_str()],
            SourceSelection::Join(spec) => spec.sources.iter().map(String::as_str).collect(),
        }
    }
}

/// Validated, typed form of a config document.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub source: SourceSelection,
    pub include: Option<Vec<String>>,
    /// `Some(vec![])` still drops duplicate rows.
    pub aggregates: Option<Vec<AggregateSpec>>,
    pub sort: Option<SortSpec>,
    pub destination: Option<String>,
}

impl Plan {
    pub fn from_config(config: &Config) -> ConfigResult<Self> {
        let source = match (config.source(), config.join_spec()?) {
            (Some(_), Some(_)) => return Err(ConfigError::ConflictingSources),
            (None, None) => return Err(ConfigError::MissingSource),
            (Some(src), None) => SourceSelection::Single(src.to_string()),
            (None, Some(join)) => SourceSelection::Join(join),
        };

        Ok(Self {
            source,
            include: config.include.clone(),
            aggregates: config.aggregate.is_some().then(|| config.aggregate_specs()).transpose()?,
            sort: config.sort_spec(),
            destination: config.destination().map(str::to_string),
        })
    }

    /// True when at least one stage besides loading is configured.
    pub fn has_transformations(&self) -> bool {
        matches!(self.source, SourceSelection::Join(_))
            || self.include.is_some()
            || self.aggregates.is_some()
            || self.sort.as_ref().is_some_and(|s| !s.is_empty())
    }
}

/// The transformation pipeline.
#[derive(Debug, Clone)]
pub struct Pipeline {
    plan: Plan,
}

impl Pipeline {
    /// Resolve `config` into a plan.
    pub fn new(config: &Config) -> ConfigResult<Self> {
        Ok(Self::from_plan(Plan::from_config(config)?))
    }

    pub fn from_plan(plan: Plan) -> Self {
        Self { plan }
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    /// Load every configured source, in configuration order.
    pub fn load_sources<S: TableStore + ?Sized>(&self, store: &S) -> PipelineResult<Vec<Table>> {
        self.plan
            .source
            .names()
            .into_iter()
            .map(|name| -> PipelineResult<Table> {
                log_info(format!("Loading {}", name));
                let table = store.load(name)?;
                log_info_indent(format!("{} rows, {} columns", table.len(), table.width()), 1);
                Ok(table)
            })
            .collect()
    }

    /// Load the sources and run every configured stage.
    pub fn run<S: TableStore + ?Sized>(&self, store: &S) -> PipelineResult<Table> {
        let tables = self.load_sources(store)?;
        self.run_tables(tables)
    }

    /// Run every configured stage over already-loaded tables, given in the
    /// same order as the configured sources.
    pub fn run_tables(&self, tables: Vec<Table>) -> PipelineResult<Table> {
        let mut table = match &self.plan.source {
            SourceSelection::Single(_) => tables.into_iter().next().ok_or(ConfigError::MissingSource)?,
            SourceSelection::Join(spec) => {
                let joined = spec.join(&tables)?;
                log_success(format!("Joined: {} rows, {} columns", joined.len(), joined.width()));
                joined
            }
        };

        if let Some(include) = &self.plan.include {
            table = project(table, Some(include.as_slice()))?;
            log_success(format!("Included {} columns", table.width()));
        }

        if let Some(specs) = &self.plan.aggregates {
            log_info(format!("Aggregating ({} specs)", specs.len()));
            table = aggregate::apply(table, specs, self.plan.include.as_deref())?;
        }

        if let Some(spec) = self.plan.sort.as_ref().filter(|s| !s.is_empty()) {
            table = sort(table, Some(spec))?;
            log_success(format!(
                "Sorted by {}",
                spec.keys().iter().map(|k| k.column.as_str()).collect::<Vec<_>>().join(", ")
            ));
        }

        Ok(table)
    }

    /// Run the pipeline and keep the first `rows` rows.
    pub fn preview<S: TableStore + ?Sized>(&self, store: &S, rows: usize) -> PipelineResult<Table> {
        if !self.plan.has_transformations() {
            log_info("No transformations configured, nothing to apply");
        }
        if let Some(include) = &self.plan.include {
            log_info(format!("Included columns: {}", include.join(", ")));
        }

        let table = self.run(store)?;
        Ok(table.head(rows))
    }

    /// Run the pipeline and save the result to the configured destination.
    pub fn apply<S: TableStore + ?Sized>(&self, store: &S) -> PipelineResult<Table> {
        let dest = self
            .plan
            .destination
            .as_deref()
            .ok_or(ConfigError::MissingDestination)?;

        let table = self.run(store)?;
        store.save(&table, dest)?;
        log_success(format!("Saved {} rows to {}", table.len(), dest));
        Ok(table)
    }
}
