//! YAML configuration document.
//!
//! The document lives under the `.exporter` home directory of the working
//! directory; its file name comes from `EXPORTER_CONFIG_NAME` (default
//! `config.yml`). Sections are kept raw here so the CLI can edit and write
//! them back unchanged; [`Config::join_spec`], [`Config::aggregate_specs`]
//! and [`Config::sort_spec`] turn them into the typed specs the stages run.
//!
//! ```yaml
//! data: { src: input.csv, dest: output.csv }
//! join: { src: [a.csv, b.csv], on: [id], how: left }
//! include: [id, name]
//! aggregate:
//!   - { function: sum, columns: n, grouped: [g], alias: total }
//! sort: { ascending: [g], descending: [total] }
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, ConfigResult};
use crate::store::DEFAULT_HOME_DIR;
use crate::transform::aggregate::{AggregateFunction, AggregateSpec};
use crate::transform::fuzzy::DEFAULT_THRESHOLD;
use crate::transform::join::{FuzzyJoinOptions, JoinMode, JoinSpec, JoinStrategy, DEFAULT_PREVIEW_ROWS};
use crate::transform::sort::SortSpec;

/// Directory holding the config file and the data files.
pub const CONFIG_HOME: &str = DEFAULT_HOME_DIR;

pub const DEFAULT_CONFIG_NAME: &str = "config.yml";

/// Environment variable overriding the config file name.
pub const CONFIG_NAME_ENV: &str = "EXPORTER_CONFIG_NAME";

// =============================================================================
// Document sections
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dest: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinSection {
    #[serde(default)]
    pub src: Vec<String>,

    /// Key columns, required unless `fuzzy`
    #[serde(default, deserialize_with = "one_or_many")]
    pub on: Vec<String>,

    #[serde(default = "default_how")]
    pub how: String,

    #[serde(default)]
    pub fuzzy: bool,

    #[serde(default = "default_threshold")]
    pub threshold: f64,

    #[serde(default = "default_preview_rows")]
    pub preview_rows: usize,
}

impl Default for JoinSection {
    fn default() -> Self {
        Self {
            src: Vec::new(),
            on: Vec::new(),
            how: default_how(),
            fuzzy: false,
            threshold: default_threshold(),
            preview_rows: default_preview_rows(),
        }
    }
}

fn default_how() -> String {
    JoinMode::default().as_str().to_string()
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

fn default_preview_rows() -> usize {
    DEFAULT_PREVIEW_ROWS
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateEntry {
    pub function: String,

    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<String>,

    #[serde(
        default,
        alias = "group",
        deserialize_with = "optional_one_or_many",
        skip_serializing_if = "Option::is_none"
    )]
    pub grouped: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SortSection {
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub ascending: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub descending: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl From<OneOrMany> for Vec<String> {
    fn from(value: OneOrMany) -> Self {
        match value {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        }
    }
}

/// A column list may be written as a single scalar.
fn one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(Option::<OneOrMany>::deserialize(deserializer)?
        .map(Vec::from)
        .unwrap_or_default())
}

fn optional_one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<String>>, D::Error> {
    Ok(Option::<OneOrMany>::deserialize(deserializer)?.map(Vec::from))
}

// =============================================================================
// Config
// =============================================================================

/// The whole configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<DataSection>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join: Option<JoinSection>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregate: Option<Vec<AggregateEntry>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortSection>,
}

impl Config {
    /// `.exporter/<EXPORTER_CONFIG_NAME or config.yml>` under the working directory.
    pub fn default_path() -> PathBuf {
        let name = std::env::var(CONFIG_NAME_ENV)
            .ok()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CONFIG_NAME.to_string());
        Path::new(CONFIG_HOME).join(name)
    }

    /// Read a config file. An empty file is an empty config.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Like [`Config::load`], but a missing file is an empty config.
    pub fn load_or_default(path: impl AsRef<Path>) -> ConfigResult<Self> {
        match fs::read_to_string(path.as_ref()) {
            Ok(content) => Self::from_yaml(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn from_yaml(content: &str) -> ConfigResult<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn to_yaml(&self) -> ConfigResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Serialize to `path`, creating the home directory if needed.
    pub fn write(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_yaml()?)?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Editing
    // -------------------------------------------------------------------------

    /// Store the source and destination data files.
    pub fn init(&mut self, src: impl Into<String>, dest: impl Into<String>) {
        let data = self.data.get_or_insert_with(DataSection::default);
        data.src = Some(src.into());
        data.dest = Some(dest.into());
    }

    pub fn set_include(&mut self, columns: Vec<String>) {
        self.include = Some(columns);
    }

    pub fn push_aggregate(&mut self, entry: AggregateEntry) {
        self.aggregate.get_or_insert_with(Vec::new).push(entry);
    }

    /// Configure join sources. A single data source and join sources are
    /// exclusive, so `data.src` is cleared.
    pub fn set_join(&mut self, join: JoinSection) {
        if let Some(data) = self.data.as_mut() {
            data.src = None;
        }
        self.join = Some(join);
    }

    pub fn set_sort(&mut self, sort: SortSection) {
        self.sort = Some(sort);
    }

    // -------------------------------------------------------------------------
    // Typed views
    // -------------------------------------------------------------------------

    pub fn source(&self) -> Option<&str> {
        self.data.as_ref().and_then(|d| d.src.as_deref())
    }

    pub fn destination(&self) -> Option<&str> {
        self.data.as_ref().and_then(|d| d.dest.as_deref())
    }

    pub fn join_spec(&self) -> ConfigResult<Option<JoinSpec>> {
        self.join.as_ref().map(JoinSection::to_spec).transpose()
    }

    /// Typed aggregates; aliases must be unique across the run.
    pub fn aggregate_specs(&self) -> ConfigResult<Vec<AggregateSpec>> {
        let entries = self.aggregate.as_deref().unwrap_or_default();
        let mut aliases = HashSet::new();

        entries
            .iter()
            .map(|entry| {
                let spec = entry.to_spec()?;
                if !aliases.insert(spec.alias.clone()) {
                    return Err(ConfigError::DuplicateAlias(spec.alias));
                }
                Ok(spec)
            })
            .collect()
    }

    pub fn sort_spec(&self) -> Option<SortSpec> {
        self.sort.as_ref().map(|s| SortSpec {
            ascending: s.ascending.clone(),
            descending: s.descending.clone(),
        })
    }
}

impl JoinSection {
    pub fn to_spec(&self) -> ConfigResult<JoinSpec> {
        if self.src.is_empty() {
            return Err(ConfigError::NoJoinSources);
        }

        let strategy = if self.fuzzy {
            if self.src.len() < 2 {
                return Err(ConfigError::FuzzyJoinSources(self.src.len()));
            }
            if !(0.0..=100.0).contains(&self.threshold) {
                return Err(ConfigError::InvalidThreshold(self.threshold));
            }
            if self.preview_rows == 0 {
                return Err(ConfigError::InvalidPreviewRows);
            }
            JoinStrategy::Fuzzy(FuzzyJoinOptions {
                threshold: self.threshold,
                preview_rows: self.preview_rows,
            })
        } else {
            if self.on.is_empty() {
                return Err(ConfigError::MissingJoinKeys);
            }
            JoinStrategy::Exact {
                keys: self.on.clone(),
                mode: self.how.parse()?,
            }
        };

        Ok(JoinSpec {
            sources: self.src.clone(),
            strategy,
        })
    }
}

impl AggregateEntry {
    pub fn new(function: &str, columns: Vec<String>, grouped: Option<Vec<String>>, alias: &str) -> Self {
        Self {
            function: function.to_string(),
            columns,
            grouped,
            alias: Some(alias.to_string()),
        }
    }

    pub fn to_spec(&self) -> ConfigResult<AggregateSpec> {
        let function: AggregateFunction = self.function.parse()?;
        let alias = self
            .alias
            .clone()
            .filter(|a| !a.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingAlias(self.function.clone()))?;

        // count only needs the partition
        if self.columns.is_empty() && function != AggregateFunction::Count {
            return Err(ConfigError::MissingTargetColumns(self.function.clone()));
        }

        Ok(AggregateSpec {
            function,
            columns: self.columns.clone(),
            group: self.grouped.clone().filter(|g| !g.is_empty()),
            alias,
        })
    }
}
