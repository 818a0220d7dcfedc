//! Table store - load named sources and persist results.
//!
//! The pipeline only talks to the [`TableStore`] trait. [`CsvStore`] resolves
//! names against a home directory (`.exporter/` by default) and
//! [`MemoryStore`] keeps tables in memory for tests and embedding callers.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::TableIoError;
use crate::logs::log_success;
use crate::models::Table;
use crate::parser::{parse_bytes_auto, write_csv};

/// Directory where sources, results and the config live (relative to cwd)
pub const DEFAULT_HOME_DIR: &str = ".exporter";

/// Load/save collaborator of the pipeline.
pub trait TableStore {
    /// Load a named source, preserving column and row order.
    fn load(&self, source: &str) -> Result<Table, TableIoError>;

    /// Persist a table under `dest`. A failed save leaves any previous
    /// content of `dest` untouched.
    fn save(&self, table: &Table, dest: &str) -> Result<(), TableIoError>;
}

/// CSV files under a home directory
#[derive(Debug, Clone)]
pub struct CsvStore {
    home: PathBuf,
}

impl CsvStore {
    pub fn new(home: impl AsRef<Path>) -> Self {
        Self {
            home: home.as_ref().to_path_buf(),
        }
    }

    /// Store rooted at `./.exporter`
    pub fn from_cwd() -> Result<Self, TableIoError> {
        Ok(Self::new(std::env::current_dir()?.join(DEFAULT_HOME_DIR)))
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Absolute names are used as-is, relative ones live under the home dir
    pub fn resolve(&self, name: &str) -> PathBuf {
        let path = Path::new(name);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.home.join(path)
        }
    }
}

impl TableStore for CsvStore {
    fn load(&self, source: &str) -> Result<Table, TableIoError> {
        let path = self.resolve(source);
        if !path.exists() {
            return Err(TableIoError::NotFound(path.display().to_string()));
        }

        let bytes = fs::read(&path)?;
        let parsed = parse_bytes_auto(&bytes)?;
        log_success(format!(
            "Loaded {} ({} rows, {} columns, {}, '{}')",
            source,
            parsed.table.len(),
            parsed.table.width(),
            parsed.encoding,
            format_delimiter(parsed.delimiter),
        ));

        Ok(parsed.table)
    }

    fn save(&self, table: &Table, dest: &str) -> Result<(), TableIoError> {
        let path = self.resolve(dest);
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        // Write next to the destination, then atomically move into place
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        write_csv(table, tmp.as_file_mut())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| TableIoError::Io(e.error))?;

        log_success(format!("Saved {} rows to {}", table.len(), path.display()));
        Ok(())
    }
}

/// Format delimiter for display
fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<String, Table>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with_table(self, name: impl Into<String>, table: Table) -> Self {
        self.insert(name, table);
        self
    }

    pub fn insert(&self, name: impl Into<String>, table: Table) {
        self.lock().insert(name.into(), table);
    }

    pub fn get(&self, name: &str) -> Option<Table> {
        self.lock().get(name).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Table>> {
        // A panic while holding the lock cannot leave a half-written table
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TableStore for MemoryStore {
    fn load(&self, source: &str) -> Result<Table, TableIoError> {
        self.get(source)
            .ok_or_else(|| TableIoError::NotFound(source.to_string()))
    }

    fn save(&self, table: &Table, dest: &str) -> Result<(), TableIoError> {
        self.insert(dest, table.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Table {
        Table::new(
            ["id", "name"],
            vec![vec![json!(1), json!("Acme")], vec![json!(2), json!("Globex")]],
        )
        .unwrap()
    }

    #[test]
    fn test_csv_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path());

        store.save(&sample(), "out.csv").unwrap();
        let loaded = store.load("out.csv").unwrap();

        assert_eq!(loaded, sample());
    }

    #[test]
    fn test_csv_store_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path());

        let err = store.load("nope.csv").unwrap_err();
        assert!(matches!(err, TableIoError::NotFound(_)));
        assert!(err.to_string().contains("nope.csv"));
    }

    #[test]
    fn test_csv_store_overwrites_destination() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path());
        fs::write(dir.path().join("out.csv"), "stale\n1\n").unwrap();

        store.save(&sample(), "out.csv").unwrap();

        let content = fs::read_to_string(dir.path().join("out.csv")).unwrap();
        assert!(content.starts_with("id,name\n"));
    }

    #[test]
    fn test_csv_store_failed_save_keeps_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path());
        // Destination is a directory: persist must fail, nothing is clobbered
        fs::create_dir(dir.path().join("out.csv")).unwrap();

        assert!(store.save(&sample(), "out.csv").is_err());
        assert!(dir.path().join("out.csv").is_dir());
        let leftovers = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_resolve_relative_and_absolute() {
        let store = CsvStore::new("/data/home");
        assert_eq!(store.resolve("a.csv"), PathBuf::from("/data/home/a.csv"));
        assert_eq!(store.resolve("/tmp/b.csv"), PathBuf::from("/tmp/b.csv"));
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new().with_table("a", sample());

        assert_eq!(store.load("a").unwrap(), sample());
        assert!(matches!(store.load("b"), Err(TableIoError::NotFound(_))));

        store.save(&sample(), "b").unwrap();
        assert_eq!(store.get("b"), Some(sample()));
    }
}
