//! Identifier Table - series name interning with JSON persistence
//!
//! Maps series names to stable integer ids and back. The table is owned
//! by the storage layer and shared read-only across queries; the query
//! pipeline only consumes it through [`IdLookup`].
//!
//! # Usage
//! ```ignore
//! let mut table = IdTable::new();
//! let cpu = table.intern("cpu.user");
//! assert_eq!(table.lookup("cpu.user"), Some(cpu));
//! assert_eq!(table.name_of(cpu), Some("cpu.user"));
//! ```

use crate::storage::{StorageError, StorageResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// A requested series name that the table does not know
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown series name: {0}")]
pub struct UnknownName(pub String);

/// Read access to an identifier table.
pub trait IdLookup {
    /// Resolve a name to its id
    fn lookup(&self, name: &str) -> Option<u64>;

    /// Resolve an id back to its name
    fn name_of(&self, id: u64) -> Option<&str>;

    /// Build an `id → group` table for a list of names of interest.
    ///
    /// The group is the position of the name in `names`. A name listed
    /// twice keeps its first group.
    fn match_table(&self, names: &[String]) -> Result<HashMap<u64, usize>, UnknownName> {
        let mut table = HashMap::with_capacity(names.len());
        for (group, name) in names.iter().enumerate() {
            let id = self
                .lookup(name)
                .ok_or_else(|| UnknownName(name.clone()))?;
            table.entry(id).or_insert(group);
        }
        Ok(table)
    }
}

/// Bidirectional name ⇄ id table
#[derive(Debug, Clone, Default)]
pub struct IdTable {
    /// Names indexed by id
    names: Vec<String>,
    /// Name to id lookup
    name_to_id: HashMap<String, u64>,
}

/// Serialization format for JSON persistence
#[derive(Serialize, Deserialize)]
struct IdTableData {
    /// Version for future compatibility
    version: u32,
    /// Names in id order
    names: Vec<String>,
}

impl IdTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from JSON file; a missing file yields an empty table
    pub fn load(path: &Path) -> StorageResult<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let content = std::fs::read_to_string(path)?;
        let data: IdTableData = serde_json::from_str(&content)?;

        let mut table = Self::new();
        for name in data.names {
            if table.name_to_id.contains_key(&name) {
                return Err(StorageError::Serialization(format!(
                    "Duplicate series name in id table: {}",
                    name
                )));
            }
            table.intern(&name);
        }
        Ok(table)
    }

    /// Save to JSON file
    pub fn save(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let data = IdTableData {
            version: 1,
            names: self.names.clone(),
        };
        let content = serde_json::to_string_pretty(&data)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Intern a name, returning its id. Existing names keep their id.
    pub fn intern(&mut self, name: &str) -> u64 {
        if let Some(&id) = self.name_to_id.get(name) {
            return id;
        }

        let id = self.names.len() as u64;
        self.names.push(name.to_string());
        self.name_to_id.insert(name.to_string(), id);
        id
    }

    /// Number of interned names
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Iterate over `(id, name)` pairs in id order
    pub fn iter(&self) -> impl Iterator<Item = (u64, &str)> {
        self.names
            .iter()
            .enumerate()
            .map(|(id, name)| (id as u64, name.as_str()))
    }
}

impl IdLookup for IdTable {
    fn lookup(&self, name: &str) -> Option<u64> {
        self.name_to_id.get(name).copied()
    }

    fn name_of(&self, id: u64) -> Option<&str> {
        self.names.get(id as usize).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_intern_is_stable() {
        let mut table = IdTable::new();

        let cpu = table.intern("cpu");
        let mem = table.intern("mem");
        assert_ne!(cpu, mem);
        assert_eq!(table.intern("cpu"), cpu);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_bidirectional_lookup() {
        let mut table = IdTable::new();
        let id = table.intern("disk.io");

        assert_eq!(table.lookup("disk.io"), Some(id));
        assert_eq!(table.name_of(id), Some("disk.io"));
        assert_eq!(table.lookup("missing"), None);
        assert_eq!(table.name_of(99), None);
    }

    #[test]
    fn test_match_table_groups() {
        let mut table = IdTable::new();
        let a = table.intern("a");
        let b = table.intern("b");
        table.intern("c");

        let matches = table.match_table(&names(&["b", "a"])).unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[&b], 0);
        assert_eq!(matches[&a], 1);
    }

    #[test]
    fn test_match_table_duplicate_keeps_first_group() {
        let mut table = IdTable::new();
        let a = table.intern("a");

        let matches = table.match_table(&names(&["a", "a"])).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[&a], 0);
    }

    #[test]
    fn test_match_table_unknown_name() {
        let mut table = IdTable::new();
        table.intern("a");

        let err = table.match_table(&names(&["a", "nope"])).unwrap_err();
        assert_eq!(err, UnknownName("nope".to_string()));
        assert_eq!(err.to_string(), "Unknown series name: nope");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("meta").join("ids.json");

        let mut table = IdTable::new();
        table.intern("cpu");
        table.intern("mem");
        table.save(&path).unwrap();

        let loaded = IdTable::load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.lookup("cpu"), table.lookup("cpu"));
        assert_eq!(loaded.lookup("mem"), table.lookup("mem"));
        let pairs: Vec<_> = loaded.iter().collect();
        assert_eq!(pairs, vec![(0, "cpu"), (1, "mem")]);
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let table = IdTable::load(&dir.path().join("absent.json")).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_load_rejects_duplicates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ids.json");
        std::fs::write(&path, r#"{"version":1,"names":["a","a"]}"#).unwrap();

        assert!(matches!(
            IdTable::load(&path),
            Err(StorageError::Serialization(_))
        ));
    }
}
