pub mod defaults;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use defaults::{suggest_target_path, Heuristics};

/// A rename table with identity fallback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RenameTable {
    entries: BTreeMap<String, String>,
}

impl RenameTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The mapped value, or `key` itself when no mapping exists.
    pub fn get<'a>(&'a self, key: &'a str) -> &'a str {
        self.entries.get(key).map(String::as_str).unwrap_or(key)
    }

    /// Explicit mapping; always replaces whatever was there.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Fill-if-absent: only keys with no current mapping are added.
    pub fn bulk_apply<I, K, V>(&mut self, defaults: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in defaults {
            self.entries.entry(key.into()).or_insert_with(|| value.into());
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Explicit value for `key`, without the identity fallback.
    pub fn lookup(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Entries whose value differs from their key.
    pub fn renames(&self) -> impl Iterator<Item = (&str, &str)> {
        self.iter().filter(|(k, v)| k != v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.entries
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RenameTable {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (key, value) in iter {
            table.set(key, value);
        }
        table
    }
}

/// Which rename table an override targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingKind {
    Template,
    Variable,
    Block,
}

/// The three rename tables used for a migration session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingStore {
    #[serde(default)]
    pub templates: RenameTable,
    #[serde(default)]
    pub variables: RenameTable,
    #[serde(default)]
    pub blocks: RenameTable,
}

impl MappingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(&self, kind: MappingKind) -> &RenameTable {
        match kind {
            MappingKind::Template => &self.templates,
            MappingKind::Variable => &self.variables,
            MappingKind::Block => &self.blocks,
        }
    }

    pub fn table_mut(&mut self, kind: MappingKind) -> &mut RenameTable {
        match kind {
            MappingKind::Template => &mut self.templates,
            MappingKind::Variable => &mut self.variables,
            MappingKind::Block => &mut self.blocks,
        }
    }

    /// Layer operator decisions on top; these always win over defaults.
    pub fn apply_overrides<I>(&mut self, kind: MappingKind, overrides: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let table = self.table_mut(kind);
        for (key, value) in overrides {
            table.set(key, value);
        }
    }
}
