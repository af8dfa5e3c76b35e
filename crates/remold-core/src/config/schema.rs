use std::collections::BTreeMap;
use std::path::PathBuf;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{RemoldError, Result};
use crate::mapping::{Heuristics, MappingKind, MappingStore};

/// Root config structure deserialized from remold.toml.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MigrationConfig {
    /// Root of the legacy template tree.
    pub source_dir: PathBuf,

    /// Root the rewritten templates are written under.
    pub target_dir: PathBuf,

    /// Layout every rewritten template extends. Empty disables the `extends` line.
    #[serde(default = "default_base_template")]
    pub base_template: String,

    /// Regexes matched against the start of each relative path.
    #[serde(default)]
    pub exclude_patterns: Vec<String>,

    /// Seed block renames from the heuristics table.
    #[serde(default = "default_true")]
    pub auto_preserve_blocks: bool,

    /// Seed variable renames from the heuristics table.
    #[serde(default)]
    pub auto_map_variables: bool,

    /// File extensions (without the dot) treated as templates.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    #[serde(default)]
    pub heuristics: Heuristics,

    /// Manual renames applied on top of any heuristics.
    #[serde(default)]
    pub mappings: MappingsConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MappingsConfig {
    #[serde(default)]
    pub templates: BTreeMap<String, String>,
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    #[serde(default)]
    pub blocks: BTreeMap<String, String>,
}

impl MappingsConfig {
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty() && self.variables.is_empty() && self.blocks.is_empty()
    }

    /// Layer the configured renames onto `store` as explicit overrides.
    pub fn apply_to(&self, store: &mut MappingStore) {
        let tables = [
            (MappingKind::Template, &self.templates),
            (MappingKind::Variable, &self.variables),
            (MappingKind::Block, &self.blocks),
        ];
        for (kind, table) in tables {
            store.apply_overrides(kind, table.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
    }
}

fn default_base_template() -> String {
    "base.html".to_string()
}

fn default_true() -> bool {
    true
}

fn default_extensions() -> Vec<String> {
    vec!["html".to_string()]
}

impl MigrationConfig {
    /// A config with every optional field at its default.
    pub fn new(source_dir: impl Into<PathBuf>, target_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            target_dir: target_dir.into(),
            base_template: default_base_template(),
            exclude_patterns: Vec::new(),
            auto_preserve_blocks: true,
            auto_map_variables: false,
            extensions: default_extensions(),
            heuristics: Heuristics::default(),
            mappings: MappingsConfig::default(),
        }
    }

    /// Validate the config for internal consistency.
    pub fn validate(&self) -> Result<()> {
        if self.source_dir.as_os_str().is_empty() {
            return Err(RemoldError::ConfigInvalid {
                reason: "'source_dir' must not be empty".into(),
            });
        }
        if self.target_dir.as_os_str().is_empty() {
            return Err(RemoldError::ConfigInvalid {
                reason: "'target_dir' must not be empty".into(),
            });
        }
        if self.source_dir == self.target_dir {
            return Err(RemoldError::ConfigInvalid {
                reason: "'source_dir' and 'target_dir' must differ".into(),
            });
        }
        if self.extensions.iter().all(|e| e.trim_start_matches('.').is_empty()) {
            return Err(RemoldError::ConfigInvalid {
                reason: "'extensions' must list at least one file extension".into(),
            });
        }

        self.compiled_excludes()?;
        Ok(())
    }

    /// Compile the exclude patterns, anchored at the start of the path.
    pub fn compiled_excludes(&self) -> Result<Vec<Regex>> {
        self.exclude_patterns
            .iter()
            .map(|pattern| {
                Regex::new(&format!("^(?:{pattern})")).map_err(|e| {
                    RemoldError::InvalidExcludePattern {
                        pattern: pattern.clone(),
                        source: e,
                    }
                })
            })
            .collect()
    }

    /// Whether `ext` (with or without a leading dot) is a configured template extension.
    pub fn matches_extension(&self, ext: &str) -> bool {
        let ext = ext.trim_start_matches('.');
        self.extensions
            .iter()
            .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(ext))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_minimal_toml() {
        let config: MigrationConfig =
            toml::from_str("source_dir = \"legacy\"\ntarget_dir = \"out\"\n").unwrap();
        assert_eq!(config.base_template, "base.html");
        assert!(config.auto_preserve_blocks);
        assert!(!config.auto_map_variables);
        assert_eq!(config.extensions, vec!["html"]);
        assert_eq!(config.heuristics, Heuristics::default());
        assert!(config.mappings.is_empty());
        config.validate().unwrap();
    }

    #[test]
    fn test_heuristics_table_replaces_defaults() {
        let config: MigrationConfig = toml::from_str(
            r#"
source_dir = "legacy"
target_dir = "out"

[heuristics.variables]
usr = "user"
"#,
        )
        .unwrap();
        assert_eq!(config.heuristics.variables.len(), 1);
        assert_eq!(config.heuristics.variables["usr"], "user");
        assert_eq!(config.heuristics.blocks["content"], "main_content");
    }

    #[test]
    fn test_validate_rejects_same_source_and_target() {
        let config = MigrationConfig::new("templates", "templates");
        assert!(matches!(
            config.validate(),
            Err(RemoldError::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_empty_extensions() {
        let mut config = MigrationConfig::new("a", "b");
        config.extensions = vec![".".into()];
        assert!(matches!(
            config.validate(),
            Err(RemoldError::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_bad_exclude_pattern() {
        let mut config = MigrationConfig::new("a", "b");
        config.exclude_patterns = vec!["legacy/(".into()];
        match config.validate() {
            Err(RemoldError::InvalidExcludePattern { pattern, .. }) => {
                assert_eq!(pattern, "legacy/(")
            }
            other => panic!("expected invalid pattern, got {other:?}"),
        }
    }

    #[test]
    fn test_excludes_are_anchored() {
        let mut config = MigrationConfig::new("a", "b");
        config.exclude_patterns = vec!["old/".into(), ".*_test\\.html".into()];
        let excludes = config.compiled_excludes().unwrap();
        assert!(excludes[0].is_match("old/index.html"));
        assert!(!excludes[0].is_match("pages/old/index.html"));
        assert!(excludes[1].is_match("pages/nav_test.html"));
    }

    #[test]
    fn test_mappings_apply_as_overrides() {
        let config: MigrationConfig = toml::from_str(
            r#"
source_dir = "legacy"
target_dir = "out"

[mappings.blocks]
content = "body"

[mappings.templates]
"old.html" = ""
"#,
        )
        .unwrap();
        let mut store = MappingStore::new();
        store.blocks.bulk_apply([("content", "main_content")]);
        config.mappings.apply_to(&mut store);
        assert_eq!(store.blocks.get("content"), "body");
        assert_eq!(store.templates.lookup("old.html"), Some(""));
    }

    #[test]
    fn test_matches_extension() {
        let mut config = MigrationConfig::new("a", "b");
        config.extensions = vec!["html".into(), ".j2".into()];
        assert!(config.matches_extension("HTML"));
        assert!(config.matches_extension("j2"));
        assert!(!config.matches_extension("txt"));
    }
}
