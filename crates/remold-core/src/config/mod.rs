pub mod schema;

use std::path::{Path, PathBuf};

use crate::error::{RemoldError, Result};

pub use schema::{MappingsConfig, MigrationConfig};

pub const CONFIG_FILE_NAME: &str = "remold.toml";

/// Load and validate a MigrationConfig from a remold.toml file.
///
/// `path` may name the file itself or the directory holding it. Relative
/// `source_dir`/`target_dir` values are resolved against the file's directory.
pub fn load_config(path: &Path) -> Result<MigrationConfig> {
    let config_path = if path.is_dir() {
        path.join(CONFIG_FILE_NAME)
    } else {
        path.to_path_buf()
    };

    if !config_path.exists() {
        return Err(RemoldError::ConfigNotFound { path: config_path });
    }

    let content = std::fs::read_to_string(&config_path).map_err(|e| RemoldError::Io {
        context: format!("reading {}", config_path.display()),
        source: e,
    })?;

    let mut config: MigrationConfig =
        toml::from_str(&content).map_err(|e| RemoldError::ConfigParse {
            path: config_path.clone(),
            source: e,
        })?;

    if let Some(root) = config_path.parent() {
        config.source_dir = resolve_against(root, &config.source_dir);
        config.target_dir = resolve_against(root, &config.target_dir);
    }

    config.validate()?;

    Ok(config)
}

fn resolve_against(root: &Path, path: &Path) -> PathBuf {
    if path.as_os_str().is_empty() || path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// Commented sample written by `remold init`.
pub fn sample_config() -> String {
    r#"# remold migration config

# Legacy template tree, relative to this file.
source_dir = "templates"
# Where rewritten templates are written.
target_dir = "templates_new"

# Layout every migrated template extends. Set to "" to omit the extends line.
base_template = "base.html"

# Regexes matched against the start of each relative path.
exclude_patterns = ["vendor/", ".*\\.bak\\.html"]

# Seed block renames from [heuristics.blocks].
auto_preserve_blocks = true
# Seed variable renames from [heuristics.variables].
auto_map_variables = false

extensions = ["html"]

# Uncomment to replace the built-in rename suggestions.
# [heuristics.variables]
# user_name = "username"
#
# [heuristics.blocks]
# content = "main_content"

# Manual renames; these always win over heuristics.
# Mapping a template to "" skips it.
[mappings.templates]

[mappings.variables]

[mappings.blocks]
"#
    .to_string()
}

/// Write the sample config into `dir`, refusing to clobber an existing file unless `force`.
pub fn write_sample_config(dir: &Path, force: bool) -> Result<PathBuf> {
    let config_path = dir.join(CONFIG_FILE_NAME);
    if config_path.exists() && !force {
        return Err(RemoldError::ConfigInvalid {
            reason: format!(
                "{} already exists (use --force to overwrite)",
                config_path.display()
            ),
        });
    }

    std::fs::create_dir_all(dir).map_err(|e| RemoldError::Io {
        context: format!("creating directory {}", dir.display()),
        source: e,
    })?;
    std::fs::write(&config_path, sample_config()).map_err(|e| RemoldError::Io {
        context: format!("writing {}", config_path.display()),
        source: e,
    })?;

    Ok(config_path)
}
