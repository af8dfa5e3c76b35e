use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::RenameTable;

const DEFAULT_VARIABLE_RENAMES: &[(&str, &str)] = &[
    ("user_name", "username"),
    ("user_email", "email"),
    ("page_title", "title"),
    ("current_user", "user"),
    ("nav_items", "navigation"),
];

const DEFAULT_BLOCK_RENAMES: &[(&str, &str)] = &[
    ("content", "main_content"),
    ("sidebar", "aside_content"),
    ("page_scripts", "scripts"),
    ("page_styles", "styles"),
];

/// Seed rename tables applied by the automatic mapping pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heuristics {
    #[serde(default = "default_variable_renames")]
    pub variables: BTreeMap<String, String>,

    #[serde(default = "default_block_renames")]
    pub blocks: BTreeMap<String, String>,
}

fn to_map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn default_variable_renames() -> BTreeMap<String, String> {
    to_map(DEFAULT_VARIABLE_RENAMES)
}

fn default_block_renames() -> BTreeMap<String, String> {
    to_map(DEFAULT_BLOCK_RENAMES)
}

impl Default for Heuristics {
    fn default() -> Self {
        Self {
            variables: default_variable_renames(),
            blocks: default_block_renames(),
        }
    }
}

impl Heuristics {
    /// Fill-if-absent the variable renames whose source name was discovered.
    pub fn apply_variables(&self, table: &mut RenameTable, discovered: &BTreeSet<String>) {
        table.bulk_apply(relevant(&self.variables, discovered));
    }

    /// Fill-if-absent the block renames whose source name was discovered.
    pub fn apply_blocks(&self, table: &mut RenameTable, discovered: &BTreeSet<String>) {
        table.bulk_apply(relevant(&self.blocks, discovered));
    }
}

fn relevant<'a>(
    renames: &'a BTreeMap<String, String>,
    discovered: &'a BTreeSet<String>,
) -> impl Iterator<Item = (&'a str, &'a str)> {
    renames
        .iter()
        .filter(|(old, _)| discovered.contains(*old))
        .map(|(old, new)| (old.as_str(), new.as_str()))
}

/// Suggest a destination for `path` (relative, `/`-separated).
///
/// A path mentioning `admin` (case-insensitive) moves under `admin/`, one
/// mentioning `user` moves under `user/`, a remaining top-level file other
/// than the base template moves under `pages/`, and anything else stays put.
/// The keyword rules are checked first so that a top-level `profile_user.html`
/// lands in `user/` rather than `pages/`. This applies to every top-level
/// file: `admin_panel.html` goes to `admin/admin_panel.html` and
/// `users.html` to `user/users.html`, never under `pages/`.
pub fn suggest_target_path(path: &str, base_template: &str) -> String {
    let p = Path::new(path);
    let file_name = p
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string());

    let lower = path.to_lowercase();
    if lower.contains("admin") {
        return format!("admin/{file_name}");
    }
    if lower.contains("user") {
        return format!("user/{file_name}");
    }

    let is_top_level = p.components().count() == 1;
    if is_top_level && !is_base_template(p, base_template) {
        return format!("pages/{path}");
    }

    path.to_string()
}

fn is_base_template(path: &Path, base_template: &str) -> bool {
    let stem = path.file_stem().map(|s| s.to_string_lossy());
    let base_stem = Path::new(base_template)
        .file_stem()
        .map(|s| s.to_string_lossy())
        .filter(|s| !s.is_empty());

    match (stem, base_stem) {
        (Some(stem), Some(base)) => stem == base || stem == "base",
        (Some(stem), None) => stem == "base",
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("dashboard.html", "pages/dashboard.html")]
    #[case("base.html", "base.html")]
    #[case("admin/settings.html", "admin/settings.html")]
    #[case("legacy/Admin_panel.html", "admin/Admin_panel.html")]
    #[case("profile_user.html", "user/profile_user.html")]
    #[case("accounts/profile_user.html", "user/profile_user.html")]
    #[case("admin/user_list.html", "admin/user_list.html")]
    #[case("Users/edit.html", "user/edit.html")]
    #[case("partials/footer.html", "partials/footer.html")]
    #[case("admin_panel.html", "admin/admin_panel.html")]
    #[case("users.html", "user/users.html")]
    fn test_suggest_target_path(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(suggest_target_path(input, "base.html"), expected);
    }

    #[test]
    fn test_configured_base_template_stays_at_root() {
        assert_eq!(suggest_target_path("layout.html", "layout.html"), "layout.html");
        assert_eq!(suggest_target_path("layout.html", ""), "pages/layout.html");
    }

    #[test]
    fn test_heuristics_only_touch_discovered_names() {
        let discovered: BTreeSet<String> = ["user_name".to_string(), "role".to_string()].into();
        let mut table = RenameTable::new();
        Heuristics::default().apply_variables(&mut table, &discovered);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("user_name"), "username");
        assert_eq!(table.get("page_title"), "page_title");
    }

    #[test]
    fn test_heuristics_fill_if_absent() {
        let discovered: BTreeSet<String> = ["content".to_string()].into();
        let mut table = RenameTable::new();
        table.set("content", "body");
        Heuristics::default().apply_blocks(&mut table, &discovered);
        assert_eq!(table.get("content"), "body");
    }
}
