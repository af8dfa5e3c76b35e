use std::path::Path;

use regex_lite::Regex;
use walkdir::WalkDir;

use crate::config::MigrationConfig;
use crate::error::{RemoldError, Result};

/// Walk the source root and return every template path, relative and `/`-separated, sorted.
///
/// Files whose extension is not configured and binary files are skipped.
pub fn discover_templates(config: &MigrationConfig) -> Result<Vec<String>> {
    let root = &config.source_dir;
    if !root.is_dir() {
        return Err(RemoldError::SourceDirectoryMissing { path: root.clone() });
    }

    let mut templates = Vec::new();
    for entry in WalkDir::new(root)
        .min_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let has_extension = path
            .extension()
            .map(|ext| config.matches_extension(&ext.to_string_lossy()))
            .unwrap_or(false);
        if !has_extension {
            continue;
        }

        if is_binary_file(path) {
            tracing::debug!(path = %path.display(), "skipping binary file");
            continue;
        }

        let Ok(rel_path) = path.strip_prefix(root) else {
            continue;
        };
        templates.push(normalize_path(&rel_path.to_string_lossy()));
    }

    templates.sort();
    Ok(templates)
}

/// Whether any exclude pattern matches `path`.
pub fn is_excluded(path: &str, excludes: &[Regex]) -> bool {
    excludes.iter().any(|re| re.is_match(path))
}

/// Turn platform separators into `/` and drop a leading `./`.
pub fn normalize_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    path.trim_start_matches("./").to_string()
}

/// Detect binary files using content_inspector (BOM-aware, null-byte scanning).
///
/// Reads only the first 8KB.
pub fn is_binary_file(path: &Path) -> bool {
    use std::io::Read;

    let Ok(file) = std::fs::File::open(path) else {
        return false;
    };

    let mut buf = [0u8; 8192];
    let Ok(n) = file.take(8192).read(&mut buf) else {
        return false;
    };

    !content_inspector::inspect(&buf[..n]).is_text()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::fs;

    fn write(root: &Path, rel: &str, content: &[u8]) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_discover_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        write(&src, "users/profile.html", b"{{ user }}");
        write(&src, "index.html", b"<p>home</p>");
        write(&src, "admin/panel.HTML", b"panel");
        write(&src, "static/app.js", b"console.log(1)");
        write(&src, "broken.html", &[0u8, 159, 146, 150, 0, 1]);

        let config = MigrationConfig::new(&src, dir.path().join("out"));
        let templates = discover_templates(&config).unwrap();
        assert_eq!(
            templates,
            vec!["admin/panel.HTML", "index.html", "users/profile.html"]
        );
    }

    #[test]
    fn test_discover_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let config = MigrationConfig::new(dir.path().join("nope"), dir.path().join("out"));
        let err = discover_templates(&config).unwrap_err();
        assert!(matches!(err, RemoldError::SourceDirectoryMissing { .. }));
    }

    #[rstest]
    #[case("legacy/old.html", true)]
    #[case("pages/legacy/old.html", false)]
    #[case("home_backup.html", true)]
    #[case("home.html", false)]
    fn test_is_excluded(#[case] path: &str, #[case] expected: bool) {
        let mut config = MigrationConfig::new("a", "b");
        config.exclude_patterns = vec!["legacy/".into(), r".*_backup\.html$".into()];
        let excludes = config.compiled_excludes().unwrap();
        assert_eq!(is_excluded(path, &excludes), expected);
    }

    #[rstest]
    #[case(b"Hello, world!", false)]
    #[case(&[0u8, 1, 2, 3, 0, 255], true)]
    fn test_is_binary_file(#[case] content: &[u8], #[case] expected: bool) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file.html");
        fs::write(&path, content).unwrap();
        assert_eq!(is_binary_file(&path), expected);
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("./pages\\home.html"), "pages/home.html");
    }
}
