use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

use remold_core::config::load_config;
use remold_core::migrate::{Migrator, Overrides, TemplateState};
use remold_core::parser::parse;
use remold_core::report::render_report;
use remold_core::{MappingKind, MigrationConfig};

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// Load a fixture config, redirecting output into a fresh temp directory.
fn fixture_config(name: &str) -> (MigrationConfig, tempfile::TempDir) {
    let out = tempfile::tempdir().unwrap();
    let mut config = load_config(&fixture_path(name)).unwrap();
    config.target_dir = out.path().join("migrated");
    (config, out)
}

fn names(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_load_fixture_config() {
    let config = load_config(&fixture_path("legacy-site")).unwrap();
    assert_eq!(config.source_dir, fixture_path("legacy-site").join("templates"));
    assert_eq!(config.exclude_patterns.len(), 2);
    assert!(config.auto_map_variables);
    assert_eq!(
        config.mappings.templates.get("partials/nav.html").map(String::as_str),
        Some("")
    );
}

#[test]
fn test_discover_skips_non_templates() {
    let (config, _out) = fixture_config("legacy-site");
    let migrator = Migrator::new(config).unwrap();
    assert_eq!(
        migrator.discover().unwrap(),
        vec![
            "admin/settings.html",
            "base.html",
            "dashboard.html",
            "home_backup.html",
            "legacy/old.html",
            "partials/nav.html",
            "profile_user.html",
        ]
    );
}

#[test]
fn test_analysis_ignores_excluded_templates() {
    let (config, _out) = fixture_config("legacy-site");
    let migrator = Migrator::new(config).unwrap();
    let analysis = migrator.analyze(&migrator.discover().unwrap());

    assert_eq!(analysis.facts.len(), 5);
    assert_eq!(
        analysis.discovered.variables,
        names(&[
            "current_user",
            "nav_items",
            "page_title",
            "site_name",
            "user_email",
            "user_name",
            "user_name_full",
            "widgets",
        ])
    );
    assert_eq!(
        analysis.discovered.blocks,
        names(&["content", "page_scripts", "page_styles", "page_title", "sidebar"])
    );

    let excluded: Vec<_> = analysis
        .outcomes
        .iter()
        .filter(|o| o.state == TemplateState::Excluded)
        .map(|o| o.path.as_str())
        .collect();
    assert_eq!(excluded, vec!["home_backup.html", "legacy/old.html"]);
}

#[test]
fn test_full_migration() {
    let (config, out) = fixture_config("legacy-site");
    let migrator = Migrator::new(config).unwrap();
    let summary = migrator.run(&[], &Overrides::default()).unwrap();

    assert_eq!(summary.success_count(), 4);
    assert_eq!(summary.failure_count(), 0);
    assert_eq!(summary.excluded_count(), 2);
    assert_eq!(summary.skipped_count(), 1);

    let target = out.path().join("migrated");
    assert!(target.join("pages/dashboard.html").exists());
    assert!(target.join("admin/settings.html").exists());
    assert!(target.join("user/profile_user.html").exists());
    assert!(target.join("base.html").exists());
    assert!(!target.join("partials").exists());
    assert!(!target.join("legacy").exists());
    assert!(!target.join("pages/home_backup.html").exists());

    let dashboard = fs::read_to_string(target.join("pages/dashboard.html")).unwrap();
    assert!(dashboard.starts_with("{% extends \"base.html\" %}\n"));
    assert!(dashboard.contains("{% block page_title %}\n{{ title }}\n{% endblock %}"));
    assert!(dashboard.contains("<h1>Welcome back, {{ username }}</h1>"));
    assert!(dashboard.contains("{% for item in navigation %}"));
    assert!(dashboard.contains("{{ user_name_full }}"));
    assert!(dashboard.contains("{% block aside_content %}{{ widgets|length }} widgets"));
    assert!(dashboard.contains("{# original: dashboard.html #}"));

    let reparsed = parse("pages/dashboard.html", &dashboard).unwrap();
    assert_eq!(reparsed.parent.as_deref(), Some("base.html"));
    assert_eq!(
        reparsed.blocks,
        vec!["page_title", "main_content", "aside_content"]
    );
    assert_eq!(
        reparsed.variables,
        names(&["navigation", "title", "user_name_full", "username", "widgets"])
    );

    let profile = fs::read_to_string(target.join("user/profile_user.html")).unwrap();
    assert!(profile.contains("{% set display = user.name if user else \"guest\" %}"));
    assert!(profile.contains("<p>{{ email }}</p>"));

    let base = fs::read_to_string(target.join("base.html")).unwrap();
    assert!(!base.contains("extends"));
    assert!(base.starts_with("<!doctype html>\n<html>\n<head>\n"));
    assert!(base.contains("<title>{% block page_title %}Site{% endblock %}</title>"));
    assert!(base.contains(
        "  {% include \"partials/nav.html\" %}\n  {% block main_content %}{% endblock %}\n"
    ));
    assert!(base.contains("</body>\n</html>\n"));
    assert!(base.contains("{# original: base.html #}"));
}

#[test]
fn test_batch_partial_failure() {
    let (config, out) = fixture_config("partial-failure");
    let migrator = Migrator::new(config).unwrap();
    let summary = migrator.run(&[], &Overrides::default()).unwrap();

    assert_eq!(summary.success_count(), 2);
    assert_eq!(summary.failure_count(), 1);

    let (path, reason) = summary.failures().next().unwrap();
    assert_eq!(path, "b_broken.html");
    assert!(reason.contains("b_broken.html"), "{reason}");

    let target = out.path().join("migrated");
    assert!(target.join("pages/a_first.html").exists());
    assert!(target.join("pages/c_third.html").exists());
    assert!(!target.join("pages/b_broken.html").exists());

    let logged: Vec<_> = summary.log.iter().map(|e| e.source_path.as_str()).collect();
    assert_eq!(logged, vec!["a_first.html", "c_third.html"]);
}

#[test]
fn test_dry_run_writes_nothing() {
    let (config, out) = fixture_config("legacy-site");
    let migrator = Migrator::new(config).unwrap();
    let analysis = migrator.analyze(&migrator.discover().unwrap());
    let mapping = migrator.resolve_mapping(&analysis.discovered, &Overrides::default());
    let plan = migrator.plan(&analysis, mapping);

    let targets: Vec<_> = plan.templates.iter().map(|t| t.target_path.as_str()).collect();
    assert_eq!(
        targets,
        vec![
            "admin/settings.html",
            "base.html",
            "pages/dashboard.html",
            "user/profile_user.html",
        ]
    );
    assert!(!out.path().join("migrated").exists());
}

#[test]
fn test_selected_templates_and_overrides() {
    let (config, out) = fixture_config("legacy-site");
    let migrator = Migrator::new(config).unwrap();

    let mut overrides = Overrides::default();
    overrides.push(MappingKind::Block, "content", "body");
    overrides.push(MappingKind::Variable, "user_name", "display_name");
    overrides.push(MappingKind::Template, "dashboard.html", "home/index.html");

    let selection = vec!["dashboard.html".to_string(), "legacy/old.html".to_string()];
    let summary = migrator.run(&selection, &overrides).unwrap();

    assert_eq!(summary.success_count(), 1);
    assert_eq!(summary.excluded_count(), 1);

    let output = fs::read_to_string(out.path().join("migrated/home/index.html")).unwrap();
    assert!(output.contains("{% block body %}"));
    assert!(output.contains("{{ display_name }}"));
    // heuristics still fill names the operator did not touch
    assert!(output.contains("{% for item in navigation %}"));
}

#[test]
fn test_report_after_migration() {
    let (config, _out) = fixture_config("partial-failure");
    let migrator = Migrator::new(config).unwrap();
    let summary = migrator.run(&[], &Overrides::default()).unwrap();
    let report = render_report(migrator.config(), &summary);

    assert!(report.contains("- Migrated: 2\n- Failed: 1\n"));
    assert!(report.contains("| content | main_content |"));
    assert!(report.contains("### a_first.html → pages/a_first.html\n"));
    assert!(report.contains("- Variables: first\n- Blocks: content\n"));
    assert!(report.contains("## Failures"));
    assert!(report.contains("`b_broken.html`"));
}
