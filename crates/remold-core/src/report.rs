use std::fmt::Write as _;

use crate::config::MigrationConfig;
use crate::mapping::RenameTable;
use crate::migrate::MigrationSummary;

/// Default file name for `--report` without an explicit path.
pub const DEFAULT_REPORT_FILE: &str = "migration_report.md";

/// Render a markdown report of a finished run.
pub fn render_report(config: &MigrationConfig, summary: &MigrationSummary) -> String {
    let mut out = String::new();

    out.push_str("# Template Migration Report\n\n");
    out.push_str("## Configuration\n\n");
    let _ = writeln!(out, "- Source directory: {}", config.source_dir.display());
    let _ = writeln!(out, "- Target directory: {}", config.target_dir.display());
    let base = if config.base_template.is_empty() {
        "(none)"
    } else {
        config.base_template.as_str()
    };
    let _ = writeln!(out, "- Base template: {base}");
    out.push('\n');

    out.push_str("## Summary\n\n");
    let _ = writeln!(out, "- Migrated: {}", summary.success_count());
    let _ = writeln!(out, "- Failed: {}", summary.failure_count());
    let _ = writeln!(out, "- Excluded: {}", summary.excluded_count());
    let _ = writeln!(out, "- Skipped: {}", summary.skipped_count());
    out.push('\n');

    out.push_str("## Applied Mappings\n\n");
    mapping_table(&mut out, "Variable Mappings", &summary.mapping.variables);
    mapping_table(&mut out, "Block Mappings", &summary.mapping.blocks);
    mapping_table(&mut out, "Template Mappings", &summary.mapping.templates);

    out.push_str("## Migrated Templates\n\n");
    for entry in &summary.log {
        let _ = writeln!(out, "### {} → {}\n", entry.source_path, entry.target_path);
        let _ = writeln!(out, "- Variables: {}", or_none(&entry.variables));
        let _ = writeln!(out, "- Blocks: {}", or_none(&entry.blocks));
        out.push('\n');
    }

    let mut failures = summary.failures().peekable();
    if failures.peek().is_some() {
        out.push_str("## Failures\n\n");
        for (path, reason) in failures {
            let _ = writeln!(out, "- `{path}`: {reason}");
        }
        out.push('\n');
    }

    out
}

fn mapping_table(out: &mut String, title: &str, table: &RenameTable) {
    if table.is_empty() {
        return;
    }
    let _ = writeln!(out, "### {title}\n");
    out.push_str("| Original | New |\n");
    out.push_str("|----------|-----|\n");
    for (old, new) in table.iter() {
        let new = if new.is_empty() { "(skipped)" } else { new };
        let _ = writeln!(out, "| {old} | {new} |");
    }
    out.push('\n');
}

fn or_none(items: &[String]) -> String {
    if items.is_empty() {
        "None".to_string()
    } else {
        items.join(", ")
    }
}
