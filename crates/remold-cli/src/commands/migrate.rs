use std::path::PathBuf;

use console::style;
use miette::{IntoDiagnostic, Result, WrapErr};
use remold_core::migrate::{Analysis, MigrationPlan, TemplateState};
use remold_core::report::render_report;
use remold_core::{MappingKind, Migrator, Overrides};

use super::{load_migrator, parse_pairs};
use crate::prompt;

pub struct MigrateArgs {
    pub config: PathBuf,
    pub templates: Vec<String>,
    pub auto: bool,
    pub dry_run: bool,
    pub report: Option<PathBuf>,
    pub set_var: Vec<String>,
    pub set_block: Vec<String>,
    pub map: Vec<String>,
    pub verbose: bool,
}

pub fn run(args: MigrateArgs) -> Result<()> {
    let migrator = load_migrator(&args.config)?;

    let batch = migrator.select(&args.templates)?;
    if batch.is_empty() {
        eprintln!(
            "{} No templates found to migrate in {}",
            style("warning:").yellow().bold(),
            migrator.config().source_dir.display()
        );
        return Ok(());
    }

    println!(
        "{} Analyzing {} template(s)...",
        style("==>").cyan().bold(),
        batch.len()
    );
    let analysis = migrator.analyze(&batch);
    println!(
        "  found {} variables and {} blocks",
        analysis.discovered.variables.len(),
        analysis.discovered.blocks.len()
    );

    let mut overrides = Overrides::default();
    for (old, new) in parse_pairs("--set-var", &args.set_var)? {
        overrides.push(MappingKind::Variable, old, new);
    }
    for (old, new) in parse_pairs("--set-block", &args.set_block)? {
        overrides.push(MappingKind::Block, old, new);
    }
    for (old, new) in parse_pairs("--map", &args.map)? {
        overrides.push(MappingKind::Template, old, new);
    }

    if args.auto {
        println!("{} Using automatic mappings", style("==>").cyan().bold());
    } else {
        collect_prompt_overrides(&migrator, &analysis, &mut overrides)?;
    }

    let mapping = migrator.resolve_mapping(&analysis.discovered, &overrides);
    print_mappings(&mapping);

    let plan = migrator.plan(&analysis, mapping);
    print_plan(&plan, args.dry_run);

    if args.dry_run {
        if args.verbose {
            for planned in &plan.templates {
                println!(
                    "{}",
                    unified_diff(&planned.original, &planned.content, &planned.target_path)
                );
            }
        }
        println!(
            "\n{} Dry run: no changes written.",
            style("ℹ").blue().bold()
        );
        return Ok(());
    }

    let needs_confirm = !args.auto && !plan.templates.is_empty();
    if needs_confirm && !prompt::confirm("Proceed with migration?", true)? {
        println!("Migration cancelled.");
        return Ok(());
    }

    let summary = migrator.execute_plan(plan);

    for outcome in &summary.outcomes {
        match &outcome.state {
            TemplateState::Rewritten { target } => println!(
                "  {} {} → {}",
                style("✓").green(),
                outcome.path,
                style(target).cyan()
            ),
            TemplateState::Failed { reason } => println!(
                "  {} {}: {}",
                style("✗").red(),
                outcome.path,
                style(reason).red()
            ),
            TemplateState::Excluded => {
                println!("  {} {} (excluded)", style("-").dim(), outcome.path)
            }
            TemplateState::Skipped => {
                println!("  {} {} (skipped)", style("-").dim(), outcome.path)
            }
        }
    }

    println!(
        "\n{} {} migrated, {} failed, {} excluded, {} skipped",
        style("==>").cyan().bold(),
        style(summary.success_count()).green(),
        style(summary.failure_count()).red(),
        summary.excluded_count(),
        summary.skipped_count()
    );

    if let Some(report_path) = &args.report {
        if summary.log.is_empty() {
            eprintln!(
                "{} nothing migrated, no report written",
                style("warning:").yellow().bold()
            );
        } else {
            let report = render_report(migrator.config(), &summary);
            std::fs::write(report_path, report)
                .into_diagnostic()
                .wrap_err_with(|| format!("writing report {}", report_path.display()))?;
            println!(
                "{} Migration report saved to {}",
                style("✓").green().bold(),
                style(report_path.display()).cyan()
            );
        }
    }

    Ok(())
}

fn collect_prompt_overrides(
    migrator: &Migrator,
    analysis: &Analysis,
    overrides: &mut Overrides,
) -> Result<()> {
    let mut proposed = migrator.proposed_mapping(&analysis.discovered);
    overrides.apply_to(&mut proposed);

    for (old, new) in prompt::variable_overrides(&analysis.discovered, &proposed)? {
        overrides.push(MappingKind::Variable, old, new);
    }
    for (old, new) in prompt::block_overrides(&analysis.discovered, &proposed)? {
        overrides.push(MappingKind::Block, old, new);
    }

    for fact in &analysis.facts {
        let planned = migrator.target_path(&proposed, &fact.path);
        if let Some(target) = prompt::template_target(&fact.path, planned.as_deref())? {
            overrides.push(MappingKind::Template, fact.path.clone(), target);
        }
    }

    Ok(())
}

fn print_mappings(mapping: &remold_core::MappingStore) {
    let tables = [
        ("Variable mappings", &mapping.variables),
        ("Block mappings", &mapping.blocks),
    ];
    for (title, table) in tables {
        let renames: Vec<_> = table.renames().collect();
        if renames.is_empty() {
            continue;
        }
        println!("\n{} {}: {}", style("==>").cyan().bold(), title, renames.len());
        for (old, new) in renames {
            println!("  {old} → {}", style(new).green());
        }
    }
}

fn print_plan(plan: &MigrationPlan, dry_run: bool) {
    let heading = if dry_run {
        "Dry run: templates that would be written"
    } else {
        "Migration plan"
    };
    println!("\n{} {}:", style("==>").cyan().bold(), heading);
    for planned in &plan.templates {
        println!(
            "  {} {} → {}",
            style("rewrite").yellow(),
            planned.source_path,
            planned.target_path
        );
    }
    for outcome in &plan.outcomes {
        match &outcome.state {
            TemplateState::Excluded => println!("  {} {}", style("exclude").dim(), outcome.path),
            TemplateState::Skipped => println!("  {} {}", style("skip").dim(), outcome.path),
            TemplateState::Failed { reason } => {
                println!("  {} {}: {}", style("fail").red(), outcome.path, reason)
            }
            TemplateState::Rewritten { .. } => {}
        }
    }
}

fn unified_diff(old: &str, new: &str, path: &str) -> String {
    use similar::TextDiff;

    let diff = TextDiff::from_lines(old, new);
    let mut output = String::new();

    output.push_str(&format!("--- a/{path}\n+++ b/{path}\n"));

    for hunk in diff.unified_diff().context_radius(3).iter_hunks() {
        output.push_str(&format!("{hunk}"));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unified_diff_marks_changes() {
        let diff = unified_diff("a\n{{ user_name }}\n", "a\n{{ username }}\n", "pages/x.html");
        assert!(diff.starts_with("--- a/pages/x.html\n+++ b/pages/x.html\n"));
        assert!(diff.contains("-{{ user_name }}"));
        assert!(diff.contains("+{{ username }}"));
    }

    #[test]
    fn test_unified_diff_identical_has_no_hunks() {
        let diff = unified_diff("same\n", "same\n", "x.html");
        assert_eq!(diff, "--- a/x.html\n+++ b/x.html\n");
    }
}
