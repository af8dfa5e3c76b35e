use std::path::PathBuf;

use console::style;
use miette::Result;
use remold_core::migrate::TemplateState;

use super::load_migrator;

pub fn run(config: PathBuf, templates: Vec<String>) -> Result<()> {
    let migrator = load_migrator(&config)?;
    let batch = migrator.select(&templates)?;
    let analysis = migrator.analyze(&batch);

    for fact in &analysis.facts {
        println!("\n{} {}", style("==>").cyan().bold(), style(&fact.path).bold());
        if let Some(parent) = &fact.parent {
            println!("  extends:   {parent}");
        }
        if !fact.includes.is_empty() {
            println!("  includes:  {}", fact.includes.join(", "));
        }
        println!("  blocks:    {}", join_or_none(fact.blocks.iter()));
        println!("  variables: {}", join_or_none(fact.variables.iter()));
    }

    for outcome in &analysis.outcomes {
        match &outcome.state {
            TemplateState::Excluded => {
                println!("  {} {} (excluded)", style("-").dim(), outcome.path)
            }
            TemplateState::Failed { reason } => eprintln!(
                "{} {}: {}",
                style("✗").red().bold(),
                outcome.path,
                style(reason).red()
            ),
            _ => {}
        }
    }

    println!(
        "\n{} {} template(s) analyzed: {} variables, {} blocks",
        style("==>").cyan().bold(),
        analysis.facts.len(),
        analysis.discovered.variables.len(),
        analysis.discovered.blocks.len()
    );
    println!(
        "  variables: {}",
        join_or_none(analysis.discovered.variables.iter())
    );
    println!(
        "  blocks:    {}",
        join_or_none(analysis.discovered.blocks.iter())
    );

    Ok(())
}

fn join_or_none<'a>(items: impl Iterator<Item = &'a String>) -> String {
    let items: Vec<&str> = items.map(String::as_str).collect();
    if items.is_empty() {
        style("(none)").dim().to_string()
    } else {
        items.join(", ")
    }
}
