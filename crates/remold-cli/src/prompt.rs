use console::style;
use remold_core::migrate::Discovered;
use remold_core::{MappingStore, RemoldError, Result};

/// Ask whether to rename any discovered variable; returns the operator's renames.
pub fn variable_overrides(
    discovered: &Discovered,
    proposed: &MappingStore,
) -> Result<Vec<(String, String)>> {
    if discovered.variables.is_empty() {
        return Ok(Vec::new());
    }

    println!(
        "\n{} Found {} unique variables:",
        style("==>").cyan().bold(),
        discovered.variables.len()
    );
    for var in &discovered.variables {
        print_name(var, proposed.variables.get(var));
    }

    if !confirm("Rename any variables?", false)? {
        return Ok(Vec::new());
    }
    rename_each(&discovered.variables, |name| proposed.variables.get(name))
}

/// Show the proposed block renames and let the operator change them.
pub fn block_overrides(
    discovered: &Discovered,
    proposed: &MappingStore,
) -> Result<Vec<(String, String)>> {
    if discovered.blocks.is_empty() {
        return Ok(Vec::new());
    }

    println!(
        "\n{} Found {} unique blocks:",
        style("==>").cyan().bold(),
        discovered.blocks.len()
    );
    for block in &discovered.blocks {
        print_name(block, proposed.blocks.get(block));
    }

    if !confirm("Customize block mappings?", false)? {
        return Ok(Vec::new());
    }
    rename_each(&discovered.blocks, |name| proposed.blocks.get(name))
}

fn print_name(name: &str, mapped: &str) {
    if mapped == name {
        println!("  - {name}");
    } else {
        println!("  - {name} {} {}", style("→").dim(), style(mapped).green());
    }
}

fn rename_each<'a>(
    names: impl IntoIterator<Item = &'a String>,
    current: impl Fn(&'a str) -> &'a str,
) -> Result<Vec<(String, String)>> {
    let mut renames = Vec::new();
    for name in names {
        let default = current(name.as_str());
        let answer = inquire::Text::new(&format!("Map '{name}' to"))
            .with_default(default)
            .prompt()
            .map_err(|_| RemoldError::PromptCancelled)?;
        let answer = answer.trim();
        if !answer.is_empty() && answer != default {
            renames.push((name.clone(), answer.to_string()));
        }
    }
    Ok(renames)
}

/// Ask where one template should go. `None` keeps the current plan.
pub fn template_target(path: &str, planned: Option<&str>) -> Result<Option<String>> {
    let suggested = planned.unwrap_or("");
    let keep = format!("Keep same path ({path})");
    let suggest = format!("Use planned path ({suggested})");
    let custom = "Enter custom path".to_string();
    let skip = "Skip this template".to_string();

    let mut options = vec![keep.clone()];
    if !suggested.is_empty() && suggested != path {
        options.push(suggest.clone());
    }
    options.push(custom.clone());
    options.push(skip.clone());
    let cursor = if options.len() == 4 { 1 } else { 0 };

    let choice = inquire::Select::new(&format!("Template {path}"), options)
        .with_starting_cursor(cursor)
        .prompt()
        .map_err(|_| RemoldError::PromptCancelled)?;

    let target = if choice == keep {
        Some(path.to_string())
    } else if choice == suggest {
        None
    } else if choice == custom {
        let answer = inquire::Text::new("New path")
            .with_default(suggested)
            .prompt()
            .map_err(|_| RemoldError::PromptCancelled)?;
        Some(answer.trim().to_string())
    } else {
        Some(String::new())
    };
    Ok(target)
}

pub fn confirm(message: &str, default: bool) -> Result<bool> {
    inquire::Confirm::new(message)
        .with_default(default)
        .prompt()
        .map_err(|_| RemoldError::PromptCancelled)
}
