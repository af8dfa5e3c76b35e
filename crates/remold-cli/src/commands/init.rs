use std::path::PathBuf;

use console::style;
use miette::Result;
use remold_core::config::write_sample_config;

pub fn run(path: PathBuf, force: bool) -> Result<()> {
    let config_path = write_sample_config(&path, force)?;

    println!(
        "{} Sample config written to {}",
        style("✓").green().bold(),
        style(config_path.display()).cyan()
    );
    println!("  edit source_dir and target_dir, then run `remold migrate`");

    Ok(())
}
